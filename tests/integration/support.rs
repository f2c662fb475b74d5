//! Scripted collaborators shared across the integration scenarios.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use switchboard::config::AgentProfileConfig;
use switchboard::{
    CanonicalUpdate, DeliveryError, EngineConfig, FileRecord, FileStatusRepository,
    InMemoryHistory, ModelApi, ModelError, QueryOrchestrator, ToolOutcome, ToolServer, UpdateSink,
    UpdateType,
};
use switchboard_llm::{
    ChatMessage, ChatResponse, ContentBlock, ModelResult, RequestParams, StopReason, SystemBlock,
    TokenUsage, ToolSpec,
};
use switchboard_tools::{ToolError, ToolServerResult};

/// One scripted model turn: a canned outcome, or a call that never returns
/// (for cancellation scenarios; the caller's select unblocks it).
pub enum ModelScript {
    Reply(ModelResult<ChatResponse>),
    Hang,
}

pub struct ScriptedModel {
    script: Mutex<VecDeque<ModelScript>>,
    calls: AtomicUsize,
    captured: StdMutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<ModelScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            captured: StdMutex::new(Vec::new()),
        })
    }

    pub fn replies(replies: Vec<ModelResult<ChatResponse>>) -> Arc<Self> {
        Self::new(replies.into_iter().map(ModelScript::Reply).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn captured(&self) -> Vec<Vec<ChatMessage>> {
        self.captured.lock().unwrap().clone()
    }

    /// Spin until the model has seen at least `count` calls.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls() < count {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl ModelApi for ScriptedModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _system: &[SystemBlock],
        _tools: &[ToolSpec],
        _params: &RequestParams,
    ) -> ModelResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.captured.lock().unwrap().push(messages.to_vec());
        let entry = self.script.lock().await.pop_front();
        match entry {
            Some(ModelScript::Reply(outcome)) => outcome,
            Some(ModelScript::Hang) => std::future::pending().await,
            None => Err(ModelError::Network("script exhausted".into())),
        }
    }
}

pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        content: vec![ContentBlock::text(text)],
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage::default(),
        model: "test-model".into(),
    }
}

pub fn tool_use_response(id: &str, tool: &str, input: Value) -> ChatResponse {
    ChatResponse {
        content: vec![ContentBlock::ToolUse {
            id: id.into(),
            name: tool.into(),
            input,
        }],
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage::default(),
        model: "test-model".into(),
    }
}

/// Records everything it is given and always accepts.
#[derive(Default)]
pub struct MemorySink {
    updates: StdMutex<Vec<CanonicalUpdate>>,
}

impl MemorySink {
    pub fn updates(&self) -> Vec<CanonicalUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn types(&self) -> Vec<UpdateType> {
        self.updates().iter().map(|u| u.update_type).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.updates().iter().map(|u| u.message.clone()).collect()
    }
}

#[async_trait]
impl UpdateSink for MemorySink {
    async fn push(&self, _query_id: &str, update: &CanonicalUpdate) -> Result<(), DeliveryError> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

/// Fails according to a script of delivery errors, then records.
pub struct FlakySink {
    failures: StdMutex<VecDeque<DeliveryError>>,
    pushes: AtomicUsize,
    received: StdMutex<Vec<CanonicalUpdate>>,
}

impl FlakySink {
    pub fn new(failures: Vec<DeliveryError>) -> Arc<Self> {
        Arc::new(Self {
            failures: StdMutex::new(failures.into()),
            pushes: AtomicUsize::new(0),
            received: StdMutex::new(Vec::new()),
        })
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<CanonicalUpdate> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateSink for FlakySink {
    async fn push(&self, _query_id: &str, update: &CanonicalUpdate) -> Result<(), DeliveryError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.received.lock().unwrap().push(update.clone());
        Ok(())
    }
}

/// Fixed per-file statuses; unknown ids fail the fetch.
pub struct StaticFiles {
    records: HashMap<String, FileRecord>,
}

impl StaticFiles {
    pub fn new(records: Vec<FileRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: records
                .into_iter()
                .map(|r| (r.file_id.clone(), r))
                .collect(),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl FileStatusRepository for StaticFiles {
    async fn get(&self, file_id: &str) -> Result<FileRecord, String> {
        self.records
            .get(file_id)
            .cloned()
            .ok_or_else(|| format!("unknown file {}", file_id))
    }
}

/// One-tool server used by the agentic-loop scenarios.
pub struct EchoTools {
    calls: AtomicUsize,
}

impl EchoTools {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolServer for EchoTools {
    fn name(&self) -> &str {
        "echo"
    }

    async fn list_tools(&self) -> ToolServerResult<Vec<ToolSpec>> {
        Ok(vec![ToolSpec::new(
            "echo",
            "Echoes its input back",
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } }
            }),
        )])
    }

    async fn call(&self, name: &str, args: &Value) -> ToolServerResult<ToolOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match name {
            "echo" => Ok(ToolOutcome::ok(format!("echo: {}", args["text"]))),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

/// One configured agent plus fast retry/delivery timings so scenarios do not
/// sleep for real.
pub fn engine_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.executor.retry.base_delay_ms = 1;
    config.executor.retry.max_delay_ms = 1;
    config.delivery.retry_delay_ms = 1;
    config.attachments.poll_interval_ms = 1;
    config.agents = vec![AgentProfileConfig {
        name: "researcher".into(),
        display_name: Some("Research Agent".into()),
        description: "Finds and verifies information".into(),
        system_prompt: "You research carefully.".into(),
        tools: Vec::new(),
        long_running: false,
    }];
    config
}

pub struct Rig {
    pub orchestrator: Arc<QueryOrchestrator>,
    pub model: Arc<ScriptedModel>,
    pub sink: Arc<MemorySink>,
}

impl Rig {
    pub fn observe(&self, query_id: &str) {
        self.orchestrator.register_observer(query_id, self.sink.clone());
    }
}

pub fn rig(config: EngineConfig, model: Arc<ScriptedModel>) -> Rig {
    rig_with_files(config, model, StaticFiles::empty())
}

pub fn rig_with_files(
    config: EngineConfig,
    model: Arc<ScriptedModel>,
    files: Arc<StaticFiles>,
) -> Rig {
    let orchestrator = Arc::new(QueryOrchestrator::new(
        config,
        model.clone(),
        vec![EchoTools::new() as Arc<dyn ToolServer>],
        files,
        Arc::new(InMemoryHistory::new()),
    ));
    Rig {
        orchestrator,
        model,
        sink: Arc::new(MemorySink::default()),
    }
}
