//! Query Orchestrator
//!
//! The engine's composition root and entry point. Wires the decision engine,
//! attachment gate, executor, planner, telemetry normalizer, and update
//! channel together, and owns the per-query cancellation registry. One call
//! to `submit_query` runs the whole pipeline and resolves with a typed
//! outcome; progress reaches the registered observer along the way.

mod workflows;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_core::{CanonicalUpdate, UpdateSink, UpdateType, WorkflowType};
use switchboard_llm::{ModelApi, RequestParams, TokenUsage};
use switchboard_tools::{ToolRouter, ToolServer};

use crate::config::EngineConfig;
use crate::models::{ExecutionRequest, Query, QueryOutcome, Strategy};
use crate::services::agents::AgentRegistry;
use crate::services::breaker::CircuitBreaker;
use crate::services::cache_plan::PromptCachePlanner;
use crate::services::decision::{ClarificationStore, WorkflowDecisionEngine};
use crate::services::executor::ResilientLlmExecutor;
use crate::services::file_gate::{FileReadinessGate, FileStatusRepository};
use crate::services::gate::ConcurrencyGate;
use crate::services::history::MessageHistoryRepository;
use crate::services::interaction::InteractionBroker;
use crate::services::planner::Planner;
use crate::services::updates::UpdateChannel;
use crate::utils::EngineError;

pub struct QueryOrchestrator {
    decision: WorkflowDecisionEngine,
    executor: ResilientLlmExecutor,
    planner: Planner,
    file_gate: FileReadinessGate,
    registry: Arc<AgentRegistry>,
    pending: Arc<ClarificationStore>,
    interaction: Arc<InteractionBroker>,
    channel: Arc<UpdateChannel>,
    history: Arc<dyn MessageHistoryRepository>,
    active: Mutex<HashMap<String, CancellationToken>>,
    history_limit: usize,
}

impl QueryOrchestrator {
    /// Builds the engine from configuration plus the external collaborators
    /// it cannot own: the model provider, tool servers, the file-status
    /// provider, and the conversation store.
    pub fn new(
        config: EngineConfig,
        model: Arc<dyn ModelApi>,
        tool_servers: Vec<Arc<dyn ToolServer>>,
        files: Arc<dyn FileStatusRepository>,
        history: Arc<dyn MessageHistoryRepository>,
    ) -> Self {
        let registry = Arc::new(AgentRegistry::from_config(&config.agents));
        let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(
            config.breaker.reset_after_secs,
        )));
        let interaction = Arc::new(InteractionBroker::new());
        let pending = Arc::new(ClarificationStore::new());
        let channel = Arc::new(UpdateChannel::new(config.delivery.clone()));

        let params = RequestParams {
            model: config.model.model.clone(),
            max_tokens: config.model.max_tokens,
            temperature: config.model.temperature,
            long_running: false,
        };

        let decision = WorkflowDecisionEngine::new(
            model.clone(),
            breaker.clone(),
            registry.clone(),
            pending.clone(),
            config.executor.retry.clone(),
            params.clone(),
        );
        let planner = Planner::new(
            model.clone(),
            breaker.clone(),
            config.executor.retry.clone(),
            params.clone(),
        );
        let executor = ResilientLlmExecutor::new(
            model,
            Arc::new(ToolRouter::new(tool_servers)),
            breaker,
            ConcurrencyGate::new(config.executor.gate_capacity),
            PromptCachePlanner::new(config.cache.clone()),
            interaction.clone(),
            config.executor.clone(),
            params,
        );
        let file_gate = FileReadinessGate::new(
            files,
            Duration::from_millis(config.attachments.poll_interval_ms),
            Duration::from_secs(config.attachments.timeout_secs),
        );

        Self {
            decision,
            executor,
            planner,
            file_gate,
            registry,
            pending,
            interaction,
            channel,
            history,
            active: Mutex::new(HashMap::new()),
            history_limit: config.executor.history_limit,
        }
    }

    /// Attach the observer that will receive this query's updates. Delivery
    /// happens only while exactly one live observer is registered.
    pub fn register_observer(&self, query_id: &str, sink: Arc<dyn UpdateSink>) {
        self.channel.register_observer(query_id, sink);
    }

    pub fn unregister_observer(&self, query_id: &str) {
        self.channel.unregister_observer(query_id);
    }

    /// Answer an outstanding mid-run question from the model. Returns false
    /// when the request id is unknown or already resolved.
    pub fn resolve_human_input(&self, request_id: &str, answer: impl Into<String>) -> bool {
        self.interaction.resolve_input(request_id, answer)
    }

    /// Grant or deny an outstanding guarded-tool authorization wait.
    pub fn resolve_tool_permission(&self, operation_id: &str, allowed: bool) -> bool {
        self.interaction.resolve_permission(operation_id, allowed)
    }

    /// Best-effort cancellation. Returns false for unknown query ids.
    pub fn cancel(&self, query_id: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.get(query_id) {
            Some(token) => {
                token.cancel();
                info!(query_id = %query_id, "cancellation requested");
                true
            }
            None => {
                debug!(query_id = %query_id, "cancel for unknown query");
                false
            }
        }
    }

    /// Cancel every in-flight query and abandon all suspended waits.
    pub fn shutdown(&self) {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        for token in active.values() {
            token.cancel();
        }
        drop(active);
        self.interaction.abandon_all();
    }

    /// Run one query through the pipeline end to end. Never panics and never
    /// returns early without attempting a final update for the observer;
    /// validation failures are the one exception, rejected before anything
    /// is emitted.
    pub async fn submit_query(&self, mut query: Query) -> QueryOutcome {
        if let Err(reason) = query.validate() {
            warn!(%reason, "query rejected");
            return QueryOutcome::Failed {
                error: EngineError::validation(reason).to_string(),
            };
        }

        let cancel = CancellationToken::new();
        self.track(&query.id, cancel.clone());
        info!(
            query_id = %query.id,
            conversation = query.conversation_id.as_deref().unwrap_or("-"),
            attachments = query.attachment_ids.len(),
            "query accepted"
        );

        self.hydrate_history(&mut query).await;
        let outcome = self.run_pipeline(&query, &cancel).await;
        self.untrack(&query.id);
        outcome
    }

    async fn run_pipeline(&self, query: &Query, cancel: &CancellationToken) -> QueryOutcome {
        // A suspended clarification consumes this query as its answer: the
        // stored strategy is reused and no new decision is made.
        if let Some(conversation_id) = query.conversation_id.as_deref() {
            if let Some(stored) = self.pending.take(conversation_id) {
                info!(
                    query_id = %query.id,
                    conversation = %conversation_id,
                    strategy = %stored.strategy,
                    "resuming suspended strategy with clarification answer"
                );
                let mut request = ExecutionRequest::new(stored.strategy, query.text.clone())
                    .with_history(query.history.clone())
                    .with_agents(stored.agent_selection);
                request.attachment_ids = query.attachment_ids.clone();
                return self.execute(&query.id, request, cancel).await;
            }
        }

        let decision = self.decision.decide(query, cancel).await;

        if decision.overloaded {
            let message = decision.direct_answer.clone().unwrap_or_else(|| {
                "The service is overloaded right now. Please try again in a moment.".to_string()
            });
            self.deliver(
                CanonicalUpdate::new(&query.id, UpdateType::Result, &message)
                    .with_workflow(WorkflowType::Simple),
            )
            .await;
            return QueryOutcome::Overloaded { message };
        }

        if decision.needs_clarification {
            let questions = decision.clarifying_questions.clone();
            self.deliver(
                CanonicalUpdate::new(&query.id, UpdateType::Clarification, questions.join("\n"))
                    .with_data(json!({ "questions": questions })),
            )
            .await;
            return QueryOutcome::NeedsClarification { questions };
        }

        if decision.strategy == Strategy::Direct {
            // Normalization guarantees a non-blank answer here.
            let text = decision.direct_answer.clone().unwrap_or_default();
            self.deliver(
                CanonicalUpdate::new(&query.id, UpdateType::Result, &text)
                    .with_workflow(WorkflowType::Simple),
            )
            .await;
            return QueryOutcome::Completed {
                text,
                workflow_type: WorkflowType::Simple,
                usage: TokenUsage::default(),
            };
        }

        let request = ExecutionRequest::from_query(query, &decision);
        self.execute(&query.id, request, cancel).await
    }

    /// Fetch recent turns for queries that arrive without any. A fetch
    /// failure degrades to an empty history rather than failing the query.
    async fn hydrate_history(&self, query: &mut Query) {
        if !query.history.is_empty() {
            return;
        }
        let Some(conversation_id) = query.conversation_id.as_deref() else {
            return;
        };
        match self
            .history
            .get_recent(conversation_id, self.history_limit)
            .await
        {
            Ok(turns) => {
                if !turns.is_empty() {
                    debug!(turns = turns.len(), "hydrated conversation history");
                    query.history = turns;
                }
            }
            Err(detail) => {
                warn!(conversation = %conversation_id, %detail, "history fetch failed, continuing without it");
            }
        }
    }

    fn track(&self, query_id: &str, token: CancellationToken) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(query_id.to_string(), token);
    }

    fn untrack(&self, query_id: &str) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(query_id);
    }

    async fn deliver(&self, update: CanonicalUpdate) {
        self.channel.send(&update).await;
    }
}
