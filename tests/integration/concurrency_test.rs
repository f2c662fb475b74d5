//! Engine-wide admission control and cancellation: the gate caps
//! simultaneous runs, queued work is admitted in arrival order, and a
//! cancelled run both surfaces its terminal update and frees its slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;

use switchboard::{
    InMemoryHistory, ModelApi, Query, QueryOrchestrator, QueryOutcome, ToolServer, UpdateType,
};
use switchboard_llm::{ChatMessage, ChatResponse, ModelResult, RequestParams, SystemBlock, ToolSpec};

use crate::support::*;

/// Answers classification calls instantly and holds executor calls open
/// long enough to observe overlap. Executor calls are the ones that carry
/// a tool catalog.
#[derive(Default)]
struct TrackingModel {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: StdMutex<Vec<String>>,
}

impl TrackingModel {
    fn max_seen(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelApi for TrackingModel {
    fn name(&self) -> &'static str {
        "tracking"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _system: &[SystemBlock],
        tools: &[ToolSpec],
        _params: &RequestParams,
    ) -> ModelResult<ChatResponse> {
        if tools.is_empty() {
            return Ok(text_response(
                r#"{"case": 2, "strategy": "single_agent", "rationale": "work", "agents": ["researcher"]}"#,
            ));
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let label = messages.last().map(|m| m.text()).unwrap_or_default();
        self.completed.lock().unwrap().push(label);
        Ok(text_response("done"))
    }
}

#[tokio::test]
async fn test_gate_caps_overlap_and_admits_in_arrival_order() {
    let mut config = engine_config();
    config.executor.gate_capacity = 1;
    let model = Arc::new(TrackingModel::default());
    let orchestrator = Arc::new(QueryOrchestrator::new(
        config,
        model.clone(),
        vec![EchoTools::new() as Arc<dyn ToolServer>],
        StaticFiles::empty(),
        Arc::new(InMemoryHistory::new()),
    ));

    let mut handles = Vec::new();
    for i in 1..=3 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator.submit_query(Query::new(format!("job {}", i))).await
        }));
        // Stagger the arrivals so queue order is unambiguous.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for handle in handles {
        let outcome = handle.await.expect("query task");
        assert!(matches!(outcome, QueryOutcome::Completed { .. }));
    }

    assert_eq!(model.max_seen(), 1);
    assert_eq!(model.completed(), vec!["job 1", "job 2", "job 3"]);
}

#[tokio::test]
async fn test_cancel_mid_run_surfaces_and_frees_the_slot() {
    let mut config = engine_config();
    config.executor.gate_capacity = 1;
    let model = ScriptedModel::new(vec![
        ModelScript::Reply(Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "long job", "agents": ["researcher"]}"#,
        ))),
        ModelScript::Hang,
        ModelScript::Reply(Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "short job", "agents": ["researcher"]}"#,
        ))),
        ModelScript::Reply(Ok(text_response("Second one done."))),
    ]);
    let rig = rig(config, model);

    let query = Query::new("long job");
    let query_id = query.id.clone();
    rig.observe(&query_id);
    let orchestrator = rig.orchestrator.clone();
    let handle = tokio::spawn(async move { orchestrator.submit_query(query).await });

    // Decision done, executor parked inside its model call.
    rig.model.wait_for_calls(2).await;
    assert!(rig.orchestrator.cancel(&query_id));

    let outcome = handle.await.expect("query task");
    match outcome {
        QueryOutcome::Failed { error } => assert!(error.contains("Cancelled")),
        other => panic!("expected Failed, got {:?}", other),
    }
    let types = rig.sink.types();
    assert_eq!(types.last(), Some(&UpdateType::Cancelled));

    // The finished query is no longer cancellable.
    assert!(!rig.orchestrator.cancel(&query_id));
    assert!(!rig.orchestrator.cancel("no-such-query"));

    // The released slot admits the next run on the capacity-1 gate.
    let outcome = rig.orchestrator.submit_query(Query::new("short job")).await;
    match outcome {
        QueryOutcome::Completed { text, .. } => assert_eq!(text, "Second one done."),
        other => panic!("expected Completed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_shutdown_cancels_every_active_query() {
    let model = ScriptedModel::new(vec![
        ModelScript::Reply(Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "work", "agents": ["researcher"]}"#,
        ))),
        ModelScript::Hang,
    ]);
    let rig = rig(engine_config(), model);
    let query = Query::new("never finishes");
    let query_id = query.id.clone();
    rig.observe(&query_id);
    let orchestrator = rig.orchestrator.clone();
    let handle = tokio::spawn(async move { orchestrator.submit_query(query).await });
    rig.model.wait_for_calls(2).await;

    rig.orchestrator.shutdown();

    let outcome = handle.await.expect("query task");
    match outcome {
        QueryOutcome::Failed { error } => assert!(error.contains("Cancelled")),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(rig.sink.types().last(), Some(&UpdateType::Cancelled));
}
