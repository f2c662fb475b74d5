//! Failure-path behavior end to end: the breaker cooldown, transient model
//! retries, the classification fallback, and delivery that never takes a
//! query down with it.

use std::time::Duration;

use switchboard::{DeliveryError, ModelError, Query, QueryOutcome, UpdateType, WorkflowType};

use crate::support::*;

#[tokio::test]
async fn test_breaker_cooldown_refuses_then_recovers() {
    let mut config = engine_config();
    config.breaker.reset_after_secs = 1;
    let model = ScriptedModel::replies(vec![
        Err(ModelError::Overloaded("upstream saturated".into())),
        Ok(text_response(
            r#"{"case": 1, "strategy": "direct", "rationale": "greeting", "direct_answer": "Hello again"}"#,
        )),
    ]);
    let rig = rig(config, model);

    let outcome = rig.orchestrator.submit_query(Query::new("first")).await;
    assert!(matches!(outcome, QueryOutcome::Overloaded { .. }));
    assert_eq!(rig.model.calls(), 1);

    // Inside the cooldown the model is never consulted.
    let outcome = rig.orchestrator.submit_query(Query::new("second")).await;
    assert!(matches!(outcome, QueryOutcome::Overloaded { .. }));
    assert_eq!(rig.model.calls(), 1);

    // Once the window lapses the next query reaches the model again.
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    let outcome = rig.orchestrator.submit_query(Query::new("third")).await;
    match outcome {
        QueryOutcome::Completed { text, .. } => assert_eq!(text, "Hello again"),
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 2);
}

#[tokio::test]
async fn test_transient_classification_error_retried_within_one_query() {
    let model = ScriptedModel::replies(vec![
        Err(ModelError::RateLimited { retry_after: None }),
        Ok(text_response(
            r#"{"case": 1, "strategy": "direct", "rationale": "greeting", "direct_answer": "Still here"}"#,
        )),
    ]);
    let rig = rig(engine_config(), model);

    let outcome = rig.orchestrator.submit_query(Query::new("are you there")).await;

    match outcome {
        QueryOutcome::Completed { text, .. } => assert_eq!(text, "Still here"),
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 2);
}

#[tokio::test]
async fn test_exhausted_classification_falls_back_to_agent_run() {
    let model = ScriptedModel::replies(vec![
        Err(ModelError::RateLimited { retry_after: Some(1) }),
        Err(ModelError::Timeout("request timed out".into())),
        Err(ModelError::RateLimited { retry_after: None }),
        Ok(text_response("Recovered and answered anyway.")),
    ]);
    let rig = rig(engine_config(), model);
    let query = Query::new("what changed last week");
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Completed {
            text,
            workflow_type,
            ..
        } => {
            assert_eq!(text, "Recovered and answered anyway.");
            assert_eq!(workflow_type, WorkflowType::SingleAgent);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    // Three classification attempts, then the fallback run's own call.
    assert_eq!(rig.model.calls(), 4);
    assert!(rig.sink.messages().iter().any(|m| m == "Routing to Assistant"));
}

#[tokio::test]
async fn test_executor_overload_aborts_and_trips_breaker() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "needs tools", "agents": ["researcher"]}"#,
        )),
        Err(ModelError::Overloaded("saturated".into())),
    ]);
    let rig = rig(engine_config(), model);
    let query = Query::new("run the report");
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Overloaded { message } => assert!(message.contains("heavy load")),
        other => panic!("expected Overloaded, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 2);
    let updates = rig.sink.updates();
    let last = updates.last().expect("terminal update");
    assert_eq!(last.update_type, UpdateType::Error);
    assert!(last.message.contains("heavy load"));

    // Tripped on the way down: the next query never reaches the model.
    let outcome = rig.orchestrator.submit_query(Query::new("again")).await;
    assert!(matches!(outcome, QueryOutcome::Overloaded { .. }));
    assert_eq!(rig.model.calls(), 2);
}

#[tokio::test]
async fn test_transient_delivery_failures_retried_until_landed() {
    let model = ScriptedModel::replies(vec![Ok(text_response(
        r#"{"case": 1, "strategy": "direct", "rationale": "greeting", "direct_answer": "All good"}"#,
    ))]);
    let rig = rig(engine_config(), model);
    let flaky = FlakySink::new(vec![
        DeliveryError::Transient("buffer full".into()),
        DeliveryError::Transient("buffer full".into()),
    ]);
    let query = Query::new("hello");
    rig.orchestrator.register_observer(&query.id, flaky.clone());

    let outcome = rig.orchestrator.submit_query(query).await;

    assert!(matches!(outcome, QueryOutcome::Completed { .. }));
    // Two failures, then the update landed on the third attempt.
    assert_eq!(flaky.push_count(), 3);
    let received = flaky.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].update_type, UpdateType::Result);
}

#[tokio::test]
async fn test_delivery_given_up_entirely_still_completes_the_query() {
    let model = ScriptedModel::replies(vec![Ok(text_response(
        r#"{"case": 1, "strategy": "direct", "rationale": "greeting", "direct_answer": "All good"}"#,
    ))]);
    let rig = rig(engine_config(), model);
    let failures = (0..8)
        .map(|_| DeliveryError::Transient("buffer full".into()))
        .collect();
    let flaky = FlakySink::new(failures);
    let query = Query::new("hello");
    rig.orchestrator.register_observer(&query.id, flaky.clone());

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Completed { text, .. } => assert_eq!(text, "All good"),
        other => panic!("expected Completed, got {:?}", other),
    }
    // Initial attempt plus the configured retries, then the engine moved on.
    assert_eq!(flaky.push_count(), 4);
    assert!(flaky.received().is_empty());
}

#[tokio::test]
async fn test_closed_observer_stops_delivery_mid_run() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "work", "agents": ["researcher"]}"#,
        )),
        Ok(text_response("Done.")),
    ]);
    let rig = rig(engine_config(), model);
    let flaky = FlakySink::new(vec![DeliveryError::Closed]);
    let query = Query::new("do the thing");
    rig.orchestrator.register_observer(&query.id, flaky.clone());

    let outcome = rig.orchestrator.submit_query(query).await;

    assert!(matches!(outcome, QueryOutcome::Completed { .. }));
    // The first push found the connection gone; no retry, and every later
    // update was skipped.
    assert_eq!(flaky.push_count(), 1);
    assert!(flaky.received().is_empty());
}
