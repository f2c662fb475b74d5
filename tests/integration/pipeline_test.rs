//! Direct answers, single-agent runs with tools, and validation rejection,
//! all driven through `submit_query`.

use serde_json::json;

use switchboard::{Query, QueryOutcome, UpdateType, WorkflowType};

use crate::support::*;

#[tokio::test]
async fn test_direct_answer_emits_exactly_one_result_update() {
    let model = ScriptedModel::replies(vec![Ok(text_response(
        r#"{"case": 1, "strategy": "direct", "rationale": "greeting", "direct_answer": "Hi there"}"#,
    ))]);
    let rig = rig(engine_config(), model);
    let query = Query::new("hello");
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Completed {
            text,
            workflow_type,
            ..
        } => {
            assert_eq!(text, "Hi there");
            assert_eq!(workflow_type, WorkflowType::Simple);
        }
        other => panic!("expected Completed, got {:?}", other),
    }

    // One classification call and nothing else: no executor run happened.
    assert_eq!(rig.model.calls(), 1);
    let updates = rig.sink.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_type, UpdateType::Result);
    assert_eq!(updates[0].message, "Hi there");
    assert_eq!(updates[0].workflow_type, Some(WorkflowType::Simple));
}

#[tokio::test]
async fn test_single_agent_run_with_tool_round_trip() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "needs lookup", "agents": ["researcher"]}"#,
        )),
        Ok(tool_use_response("call-1", "echo", json!({"text": "price of tea"}))),
        Ok(text_response("The price is 4 coins.")),
    ]);
    let rig = rig(engine_config(), model);
    let query = Query::new("look up the price of tea");
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Completed {
            text,
            workflow_type,
            ..
        } => {
            assert_eq!(text, "The price is 4 coins.");
            assert_eq!(workflow_type, WorkflowType::SingleAgent);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 3);

    // The observer saw the routing, the tool call, its result, and the
    // final answer, in that order.
    let types = rig.sink.types();
    assert_eq!(types.first(), Some(&UpdateType::Routing));
    assert_eq!(types.last(), Some(&UpdateType::Result));
    let tool_call_pos = types
        .iter()
        .position(|t| *t == UpdateType::CallingTool)
        .expect("calling_tool update missing");
    let tool_result_pos = types
        .iter()
        .position(|t| *t == UpdateType::ToolResult)
        .expect("tool_result update missing");
    assert!(tool_call_pos < tool_result_pos);

    let messages = rig.sink.messages();
    assert!(messages
        .iter()
        .any(|m| m.starts_with("Calling tool: echo")));
    assert!(messages.iter().any(|m| m.contains("echo: \"price of tea\"")));
}

#[tokio::test]
async fn test_unknown_agent_selection_falls_back_to_default() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "route", "agents": ["ghost"]}"#,
        )),
        Ok(text_response("Handled by the generalist.")),
    ]);
    let rig = rig(engine_config(), model);
    let query = Query::new("do something");
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    assert!(matches!(outcome, QueryOutcome::Completed { .. }));
    let messages = rig.sink.messages();
    assert!(messages.iter().any(|m| m == "Routing to Assistant"));
}

#[tokio::test]
async fn test_blank_query_rejected_without_updates() {
    let model = ScriptedModel::replies(vec![]);
    let rig = rig(engine_config(), model);
    let query = Query::new("  \n ");
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Failed { error } => assert!(error.contains("Validation")),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 0);
    assert!(rig.sink.updates().is_empty());
}

#[tokio::test]
async fn test_planned_strategy_runs_steps_and_emits_plan() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 3, "strategy": "planned", "rationale": "multi part", "agents": ["researcher"]}"#,
        )),
        Ok(text_response(
            r#"{"steps": [{"agent": "researcher", "task": "gather the figures"},
                           {"agent": "researcher", "task": "write the summary"}]}"#,
        )),
        Ok(text_response("Figures: 10, 20, 30.")),
        Ok(text_response("Summary: totals trended up.")),
    ]);
    let rig = rig(engine_config(), model);
    let query = Query::new("summarize this quarter");
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Completed {
            text,
            workflow_type,
            ..
        } => {
            assert_eq!(text, "Figures: 10, 20, 30.\n\nSummary: totals trended up.");
            assert_eq!(workflow_type, WorkflowType::Planned);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 4);

    let updates = rig.sink.updates();
    assert!(updates
        .iter()
        .any(|u| u.update_type == UpdateType::Plan && u.message == "Plan with 2 steps"));

    // Step two saw step one's output.
    let captured = rig.model.captured();
    let step_two_prompt = captured[3].last().map(|m| m.text()).unwrap_or_default();
    assert!(step_two_prompt.contains("write the summary"));
    assert!(step_two_prompt.contains("Figures: 10, 20, 30."));
}
