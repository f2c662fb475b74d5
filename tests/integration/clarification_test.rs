//! Both suspension points: the classifier asking before any run starts, and
//! the model asking mid-run through its reserved tool.

use std::time::Duration;

use serde_json::json;

use switchboard::{Query, QueryOutcome, UpdateType, WorkflowType};
use switchboard_llm::ContentBlock;

use crate::support::*;

#[tokio::test]
async fn test_pre_run_clarification_suspends_and_resumes() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "ambiguous",
                "needs_clarification": true, "clarifying_questions": ["Which region?", "Which year?"],
                "agents": ["researcher"]}"#,
        )),
        Ok(text_response("EMEA grew 4% in 2024.")),
    ]);
    let rig = rig(engine_config(), model);

    let first = Query::new("how did we grow").with_conversation("conv-7");
    rig.observe(&first.id);
    let outcome = rig.orchestrator.submit_query(first).await;
    match outcome {
        QueryOutcome::NeedsClarification { questions } => {
            assert_eq!(questions.len(), 2);
        }
        other => panic!("expected NeedsClarification, got {:?}", other),
    }

    // The suspended turn surfaced exactly one update carrying the questions.
    let updates = rig.sink.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_type, UpdateType::Clarification);
    assert_eq!(updates[0].message, "Which region?\nWhich year?");
    assert_eq!(
        updates[0].data,
        Some(json!({"questions": ["Which region?", "Which year?"]}))
    );

    // The answer resumes the stored strategy; no second classification.
    let second = Query::new("EMEA, 2024").with_conversation("conv-7");
    rig.observe(&second.id);
    let outcome = rig.orchestrator.submit_query(second).await;
    match outcome {
        QueryOutcome::Completed {
            text,
            workflow_type,
            ..
        } => {
            assert_eq!(text, "EMEA grew 4% in 2024.");
            assert_eq!(workflow_type, WorkflowType::SingleAgent);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 2);

    let messages = rig.sink.messages();
    assert!(messages.iter().any(|m| m == "Routing to Research Agent"));
}

#[tokio::test]
async fn test_clarification_on_direct_strategy_coerced_to_agent_run() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 1, "strategy": "direct", "rationale": "unclear", "direct_answer": "maybe",
                "needs_clarification": true, "clarifying_questions": ["Which file?"]}"#,
        )),
        Ok(text_response("The sales file has 3 sheets.")),
    ]);
    let rig = rig(engine_config(), model);

    let first = Query::new("open it").with_conversation("conv-8");
    rig.observe(&first.id);
    let outcome = rig.orchestrator.submit_query(first).await;
    assert!(matches!(outcome, QueryOutcome::NeedsClarification { .. }));

    // The resumed turn runs an agent: a clarification never rides on the
    // direct strategy, whatever the classifier said.
    let second = Query::new("the sales file").with_conversation("conv-8");
    rig.observe(&second.id);
    let outcome = rig.orchestrator.submit_query(second).await;
    match outcome {
        QueryOutcome::Completed { workflow_type, .. } => {
            assert_eq!(workflow_type, WorkflowType::SingleAgent);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_mid_run_question_suspends_until_answered() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "needs input", "agents": ["researcher"]}"#,
        )),
        Ok(tool_use_response(
            "ask-1",
            "ask_user",
            json!({"question": "Which year?"}),
        )),
        Ok(text_response("The 2024 totals are ready.")),
    ]);
    let rig = rig(engine_config(), model);
    let query = Query::new("pull the yearly totals");
    rig.observe(&query.id);

    let orchestrator = rig.orchestrator.clone();
    let handle = tokio::spawn(async move { orchestrator.submit_query(query).await });

    // The run parks on the broker; the question reaches the observer with
    // the id needed to answer it.
    let mut request_id = None;
    for _ in 0..500 {
        if let Some(update) = rig
            .sink
            .updates()
            .into_iter()
            .find(|u| u.update_type == UpdateType::Clarification)
        {
            assert_eq!(update.message, "Which year?");
            request_id = update
                .data
                .and_then(|d| d.get("request_id").and_then(|v| v.as_str().map(String::from)));
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let request_id = request_id.expect("clarification update with a request id");

    assert!(rig.orchestrator.resolve_human_input(&request_id, "Use 2024"));
    let outcome = handle.await.expect("orchestrator task");
    match outcome {
        QueryOutcome::Completed { text, .. } => assert_eq!(text, "The 2024 totals are ready."),
        other => panic!("expected Completed, got {:?}", other),
    }

    // The answer went back to the model as the tool's result.
    let captured = rig.model.captured();
    let resumed = captured[2].last().cloned().expect("resumed turn");
    match resumed.content.first() {
        Some(ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        }) => {
            assert_eq!(tool_use_id, "ask-1");
            assert_eq!(content, "Use 2024");
            assert!(!is_error);
        }
        other => panic!("expected a tool result turn, got {:?}", other),
    }

    // The reserved tool's call echo stays internal; a second resolution
    // finds nothing to resolve.
    assert!(!rig.sink.types().contains(&UpdateType::CallingTool));
    assert!(!rig.orchestrator.resolve_human_input(&request_id, "again"));
}
