//! Attachment readiness as seen from the outside: queries proceed once
//! files land, abort on the first failure, and give up with a structured
//! timeout when processing never finishes.

use switchboard::{FileRecord, FileStatus, Query, QueryOutcome, UpdateType};

use crate::support::*;

#[tokio::test]
async fn test_ready_attachments_proceed_to_the_run() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "file work", "agents": ["researcher"]}"#,
        )),
        Ok(text_response("The report covers March.")),
    ]);
    let files = StaticFiles::new(vec![
        FileRecord::new("f1", "report.pdf", FileStatus::Completed),
        FileRecord::new("f2", "notes.docx", FileStatus::Completed),
    ]);
    let rig = rig_with_files(engine_config(), model, files);
    let query =
        Query::new("summarize the report").with_attachments(vec!["f1".into(), "f2".into()]);
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Completed { text, .. } => assert_eq!(text, "The report covers March."),
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 2);
}

#[tokio::test]
async fn test_failed_attachment_aborts_before_any_run() {
    let model = ScriptedModel::replies(vec![Ok(text_response(
        r#"{"case": 2, "strategy": "single_agent", "rationale": "file work", "agents": ["researcher"]}"#,
    ))]);
    let files = StaticFiles::new(vec![
        FileRecord::new("ok", "fine.pdf", FileStatus::Completed),
        FileRecord::new("bad", "broken.pdf", FileStatus::Pending).with_error("upload was corrupted"),
    ]);
    let rig = rig_with_files(engine_config(), model, files);
    let query = Query::new("compare the files").with_attachments(vec!["ok".into(), "bad".into()]);
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Failed { error } => assert!(error.contains("upload was corrupted")),
        other => panic!("expected Failed, got {:?}", other),
    }
    // Classification ran; the executor never did.
    assert_eq!(rig.model.calls(), 1);
    let updates = rig.sink.updates();
    let last = updates.last().expect("terminal update");
    assert_eq!(last.update_type, UpdateType::Error);
    assert!(last.message.contains("upload was corrupted"));
}

#[tokio::test(start_paused = true)]
async fn test_stuck_attachment_times_out_with_structured_error() {
    let mut config = engine_config();
    config.attachments.poll_interval_ms = 100;
    config.attachments.timeout_secs = 1;
    let model = ScriptedModel::replies(vec![Ok(text_response(
        r#"{"case": 2, "strategy": "single_agent", "rationale": "file work", "agents": ["researcher"]}"#,
    ))]);
    let files = StaticFiles::new(vec![FileRecord::new("slow", "huge.pdf", FileStatus::Processing)]);
    let rig = rig_with_files(config, model, files);
    let query = Query::new("read the archive").with_attachments(vec!["slow".into()]);
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Failed { error } => assert!(error.contains("timed out after 1s")),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 1);
    let last = rig.sink.updates().pop().expect("terminal update");
    assert_eq!(last.update_type, UpdateType::Error);
}

#[tokio::test]
async fn test_image_attachments_skip_the_wait() {
    let model = ScriptedModel::replies(vec![
        Ok(text_response(
            r#"{"case": 2, "strategy": "single_agent", "rationale": "image work", "agents": ["researcher"]}"#,
        )),
        Ok(text_response("The chart shows a spike in May.")),
    ]);
    // Never reaches completed, but images are usable as-is.
    let files = StaticFiles::new(vec![FileRecord::new("img", "chart.png", FileStatus::Pending)]);
    let rig = rig_with_files(engine_config(), model, files);
    let query = Query::new("describe the chart").with_attachments(vec!["img".into()]);
    rig.observe(&query.id);

    let outcome = rig.orchestrator.submit_query(query).await;

    match outcome {
        QueryOutcome::Completed { text, .. } => assert_eq!(text, "The chart shows a spike in May."),
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(rig.model.calls(), 2);
}
