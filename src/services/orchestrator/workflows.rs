//! Strategy Execution
//!
//! The executor-facing half of the orchestrator: attachment readiness, the
//! single-agent and planned runs, the raw-event pump feeding the normalizer,
//! and a terminal update on every exit path.

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_core::{CanonicalUpdate, UpdateType, WorkflowType};

use crate::models::{ExecutionRequest, QueryOutcome, RunSummary, Strategy};
use crate::services::agents::AgentProfile;
use crate::services::telemetry::{namespaces, EventNormalizer, RawEvent};
use crate::utils::{EngineError, EngineResult};

use super::QueryOrchestrator;

/// Raw events buffered between the executor and the normalizer pump.
const EVENT_BUFFER: usize = 64;

const OVERLOAD_NOTICE: &str = "I'm sorry, the service is experiencing heavy load right now. \
                               Please try again in a moment.";

impl QueryOrchestrator {
    /// Runs a non-direct strategy end to end: wait for attachments, pump raw
    /// telemetry into canonical updates while the executor works, then emit
    /// the terminal update once the pump has drained.
    pub(super) async fn execute(
        &self,
        query_id: &str,
        request: ExecutionRequest,
        cancel: &CancellationToken,
    ) -> QueryOutcome {
        let workflow = request.strategy.workflow_type();

        if !request.attachment_ids.is_empty() {
            if let Err(err) = self.file_gate.wait(&request.attachment_ids, cancel).await {
                return match err {
                    EngineError::Cancelled => self.finish_cancelled(query_id, workflow).await,
                    err => self.finish_failed(query_id, workflow, err).await,
                };
            }
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let pump = self.spawn_pump(query_id, workflow, events_rx);

        let result = match request.strategy {
            Strategy::Planned => self.run_planned(request, &events_tx, cancel).await,
            _ => self.run_single(request, &events_tx, cancel).await,
        };

        // Drain in-flight telemetry before the terminal update so per-query
        // ordering holds.
        drop(events_tx);
        let _ = pump.await;

        match result {
            Ok(summary) => {
                let update = CanonicalUpdate::new(query_id, UpdateType::Result, &summary.text)
                    .with_workflow(workflow)
                    .with_data(json!({
                        "usage": &summary.usage,
                        "iterations": summary.iterations,
                    }));
                self.deliver(update).await;
                QueryOutcome::Completed {
                    text: summary.text,
                    workflow_type: workflow,
                    usage: summary.usage,
                }
            }
            Err(EngineError::Cancelled) => self.finish_cancelled(query_id, workflow).await,
            Err(err) if err.is_overloaded() => {
                self.deliver(
                    CanonicalUpdate::new(query_id, UpdateType::Error, OVERLOAD_NOTICE)
                        .with_workflow(workflow),
                )
                .await;
                QueryOutcome::Overloaded {
                    message: OVERLOAD_NOTICE.to_string(),
                }
            }
            Err(err) => self.finish_failed(query_id, workflow, err).await,
        }
    }

    async fn run_single(
        &self,
        mut request: ExecutionRequest,
        events: &mpsc::Sender<RawEvent>,
        cancel: &CancellationToken,
    ) -> EngineResult<RunSummary> {
        let profile = self.registry.resolve_or_default(&request.agent_selection);
        request.long_running = profile.long_running;
        emit_routing(events, &profile).await;
        self.executor.run(&request, &profile, events, cancel).await
    }

    /// Ask the model for a plan, then run its steps in order, feeding each
    /// step's output into the next step's prompt. An unusable plan degrades
    /// to a single run rather than failing the query.
    async fn run_planned(
        &self,
        request: ExecutionRequest,
        events: &mpsc::Sender<RawEvent>,
        cancel: &CancellationToken,
    ) -> EngineResult<RunSummary> {
        let outcome = self
            .planner
            .generate(&request, &self.registry, cancel)
            .await?;

        // The raw plan goes through the pump; only replies that actually
        // contain steps surface as a plan update.
        let event = RawEvent::new(namespaces::WORKFLOW_PLANNER)
            .with_payload(json!({ "content": outcome.raw }));
        let _ = events.send(event).await;

        let Some(plan) = outcome.plan else {
            warn!("plan unusable, degrading to a single-agent run");
            let mut summary = self.run_single(request, events, cancel).await?;
            summary.usage.add(&outcome.usage);
            return Ok(summary);
        };

        let mut total = RunSummary::new(String::new(), outcome.usage, 0);
        let mut prior = String::new();
        let step_count = plan.steps.len();

        for (index, step) in plan.steps.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let profile = self
                .registry
                .resolve_or_default(std::slice::from_ref(&step.agent));
            debug!(
                step = index + 1,
                of = step_count,
                agent = %profile.name,
                "running plan step"
            );

            let step_request = ExecutionRequest::new(
                Strategy::Planned,
                compose_step_message(&request.message, &step.task, &prior, index, step_count),
            )
            .with_history(request.history.clone())
            .with_agents(vec![step.agent])
            .with_long_running(profile.long_running);

            emit_routing(events, &profile).await;
            let run = self
                .executor
                .run(&step_request, &profile, events, cancel)
                .await?;
            prior = run.text.clone();
            total.absorb(run);
        }

        Ok(total)
    }

    /// Normalizes raw events into canonical updates for one query until the
    /// last sender drops.
    fn spawn_pump(
        &self,
        query_id: &str,
        workflow: WorkflowType,
        mut events: mpsc::Receiver<RawEvent>,
    ) -> JoinHandle<()> {
        let normalizer =
            EventNormalizer::new(query_id, self.registry.clone()).with_workflow(workflow);
        let channel = self.channel.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Some(update) = normalizer.classify(&event) {
                    channel.send(&update).await;
                }
            }
        })
    }

    async fn finish_cancelled(&self, query_id: &str, workflow: WorkflowType) -> QueryOutcome {
        info!(query_id = %query_id, "query cancelled");
        self.deliver(
            CanonicalUpdate::new(query_id, UpdateType::Cancelled, "Query cancelled")
                .with_workflow(workflow),
        )
        .await;
        QueryOutcome::Failed {
            error: EngineError::Cancelled.to_string(),
        }
    }

    async fn finish_failed(
        &self,
        query_id: &str,
        workflow: WorkflowType,
        err: EngineError,
    ) -> QueryOutcome {
        warn!(query_id = %query_id, error = %err, "query aborted");
        let error = err.to_string();
        self.deliver(
            CanonicalUpdate::new(query_id, UpdateType::Error, &error).with_workflow(workflow),
        )
        .await;
        QueryOutcome::Failed { error }
    }
}

async fn emit_routing(events: &mpsc::Sender<RawEvent>, profile: &AgentProfile) {
    let event = RawEvent::new(namespaces::WORKFLOW_ROUTING)
        .with_context("agent_name", json!(profile.name.clone()));
    if events.send(event).await.is_err() {
        debug!("event pump closed before routing event");
    }
}

fn compose_step_message(
    original: &str,
    task: &str,
    prior: &str,
    index: usize,
    count: usize,
) -> String {
    let mut message = format!(
        "Step {} of {}: {}\n\nOriginal request: {}",
        index + 1,
        count,
        task,
        original
    );
    if !prior.is_empty() {
        message.push_str("\n\nOutput from the previous step:\n");
        message.push_str(prior);
    }
    message
}
