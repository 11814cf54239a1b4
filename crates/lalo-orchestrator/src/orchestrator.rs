//! The Agent Orchestrator itself (spec §4.5): the single entry point that
//! takes a Router [`RoutingDecision`] and a [`AgentRequest`] and drives them
//! to a terminal [`Event::Done`] or [`Event::Error`], streaming progress as
//! it goes.
//!
//! Grounded on `message_graph/executor.rs`'s `JoinSet`-based wavefront
//! execution (generalised into `lalo_kernel::plan::execute_plan`, which this
//! crate specialises via [`crate::plan_exec::StepExecutor`]) and on the
//! "one struct holding every collaborator, cloned cheaply into a spawned
//! task" idiom used by HTTP-facing application state elsewhere in this
//! workspace.

use crate::request::AgentRequest;
use crate::usage::UsageSummary;
use lalo_foundation::cloud::CloudAdapter;
use lalo_foundation::config::LaloConfig;
use lalo_foundation::ModelRegistry;
use lalo_kernel::error::LaloError;
use lalo_kernel::event::{Event, UsageView};
use lalo_kernel::plan::{Path, RoutingDecision};
use lalo_kernel::telemetry::{TelemetrySink, UsageRepository};
use lalo_kernel::tools::ToolExecutor;
use lalo_kernel::validator::ConfidenceValidator;
use lalo_local_llm::{CancellationHandle, LocalInferencePool};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Every collaborator the orchestrator needs, held by `Arc`/cheap-`Clone`
/// so one instance can be shared across concurrently in-flight requests
/// (spec §9's "process-scoped context" redesign note, applied one layer
/// down from the Request Handler façade).
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) pool: Arc<LocalInferencePool>,
    pub(crate) cloud: Arc<dyn CloudAdapter>,
    pub(crate) tools: Arc<dyn ToolExecutor>,
    pub(crate) validator: Arc<ConfidenceValidator>,
    pub(crate) telemetry: Arc<dyn TelemetrySink>,
    pub(crate) usage_repo: Arc<dyn UsageRepository>,
    pub(crate) config: LaloConfig,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        pool: Arc<LocalInferencePool>,
        cloud: Arc<dyn CloudAdapter>,
        tools: Arc<dyn ToolExecutor>,
        validator: Arc<ConfidenceValidator>,
        telemetry: Arc<dyn TelemetrySink>,
        usage_repo: Arc<dyn UsageRepository>,
        config: LaloConfig,
    ) -> Self {
        Self {
            registry,
            pool,
            cloud,
            tools,
            validator,
            telemetry,
            usage_repo,
            config,
        }
    }

    /// Runs `request` against `decision` to completion, streaming every
    /// [`Event`] as it happens. The returned receiver always yields exactly
    /// one terminal event ([`Event::Done`] or [`Event::Error`]) last (spec
    /// §4.5, §8 "Event ordering invariant").
    pub fn execute(&self, request: AgentRequest, decision: RoutingDecision, cancel: CancellationHandle) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(self.config.max_parallel_steps_per_request.max(1) * 8 + 16);
        let this = self.clone();
        tokio::spawn(async move { this.run(request, decision, cancel, tx).await });
        rx
    }

    /// Convenience wrapper for callers that don't need incremental
    /// streaming: drains [`Orchestrator::execute`]'s stream and returns the
    /// final text, or the terminal error.
    pub async fn execute_blocking(
        &self,
        request: AgentRequest,
        decision: RoutingDecision,
        cancel: CancellationHandle,
    ) -> Result<(String, UsageView), LaloError> {
        let mut rx = self.execute(request, decision, cancel);
        let mut last_error: Option<LaloError> = None;
        while let Some(event) = rx.recv().await {
            match event {
                Event::Done { final_text, usage } => return Ok((final_text, usage)),
                Event::Error { kind, message } => last_error = Some(error_from_wire(&kind, message)),
                _ => {}
            }
        }
        Err(last_error.unwrap_or_else(|| LaloError::internal("orchestrator stream closed without a terminal event")))
    }

    async fn run(&self, request: AgentRequest, decision: RoutingDecision, cancel: CancellationHandle, tx: mpsc::Sender<Event>) {
        let known_ids = self.registry.ids();
        if let Err(err) = decision.validate(&known_ids) {
            let _ = tx.send(terminal_error(&err)).await;
            return;
        }

        let _ = tx.send(Event::Routing { decision: decision.clone() }).await;

        if cancel.is_cancelled() {
            let _ = tx.send(terminal_error(&LaloError::Cancelled)).await;
            return;
        }

        let outcome = match decision.path {
            Path::Simple | Path::Specialized => self.run_simple(&request, &decision, &cancel, &tx).await,
            Path::Complex => self.run_complex(&request, &decision, &cancel, &tx).await,
        };

        match outcome {
            Ok((final_text, usage)) => {
                let path_label = format!("{:?}", decision.path).to_lowercase();
                self.record_request_usage(&request, &usage, &path_label, true).await;
                let _ = tx
                    .send(Event::Done {
                        final_text,
                        usage: UsageView {
                            model_id: usage.model_id,
                            prompt_tokens: usage.prompt_tokens,
                            completion_tokens: usage.completion_tokens,
                            total_tokens: usage.total_tokens,
                        },
                    })
                    .await;
            }
            Err(err) => {
                let path_label = format!("{:?}", decision.path).to_lowercase();
                self.record_request_usage(
                    &request,
                    &UsageSummary::for_exchange("none", &request.prompt, ""),
                    &path_label,
                    false,
                )
                .await;
                let _ = tx.send(terminal_error(&err)).await;
            }
        }
    }

    async fn record_request_usage(&self, request: &AgentRequest, usage: &UsageSummary, path: &str, succeeded: bool) {
        let record = lalo_kernel::telemetry::UsageRecord {
            request_id: request.id.clone(),
            user_id: request.user_id.clone(),
            model_id: usage.model_id.clone(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost_micro_usd: 0,
            timestamp: chrono::Utc::now().timestamp() as u64,
            path: path.to_string(),
            succeeded,
        };
        self.telemetry.record_usage(record.clone()).await;
        self.usage_repo.record_usage(record).await;
    }
}

fn terminal_error(err: &LaloError) -> Event {
    Event::Error {
        kind: err.kind().to_string(),
        message: err.to_string(),
    }
}

fn error_from_wire(kind: &str, message: String) -> LaloError {
    match kind {
        "cancelled" => LaloError::Cancelled,
        "invalid_request" => LaloError::InvalidRequest(message),
        "model_unavailable" => LaloError::ModelUnavailable(message),
        _ => LaloError::Internal(message),
    }
}
