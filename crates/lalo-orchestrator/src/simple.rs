//! Simple/specialized path (spec §4.5): one model, no DAG, with
//! candidate-model fallback on retryable errors and a confidence-gated
//! retry/escalate loop.
//!
//! Grounded on the fallback-chain idiom used for model dispatch elsewhere
//! in this workspace (walk `recommended` in order, record each miss, stop
//! at the first success) combined with this crate's own
//! confidence-escalation design: when retries are exhausted without
//! reaching [`Recommendation::Accept`], the request escalates to a minimal
//! two-step complex plan (generate + confidence_check) on a complex-capable
//! model, rather than failing outright.

use crate::generate::GeneratedOutcome;
use crate::request::AgentRequest;
use crate::usage::{classify_fallback_outcome, UsageSummary};
use lalo_kernel::error::LaloError;
use lalo_kernel::event::Event;
use lalo_kernel::plan::RoutingDecision;
use lalo_kernel::telemetry::{FallbackAttempt, FallbackOutcome, FallbackTrace};
use lalo_kernel::validator::Recommendation;
use lalo_local_llm::CancellationHandle;
use tokio::sync::mpsc;

use crate::orchestrator::Orchestrator;

impl Orchestrator {
    pub(crate) async fn run_simple(
        &self,
        request: &AgentRequest,
        decision: &RoutingDecision,
        cancel: &CancellationHandle,
        tx: &mpsc::Sender<Event>,
    ) -> Result<(String, UsageSummary), LaloError> {
        let mut candidates = decision.recommended.clone();
        if candidates.is_empty() {
            return Err(LaloError::invalid_request("routing decision carried no recommended models"));
        }

        let mut trace = FallbackTrace { request_id: request.id.clone(), attempts: Vec::new() };
        let max_retries = self.config.max_retries_per_step.max(1);

        let mut attempt_no = 0u32;
        let mut last_err: Option<LaloError> = None;

        while !candidates.is_empty() {
            let model_id = candidates.remove(0);
            let mut retries_left = max_retries;

            loop {
                attempt_no += 1;
                if cancel.is_cancelled() {
                    return Err(LaloError::Cancelled);
                }

                let outcome = self
                    .generate_text(&model_id, request, &request.prompt, None, cancel, tx)
                    .await;

                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        trace.attempts.push(FallbackAttempt {
                            attempt_no,
                            attempted_model: model_id.clone(),
                            outcome: classify_fallback_outcome(&err),
                            note: err.to_string(),
                        });
                        last_err = Some(err.clone());
                        if err.is_retryable() {
                            break; // try the next candidate model
                        }
                        self.telemetry.record_fallback(trace.clone()).await;
                        self.usage_repo.attach_fallbacks(trace).await;
                        return Err(err);
                    }
                };

                let report = self.score_text_and_emit(&outcome.text, tx).await;
                let summary_text = crate::usage::summarize(&outcome.text);
                let _ = tx
                    .send(Event::StepComplete { step_id: 0, summary: summary_text })
                    .await;

                match report.recommendation {
                    Recommendation::Accept => {
                        trace.attempts.push(FallbackAttempt {
                            attempt_no,
                            attempted_model: model_id.clone(),
                            outcome: FallbackOutcome::Used,
                            note: "accepted".to_string(),
                        });
                        if trace.attempts.len() > 1 {
                            self.telemetry.record_fallback(trace.clone()).await;
                            self.usage_repo.attach_fallbacks(trace).await;
                        }
                        return Ok((outcome.text, to_usage_summary(&outcome)));
                    }
                    Recommendation::Retry if retries_left > 0 => {
                        retries_left -= 1;
                        trace.attempts.push(FallbackAttempt {
                            attempt_no,
                            attempted_model: model_id.clone(),
                            outcome: FallbackOutcome::RejectedByConfidence,
                            note: "low confidence, retrying same model".to_string(),
                        });
                        continue;
                    }
                    Recommendation::Retry | Recommendation::Escalate => {
                        trace.attempts.push(FallbackAttempt {
                            attempt_no,
                            attempted_model: model_id.clone(),
                            outcome: FallbackOutcome::RejectedByConfidence,
                            note: format!("confidence recommendation: {}", report.recommendation),
                        });
                        self.telemetry.record_fallback(trace.clone()).await;
                        self.usage_repo.attach_fallbacks(trace.clone()).await;
                        return self.escalate_to_complex(request, decision, cancel, tx, trace).await;
                    }
                }
            }
        }

        self.telemetry.record_fallback(trace.clone()).await;
        self.usage_repo.attach_fallbacks(trace).await;
        Err(last_err.unwrap_or_else(|| LaloError::ModelUnavailable("no candidate model succeeded".to_string())))
    }

    /// Synthesizes a minimal two-step complex plan (generate + confidence
    /// check) on the best complex-capable candidate and runs it, used when
    /// the simple path exhausts its retries without an accepted answer
    /// (spec §4.5 "escalate to the complex path on repeated low confidence").
    async fn escalate_to_complex(
        &self,
        request: &AgentRequest,
        decision: &RoutingDecision,
        cancel: &CancellationHandle,
        tx: &mpsc::Sender<Event>,
        mut trace: FallbackTrace,
    ) -> Result<(String, UsageSummary), LaloError> {
        let plan = self.synthesize_plan(request, decision);
        match self.run_plan(request, &plan, cancel, tx).await {
            Ok(result) => Ok(result),
            Err(err) => {
                trace.attempts.push(FallbackAttempt {
                    attempt_no: trace.attempts.len() as u32 + 1,
                    attempted_model: "escalated-plan".to_string(),
                    outcome: classify_fallback_outcome(&err),
                    note: err.to_string(),
                });
                self.telemetry.record_fallback(trace.clone()).await;
                self.usage_repo.attach_fallbacks(trace).await;
                Err(err)
            }
        }
    }
}

fn to_usage_summary(outcome: &GeneratedOutcome) -> UsageSummary {
    UsageSummary {
        model_id: outcome.model_id.clone(),
        prompt_tokens: outcome.prompt_tokens,
        completion_tokens: outcome.completion_tokens,
        total_tokens: outcome.prompt_tokens + outcome.completion_tokens,
    }
}
