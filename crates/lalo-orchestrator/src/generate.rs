//! Unified "ask a model" call, covering both the Local Inference Pool and
//! the Cloud Adapter behind one interface (spec §4.3 "unify external
//! providers under the same generate/stream interface as local models").
//!
//! Grounded on `lalo_local_llm::pool::stream_text`'s word-chunking idiom:
//! a cloud completion is not natively streamed by [`CloudAdapter::complete`]
//! (single-attempt, spec §4.3), so it is chunked the same way before being
//! forwarded as [`Event::Token`]s, keeping both call shapes indistinguishable
//! to the rest of the orchestrator.

use crate::orchestrator::Orchestrator;
use crate::request::{provider_key, AgentRequest};
use lalo_foundation::cloud::CloudCompletionRequest;
use lalo_foundation::registry::Specialty;
use lalo_kernel::error::LaloError;
use lalo_kernel::event::Event;
use lalo_kernel::telemetry::estimate_tokens;
use lalo_kernel::validator::{ConfidenceReport, RawScores};
use lalo_local_llm::{CancellationHandle, GenerationEvent, GenerationRequest};
use tokio::sync::mpsc;

/// Output of one generation call, independent of which backend served it.
#[derive(Debug, Clone)]
pub(crate) struct GeneratedOutcome {
    pub model_id: String,
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Orchestrator {
    /// Generates from `model_id`, streaming [`Event::Token`]s to `tx` as
    /// they are produced, local or cloud alike.
    pub(crate) async fn generate_text(
        &self,
        model_id: &str,
        request: &AgentRequest,
        prompt: &str,
        step_id: Option<u32>,
        cancel: &CancellationHandle,
        tx: &mpsc::Sender<Event>,
    ) -> Result<GeneratedOutcome, LaloError> {
        let descriptor = self
            .registry
            .lookup(model_id)
            .cloned()
            .ok_or_else(|| LaloError::ModelUnavailable(model_id.to_string()))?;
        if descriptor.unavailable {
            return Err(LaloError::ModelUnavailable(model_id.to_string()));
        }

        if self.pool.demo_mode() || descriptor.backend.is_local() {
            let gen_request = GenerationRequest {
                model_id: model_id.to_string(),
                prompt: prompt.to_string(),
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
                top_p: request.top_p,
            };
            let mut rx = self.pool.generate_stream(gen_request, cancel.clone()).await?;
            let mut text = String::new();
            while let Some(event) = rx.recv().await {
                match event {
                    GenerationEvent::Token(chunk) => {
                        text.push_str(&chunk);
                        let _ = tx.send(Event::Token { text: chunk, step_id }).await;
                    }
                    GenerationEvent::Error(err) => return Err(err),
                }
            }
            if cancel.is_cancelled() {
                return Err(LaloError::Cancelled);
            }
            let prompt_tokens = estimate_tokens(prompt);
            let completion_tokens = estimate_tokens(&text);
            return Ok(GeneratedOutcome {
                model_id: model_id.to_string(),
                text,
                prompt_tokens,
                completion_tokens,
            });
        }

        let provider = provider_key(descriptor.backend);
        let api_key = request
            .cloud_api_keys
            .get(provider)
            .ok_or_else(|| LaloError::AuthFailed(format!("no credentials configured for provider '{provider}'")))?;
        let cloud_request = CloudCompletionRequest {
            model_remote_name: descriptor.file_path_or_remote_name.clone(),
            prompt: prompt.to_string(),
            max_output_tokens: request.max_output_tokens,
            temperature: request.temperature,
        };
        let response = self.cloud.complete(&descriptor, &cloud_request, api_key).await?;

        for chunk in response.text.split_inclusive(' ') {
            if cancel.is_cancelled() {
                return Err(LaloError::Cancelled);
            }
            if tx.send(Event::Token { text: chunk.to_string(), step_id }).await.is_err() {
                break;
            }
        }

        Ok(GeneratedOutcome {
            model_id: model_id.to_string(),
            text: response.text,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }

    /// Scores `text` without emitting a `Confidence` event — used inside a
    /// plan's `model_generate` step, where the dedicated `confidence_check`
    /// step is the one that surfaces the event (spec §4.5: "a
    /// `confidence_check` step gates its downstream dependents").
    pub(crate) async fn score_text(&self, text: &str) -> ConfidenceReport {
        let validation_model = self
            .registry
            .list(Some(Specialty::Validation))
            .into_iter()
            .find(|d| !d.unavailable)
            .map(|d| d.id.clone());

        let Some(model_id) = validation_model else {
            return self.validator.degraded_report();
        };

        let prompt = format!(
            "Score the following answer on overall/factual/consistent/complete/grounded axes \
             in the range [0, 1] and reply with a single JSON object \
             {{\"overall\":_,\"factual\":_,\"consistent\":_,\"complete\":_,\"grounded\":_}}.\n\nAnswer: {text}"
        );

        let gen_request = GenerationRequest {
            model_id,
            prompt,
            max_output_tokens: 256,
            temperature: 0.0,
            top_p: 1.0,
        };

        match self.pool.generate(gen_request, &CancellationHandle::new()).await {
            Ok(raw) => match parse_raw_scores(&raw) {
                Some(scores) => self.validator.score(scores, text),
                None => self.validator.degraded_report(),
            },
            Err(_) => self.validator.degraded_report(),
        }
    }

    /// Scores `text` and emits the `Confidence` event — the simple path's
    /// own check has no separate plan step, so it emits directly.
    pub(crate) async fn score_text_and_emit(&self, text: &str, tx: &mpsc::Sender<Event>) -> ConfidenceReport {
        let report = self.score_text(text).await;
        let _ = tx.send(confidence_event(&report)).await;
        report
    }
}

pub(crate) fn confidence_event(report: &ConfidenceReport) -> Event {
    Event::Confidence {
        scores: lalo_kernel::event::ConfidenceScoresView {
            overall: report.overall,
            factual: report.components.factual,
            consistent: report.components.consistent,
            complete: report.components.complete,
            grounded: report.components.grounded,
            evasive: report.evasive,
        },
        recommendation: report.recommendation.to_string(),
    }
}

fn parse_raw_scores(raw: &str) -> Option<RawScores> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_raw_scores_tolerates_surrounding_prose() {
        let raw = "Sure, here you go: {\"overall\":0.9,\"factual\":0.9,\"consistent\":0.9,\"complete\":0.9,\"grounded\":0.9} thanks";
        let parsed = parse_raw_scores(raw).unwrap();
        assert_eq!(parsed.overall, 0.9);
    }

    #[test]
    fn parse_raw_scores_rejects_non_json() {
        assert!(parse_raw_scores("no braces here").is_none());
    }
}
