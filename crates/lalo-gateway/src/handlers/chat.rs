//! `POST /ai/chat` and `POST /ai/chat/stream` (spec §4.8, §6): the facade's
//! two request shapes over the same validate → route → orchestrate
//! pipeline, one buffering to a single response, the other forwarding the
//! event stream as SSE.
//!
//! Grounded on the request→context→execute→response shape used by
//! chat-style handlers throughout this workspace's gateway crates, and on
//! `x-forwarded-for`-based client-key extraction for rate limiting.

use crate::error::{ApiError, ApiResult};
use crate::state::LaloContext;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use lalo_kernel::error::LaloError;
use lalo_kernel::event::{ConfidenceScoresView, Event, UsageView};
use lalo_kernel::plan::{Path, RoutingDecision, RoutingDecisionView};
use lalo_kernel::telemetry::estimate_tokens;
use lalo_local_llm::CancellationHandle;
use lalo_orchestrator::AgentRequest;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;

/// `POST /ai/chat` / `POST /ai/chat/stream` body (spec §3 "Request").
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Explicit model override — bypasses the Router entirely when present.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Tool-enablement hint, unioned with whatever the Router itself
    /// detects from the prompt (spec §3 "an optional tool-enablement set").
    #[serde(default)]
    pub required_tools: BTreeSet<String>,
    #[serde(default)]
    pub cloud_api_keys: HashMap<String, String>,
}

fn default_max_output_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_p() -> f32 {
    1.0
}

/// `POST /ai/chat` response (spec §4.8: "final text plus a summary block
/// `{routing, confidence, models_used}`").
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub response: String,
    pub model: String,
    pub usage: UsageView,
    pub routing: RoutingDecisionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceSummary>,
}

#[derive(Debug, Serialize)]
pub struct ConfidenceSummary {
    pub scores: ConfidenceScoresView,
    pub recommendation: String,
}

/// Validates the request, resolves a [`RoutingDecision`] (explicit override
/// or the Router), and checks every candidate fits the prompt's context
/// window — all before any generation is attempted (spec §6 scenario 2,
/// §8 boundary behaviour).
async fn validate_and_route(ctx: &LaloContext, body: &ChatRequest) -> Result<(AgentRequest, RoutingDecision), LaloError> {
    if body.prompt.trim().is_empty() {
        return Err(LaloError::invalid_request("prompt must not be empty"));
    }

    let prompt_tokens = estimate_tokens(&body.prompt);

    let decision = match &body.model {
        Some(model_id) => {
            let descriptor = ctx
                .registry
                .lookup(model_id)
                .ok_or_else(|| LaloError::invalid_request(format!("unknown model '{model_id}'")))?;
            if descriptor.unavailable {
                return Err(LaloError::invalid_request(format!("model '{model_id}' is unavailable")));
            }
            RoutingDecision {
                path: Path::Simple,
                complexity: 0.0,
                confidence: 1.0,
                reason: "explicit model override".to_string(),
                recommended: vec![model_id.clone()],
                required_tools: body.required_tools.clone(),
                action_plan: None,
            }
        }
        None => {
            let mut decision = ctx.router.route(&body.prompt, &ctx.registry, prompt_tokens).await;
            decision.required_tools.extend(body.required_tools.iter().cloned());
            decision
        }
    };

    let any_fits = decision
        .recommended
        .iter()
        .filter_map(|id| ctx.registry.lookup(id))
        .any(|d| !d.unavailable && d.fits(prompt_tokens, body.max_output_tokens));
    if !any_fits {
        return Err(LaloError::ContextOverflow);
    }

    let mut request = AgentRequest::new(body.prompt.clone());
    request.max_output_tokens = body.max_output_tokens;
    request.temperature = body.temperature;
    request.top_p = body.top_p;
    request.cloud_api_keys = body.cloud_api_keys.clone();
    if let Some(user_id) = &body.user_id {
        request = request.with_user(user_id.clone());
    }

    Ok((request, decision))
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Reconstructs a [`LaloError`] from the `kind` string an [`Event::Error`]
/// carries across the channel boundary. Mirrors
/// `lalo_orchestrator::orchestrator`'s private `error_from_wire`, which this
/// crate cannot import directly.
fn error_from_event(kind: &str, message: String) -> LaloError {
    match kind {
        "invalid_request" => LaloError::InvalidRequest(message),
        "unauthenticated" => LaloError::Unauthenticated(message),
        "model_unavailable" => LaloError::ModelUnavailable(message),
        "context_overflow" => LaloError::ContextOverflow,
        "auth_failed" => LaloError::AuthFailed(message),
        "quota_exhausted" => LaloError::QuotaExhausted(message),
        "rate_limited" => LaloError::RateLimited(message),
        "provider_error" => LaloError::ProviderError(message),
        "cancelled" => LaloError::Cancelled,
        "insufficient_memory" => LaloError::InsufficientMemory(message),
        _ => LaloError::Internal(message),
    }
}

/// `POST /ai/chat`: rate-limits, routes, runs the request to completion, and
/// collapses the event stream into one response carrying the final text,
/// the routing decision, and the last confidence report observed.
pub async fn chat(State(ctx): State<LaloContext>, headers: HeaderMap, Json(body): Json<ChatRequest>) -> ApiResult<Json<ChatResponse>> {
    if !ctx.rate_limiter.check(&client_key(&headers)) {
        return Err(ApiError::from(LaloError::RateLimited("too many requests".to_string())));
    }

    let (request, decision) = validate_and_route(&ctx, &body).await?;
    let request_id = request.id.clone();
    let routing = decision.clone();

    let mut rx = ctx.orchestrator.execute(request, decision, CancellationHandle::new());
    let mut confidence: Option<ConfidenceSummary> = None;
    while let Some(event) = rx.recv().await {
        match event {
            Event::Confidence { scores, recommendation } => {
                confidence = Some(ConfidenceSummary { scores, recommendation });
            }
            Event::Done { final_text, usage } => {
                return Ok(Json(ChatResponse {
                    id: request_id,
                    response: final_text,
                    model: usage.model_id.clone(),
                    usage,
                    routing,
                    confidence,
                }));
            }
            Event::Error { kind, message } => {
                return Err(ApiError::from(error_from_event(&kind, message)));
            }
            _ => {}
        }
    }
    Err(ApiError::from(LaloError::internal("orchestrator stream closed without a terminal event")))
}

/// `POST /ai/chat/stream`: same validation/routing as [`chat`], but forwards
/// every [`Event`] as an SSE frame instead of buffering. `Event`'s own
/// `#[serde(tag = "type", content = "content")]` shape already matches the
/// wire schema, so no further wrapping is needed here.
pub async fn chat_stream(
    State(ctx): State<LaloContext>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    if !ctx.rate_limiter.check(&client_key(&headers)) {
        return Err(ApiError::from(LaloError::RateLimited("too many requests".to_string())));
    }

    let (request, decision) = validate_and_route(&ctx, &body).await?;
    let rx = ctx.orchestrator.execute(request, decision, CancellationHandle::new());
    let stream = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Some((Ok(SseEvent::default().data(json)), rx))
    });
    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_key_reads_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 5.6.7.8".parse().unwrap());
        assert_eq!(client_key(&headers), "1.2.3.4");
    }

    #[test]
    fn client_key_falls_back_when_absent() {
        assert_eq!(client_key(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn error_from_event_round_trips_known_kinds() {
        assert_eq!(error_from_event("cancelled", "x".into()).kind(), "cancelled");
        assert_eq!(error_from_event("rate_limited", "x".into()).kind(), "rate_limited");
        assert_eq!(error_from_event("weird", "x".into()).kind(), "internal");
    }
}
