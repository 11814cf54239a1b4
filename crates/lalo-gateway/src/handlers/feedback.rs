//! `POST /ai/feedback` (spec §4.9, §6): records a caller's up/down rating of
//! a past response. Never applied to in-flight or future routing (spec §9
//! Open Question #3) — this handler only validates and persists.

use crate::error::{ApiError, ApiResult};
use crate::state::LaloContext;
use axum::extract::State;
use axum::Json;
use lalo_kernel::telemetry::{Feedback, FeedbackRating};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub response_id: String,
    pub rating: FeedbackRating,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub accepted: bool,
}

/// 404s an unknown `response_id` rather than silently accepting feedback
/// for a response the gateway never produced (spec §6 error table).
pub async fn feedback(State(ctx): State<LaloContext>, Json(body): Json<FeedbackRequest>) -> ApiResult<Json<FeedbackResponse>> {
    if !ctx.usage_repo.has_usage_record(&body.response_id).await {
        return Err(ApiError::not_found(format!("unknown response_id '{}'", body.response_id)));
    }

    ctx.usage_repo
        .store_feedback(Feedback {
            response_id: body.response_id,
            rating: body.rating,
            reasons: body.reasons,
            note: body.note,
        })
        .await;

    Ok(Json(FeedbackResponse { accepted: true }))
}
