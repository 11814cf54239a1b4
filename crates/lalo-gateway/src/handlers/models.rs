//! `GET /ai/models` (spec §4.1, §4.8, §6): the registry's descriptors,
//! merged with whichever cloud providers the caller has credentials for.
//!
//! Since this is a read-only `GET`, cloud-credential presence can't come
//! from a JSON body the way `POST /ai/chat`'s `cloud_api_keys` does —
//! callers instead list the providers they hold a key for via the
//! `x-cloud-providers` header (comma-separated, e.g. `openai,anthropic`).

use crate::error::ApiResult;
use crate::state::LaloContext;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use lalo_foundation::registry::{Backend, ModelDescriptor, Specialty};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ModelView {
    pub id: String,
    pub backend: Backend,
    pub specialty: Specialty,
    pub context_window: u32,
    pub unavailable: bool,
}

impl From<&ModelDescriptor> for ModelView {
    fn from(d: &ModelDescriptor) -> Self {
        Self {
            id: d.id.clone(),
            backend: d.backend,
            specialty: d.specialty,
            context_window: d.context_window,
            unavailable: d.unavailable,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelView>,
}

fn has_cloud_credentials(headers: &HeaderMap) -> bool {
    headers
        .get("x-cloud-providers")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|p| !p.trim().is_empty()))
        .unwrap_or(false)
}

pub async fn models(State(ctx): State<LaloContext>, headers: HeaderMap) -> ApiResult<Json<ModelsResponse>> {
    let descriptors = ctx.registry.visible_to(has_cloud_credentials(&headers));
    Ok(Json(ModelsResponse {
        models: descriptors.into_iter().map(ModelView::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cloud_providers_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-cloud-providers", "openai,anthropic".parse().unwrap());
        assert!(has_cloud_credentials(&headers));
    }

    #[test]
    fn absent_header_means_no_cloud_credentials() {
        assert!(!has_cloud_credentials(&HeaderMap::new()));
    }
}
