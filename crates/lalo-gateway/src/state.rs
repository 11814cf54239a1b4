//! The one process-scoped context the facade builds at startup (spec §9
//! "one explicit process-scoped context... passed by reference to the
//! Handler") and shares through axum's `State` extractor.

use crate::classifier::ConfiguredClassifier;
use crate::middleware::RateLimiter;
use lalo_foundation::cloud::CloudAdapter;
use lalo_foundation::{LaloConfig, ModelRegistry, Router};
use lalo_kernel::telemetry::{TelemetrySink, UsageRepository};
use lalo_kernel::tools::ToolExecutor;
use lalo_kernel::validator::ConfidenceValidator;
use lalo_local_llm::LocalInferencePool;
use lalo_orchestrator::Orchestrator;
use std::collections::HashMap;
use std::sync::Arc;

/// Every collaborator a request handler needs, built once at startup and
/// cloned cheaply (every field is `Arc` or itself cheap to clone) into each
/// request's handling, the same "one struct, shared via `State`" shape the
/// rest of this workspace uses for its HTTP-facing application state.
#[derive(Clone)]
pub struct LaloContext {
    pub config: LaloConfig,
    pub registry: Arc<ModelRegistry>,
    pub pool: Arc<LocalInferencePool>,
    pub cloud: Arc<dyn CloudAdapter>,
    pub tools: Arc<dyn ToolExecutor>,
    pub validator: Arc<ConfidenceValidator>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub usage_repo: Arc<dyn UsageRepository>,
    pub router: Arc<Router<ConfiguredClassifier>>,
    pub orchestrator: Orchestrator,
    pub rate_limiter: Arc<RateLimiter>,
}

impl LaloContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: LaloConfig,
        registry: Arc<ModelRegistry>,
        pool: Arc<LocalInferencePool>,
        cloud: Arc<dyn CloudAdapter>,
        tools: Arc<dyn ToolExecutor>,
        validator: Arc<ConfidenceValidator>,
        telemetry: Arc<dyn TelemetrySink>,
        usage_repo: Arc<dyn UsageRepository>,
        router: Arc<Router<ConfiguredClassifier>>,
        orchestrator: Orchestrator,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            config,
            registry,
            pool,
            cloud,
            tools,
            validator,
            telemetry,
            usage_repo,
            router,
            orchestrator,
            rate_limiter,
        }
    }

    /// Whether the caller presented any cloud credential at all, used for
    /// `GET /ai/models` visibility (spec §4.1/§4.8: "merging local registry
    /// and the caller's cloud credentials").
    pub fn has_cloud_credentials(cloud_api_keys: &HashMap<String, String>) -> bool {
        !cloud_api_keys.is_empty()
    }
}
