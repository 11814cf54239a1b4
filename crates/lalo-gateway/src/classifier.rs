//! Wires the Router's [`Classifier`] seam to a real model, so routing
//! decisions come from the configured `default_routing_model` rather than
//! heuristics alone (spec §4.4: "Primary method: consult a small classifier
//! model").
//!
//! Grounded on the Router's own `NoClassifier` (the trait this adapts) and
//! on `lalo_orchestrator::generate::Orchestrator::score_text`'s pattern of
//! reusing the Local Inference Pool for a narrow, specialty-scoped model
//! call rather than a bespoke client.

use async_trait::async_trait;
use lalo_foundation::router::{Classifier, NoClassifier};
use lalo_foundation::{ModelRegistry, Specialty};
use lalo_kernel::error::LaloError;
use lalo_local_llm::{CancellationHandle, GenerationRequest, LocalInferencePool};
use std::sync::Arc;

/// The concrete [`Classifier`] the gateway wires into its
/// [`lalo_foundation::Router`] instance: either a real [`PoolClassifier`]
/// or [`NoClassifier`] (heuristic-only), chosen once at startup so the rest
/// of the crate can work with one concrete, non-generic router type rather
/// than threading a type parameter through every handler.
pub enum ConfiguredClassifier {
    Pool(PoolClassifier),
    None(NoClassifier),
}

#[async_trait]
impl Classifier for ConfiguredClassifier {
    async fn classify(&self, prompt: &str) -> Result<String, LaloError> {
        match self {
            ConfiguredClassifier::Pool(c) => c.classify(prompt).await,
            ConfiguredClassifier::None(c) => c.classify(prompt).await,
        }
    }
}

/// Calls the registry's `specialty = routing` model (or `default_routing_model`
/// by id, if present and not already matched by specialty) for a raw JSON
/// classification. Any model/registry miss falls through to
/// `model_unavailable`, which the Router treats as "use heuristics" — this
/// adapter never has to decide that itself.
pub struct PoolClassifier {
    pool: Arc<LocalInferencePool>,
    registry: Arc<ModelRegistry>,
    default_routing_model: String,
}

impl PoolClassifier {
    pub fn new(pool: Arc<LocalInferencePool>, registry: Arc<ModelRegistry>, default_routing_model: impl Into<String>) -> Self {
        Self {
            pool,
            registry,
            default_routing_model: default_routing_model.into(),
        }
    }

    fn resolve_model_id(&self) -> Option<String> {
        if let Some(descriptor) = self.registry.lookup(&self.default_routing_model) {
            if !descriptor.unavailable {
                return Some(descriptor.id.clone());
            }
        }
        self.registry
            .list(Some(Specialty::Routing))
            .into_iter()
            .find(|d| !d.unavailable)
            .map(|d| d.id.clone())
    }
}

#[async_trait]
impl Classifier for PoolClassifier {
    async fn classify(&self, prompt: &str) -> Result<String, LaloError> {
        let model_id = self
            .resolve_model_id()
            .ok_or_else(|| LaloError::ModelUnavailable("no routing-specialty model available".to_string()))?;

        let request = GenerationRequest {
            model_id,
            prompt: classification_prompt(prompt),
            max_output_tokens: 256,
            temperature: 0.0,
            top_p: 1.0,
        };
        self.pool.generate(request, &CancellationHandle::new()).await
    }
}

fn classification_prompt(prompt: &str) -> String {
    format!(
        "Classify the following request. Respond with a single JSON object with keys \
         path (simple|complex|specialized), complexity (0-1), confidence (0-1), reason \
         (short string), recommended (array of model ids), required_tools (array of tool \
         ids). Request:\n{prompt}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lalo_foundation::registry::Backend;
    use lalo_foundation::ModelDescriptor;
    use lalo_local_llm::PoolConfig;

    fn registry_with_routing_model() -> Arc<ModelRegistry> {
        Arc::new(ModelRegistry::from_descriptors(vec![ModelDescriptor::builder(
            "router-classifier",
            Backend::LocalGguf,
        )
        .specialty(Specialty::Routing)
        .build()]))
    }

    #[tokio::test]
    async fn falls_back_to_model_unavailable_when_no_routing_model() {
        let registry = Arc::new(ModelRegistry::new());
        let pool = Arc::new(LocalInferencePool::new(registry.clone(), PoolConfig::default()));
        let classifier = PoolClassifier::new(pool, registry, "router-classifier");
        let err = classifier.classify("hello").await.unwrap_err();
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[tokio::test]
    async fn resolves_configured_default_routing_model_by_specialty() {
        let registry = registry_with_routing_model();
        let pool = Arc::new(LocalInferencePool::new(registry.clone(), PoolConfig { demo_mode: true, ..Default::default() }));
        let classifier = PoolClassifier::new(pool, registry, "router-classifier");
        // demo mode short-circuits to the heuristic generator, so this just
        // exercises model resolution succeeding rather than erroring.
        let result = classifier.classify("What is 2+2?").await;
        assert!(result.is_ok());
    }
}
