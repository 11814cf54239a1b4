//! Model Registry (spec §4.1): a declarative catalogue of Model
//! Descriptors, validated once at startup and immutable thereafter.
//!
//! Grounded on `adapter::descriptor::AdapterDescriptor`'s builder pattern
//! and `adapter::registry::AdapterRegistry`'s `register`/`resolve` shape,
//! narrowed from a hardware-constraint resolver to the spec's simpler
//! `lookup`/`list` contract plus startup availability checks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Where a model's weights live / how it is invoked (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    LocalGguf,
    CloudOpenai,
    CloudAnthropic,
    CloudOther,
}

impl Backend {
    pub fn is_local(&self) -> bool {
        matches!(self, Backend::LocalGguf)
    }
}

/// What a model is good at, used by the Router's specialty matching
/// (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    General,
    Routing,
    Math,
    Code,
    Research,
    Validation,
    Embedding,
    Vision,
}

/// Static description of one model (spec §3 "Model Descriptor").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub backend: Backend,
    pub file_path_or_remote_name: String,
    pub context_window: u32,
    pub recommended_threads: u32,
    pub specialty: Specialty,
    pub weight_bytes: u64,
    pub quantisation_tag: String,
    /// Set at startup validation; never an error by itself (spec §4.1).
    #[serde(default)]
    pub unavailable: bool,
}

impl ModelDescriptor {
    pub fn builder(id: impl Into<String>, backend: Backend) -> ModelDescriptorBuilder {
        ModelDescriptorBuilder::new(id, backend)
    }

    /// Whether `prompt_tokens + requested_output_tokens` fits this model's
    /// context window (spec §4.4 tie-break, §8 boundary behaviour).
    pub fn fits(&self, prompt_tokens: u32, requested_output_tokens: u32) -> bool {
        prompt_tokens.saturating_add(requested_output_tokens) <= self.context_window
    }
}

pub struct ModelDescriptorBuilder {
    id: String,
    backend: Backend,
    file_path_or_remote_name: String,
    context_window: u32,
    recommended_threads: u32,
    specialty: Specialty,
    weight_bytes: u64,
    quantisation_tag: String,
}

impl ModelDescriptorBuilder {
    fn new(id: impl Into<String>, backend: Backend) -> Self {
        Self {
            id: id.into(),
            backend,
            file_path_or_remote_name: String::new(),
            context_window: 4096,
            recommended_threads: 4,
            specialty: Specialty::General,
            weight_bytes: 0,
            quantisation_tag: "none".to_string(),
        }
    }

    pub fn file_or_remote_name(mut self, value: impl Into<String>) -> Self {
        self.file_path_or_remote_name = value.into();
        self
    }
    pub fn context_window(mut self, value: u32) -> Self {
        self.context_window = value;
        self
    }
    pub fn recommended_threads(mut self, value: u32) -> Self {
        self.recommended_threads = value;
        self
    }
    pub fn specialty(mut self, value: Specialty) -> Self {
        self.specialty = value;
        self
    }
    pub fn weight_bytes(mut self, value: u64) -> Self {
        self.weight_bytes = value;
        self
    }
    pub fn quantisation_tag(mut self, value: impl Into<String>) -> Self {
        self.quantisation_tag = value.into();
        self
    }

    pub fn build(self) -> ModelDescriptor {
        ModelDescriptor {
            id: self.id,
            backend: self.backend,
            file_path_or_remote_name: self.file_path_or_remote_name,
            context_window: self.context_window,
            recommended_threads: self.recommended_threads,
            specialty: self.specialty,
            weight_bytes: self.weight_bytes,
            quantisation_tag: self.quantisation_tag,
            unavailable: false,
        }
    }
}

/// Process-wide, immutable-after-init catalogue of [`ModelDescriptor`]s.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a declarative catalogue, marking local
    /// entries whose weight file doesn't exist/isn't readable as
    /// `unavailable` rather than rejecting the whole registry (spec §4.1).
    pub fn from_descriptors(descriptors: Vec<ModelDescriptor>) -> Self {
        let mut models = HashMap::with_capacity(descriptors.len());
        for mut d in descriptors {
            if d.backend.is_local() && !d.file_path_or_remote_name.is_empty() {
                d.unavailable = !Path::new(&d.file_path_or_remote_name).is_file();
            }
            models.insert(d.id.clone(), d);
        }
        Self { models }
    }

    pub fn lookup(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.get(id)
    }

    /// Ordered (by id, for determinism) list of descriptors, optionally
    /// filtered by specialty.
    pub fn list(&self, specialty: Option<Specialty>) -> Vec<&ModelDescriptor> {
        let mut out: Vec<&ModelDescriptor> = self
            .models
            .values()
            .filter(|d| specialty.map(|s| d.specialty == s).unwrap_or(true))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Descriptors visible to a caller: always local entries, plus cloud
    /// entries the caller has credentials for (spec §4.8: "merging local
    /// registry and the caller's cloud credentials").
    pub fn visible_to(&self, has_cloud_credentials: bool) -> Vec<&ModelDescriptor> {
        self.list(None)
            .into_iter()
            .filter(|d| d.backend.is_local() || has_cloud_credentials)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All ids, for validating a Routing Decision's `recommended` list.
    pub fn ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: &str, specialty: Specialty) -> ModelDescriptor {
        ModelDescriptor::builder(id, Backend::LocalGguf)
            .specialty(specialty)
            .context_window(4096)
            .build()
    }

    #[test]
    fn lookup_and_list_are_populated() {
        let registry = ModelRegistry::from_descriptors(vec![
            local("general-1", Specialty::General),
            local("code-1", Specialty::Code),
        ]);
        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("general-1").is_some());
        assert_eq!(registry.list(Some(Specialty::Code)).len(), 1);
    }

    #[test]
    fn missing_local_file_marks_unavailable_not_error() {
        let mut d = local("ghost", Specialty::General);
        d.file_path_or_remote_name = "/nonexistent/path/model.gguf".to_string();
        let registry = ModelRegistry::from_descriptors(vec![d]);
        assert!(registry.lookup("ghost").unwrap().unavailable);
    }

    #[test]
    fn cloud_entries_hidden_without_credentials() {
        let cloud = ModelDescriptor::builder("gpt-x", Backend::CloudOpenai).build();
        let registry = ModelRegistry::from_descriptors(vec![local("local-1", Specialty::General), cloud]);
        assert_eq!(registry.visible_to(false).len(), 1);
        assert_eq!(registry.visible_to(true).len(), 2);
    }

    #[test]
    fn fits_checks_prompt_plus_output_against_context_window() {
        let d = local("small", Specialty::General);
        assert!(d.fits(100, 100));
        assert!(!d.fits(4000, 200));
    }

    #[test]
    fn list_is_ordered_by_id() {
        let registry = ModelRegistry::from_descriptors(vec![
            local("zeta", Specialty::General),
            local("alpha", Specialty::General),
        ]);
        let ids: Vec<&str> = registry.list(None).iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }
}
