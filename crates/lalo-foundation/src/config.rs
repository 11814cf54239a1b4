//! Process-wide configuration (spec §6 "Configuration (recognised
//! options)") plus the declarative model catalogue the Registry loads at
//! startup (spec §4.1).
//!
//! Grounded on this workspace's multi-format config stack
//! (`config` crate + `serde_yaml`, re-exposed generically by
//! `lalo_kernel::config`) rather than hand-rolled parsing; loading is a
//! thin TOML-primary wrapper the way `lalo_kernel`'s own `config` feature
//! loads its layered sources.

use crate::registry::{Backend, ModelDescriptor, Specialty};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Recognised configuration options (spec §6). Every field has the
/// spec-given default so a caller may construct `LaloConfig::default()`
/// and override only what it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaloConfig {
    pub demo_mode: bool,
    pub model_dir: String,
    pub memory_budget_bytes: u64,
    pub default_simple_model: String,
    pub default_complex_model: String,
    pub default_code_model: String,
    pub default_math_model: String,
    pub default_routing_model: String,
    pub default_validation_model: String,
    pub max_parallel_steps_per_request: usize,
    pub request_timeout_seconds: u64,
    pub generation_timeout_seconds: u64,
    pub model_load_timeout_seconds: u64,
    pub confidence_accept_threshold: f32,
    pub confidence_escalate_threshold: f32,
    pub max_retries_per_step: u32,
    /// Tunable evasive-text pattern set (spec §9 Open Question #2),
    /// defaulted by the validator itself when left empty.
    pub evasive_patterns: Vec<String>,
}

impl Default for LaloConfig {
    fn default() -> Self {
        Self {
            demo_mode: false,
            model_dir: "./models".to_string(),
            memory_budget_bytes: 8 * 1024 * 1024 * 1024,
            default_simple_model: "general-small".to_string(),
            default_complex_model: "general-large".to_string(),
            default_code_model: "code-specialist".to_string(),
            default_math_model: "math-specialist".to_string(),
            default_routing_model: "router-classifier".to_string(),
            default_validation_model: "validation-specialist".to_string(),
            max_parallel_steps_per_request: 2,
            request_timeout_seconds: 300,
            generation_timeout_seconds: 120,
            model_load_timeout_seconds: 60,
            confidence_accept_threshold: 0.8,
            confidence_escalate_threshold: 0.6,
            max_retries_per_step: 2,
            evasive_patterns: Vec::new(),
        }
    }
}

impl LaloConfig {
    /// Loads from a TOML/YAML/JSON/INI/RON/JSON5 file (format by
    /// extension, via `lalo_kernel::config::load_with_env`), with `LALO_`
    /// prefixed environment variables overriding file values — e.g.
    /// `LALO_DEMO_MODE=true`, `LALO_MAX_RETRIES_PER_STEP=3`.
    pub fn load(path: &str) -> Result<Self, lalo_kernel::config::ConfigError> {
        lalo_kernel::config::load_with_env(path, "LALO")
    }

    /// Loads from a file, falling back to spec defaults if the file does
    /// not exist or fails to parse — convenient for the gateway binary's
    /// `--config` flag.
    pub fn load_or_default(path: &str) -> Self {
        if !Path::new(path).exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_default()
    }
}

/// One entry in the declarative model catalogue file (spec §4.1), before
/// startup availability validation turns it into a [`ModelDescriptor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub id: String,
    pub backend: Backend,
    #[serde(default)]
    pub file_path_or_remote_name: String,
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    #[serde(default = "default_threads")]
    pub recommended_threads: u32,
    #[serde(default)]
    pub specialty: Specialty,
    #[serde(default)]
    pub weight_bytes: u64,
    #[serde(default = "default_quant_tag")]
    pub quantisation_tag: String,
}

fn default_context_window() -> u32 {
    4096
}
fn default_threads() -> u32 {
    4
}
fn default_quant_tag() -> String {
    "none".to_string()
}

impl Default for Specialty {
    fn default() -> Self {
        Specialty::General
    }
}

/// The whole catalogue file: `models: [...]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCatalogue {
    #[serde(default)]
    pub models: Vec<CatalogueEntry>,
}

impl ModelCatalogue {
    /// Parses a YAML catalogue file into [`ModelDescriptor`]s. Startup
    /// file-existence validation happens in
    /// `ModelRegistry::from_descriptors`, not here (spec §4.1: "Unknown or
    /// missing local models are marked unavailable, not an error").
    pub fn load_yaml(content: &str) -> Result<Vec<ModelDescriptor>, serde_yaml::Error> {
        let catalogue: ModelCatalogue = serde_yaml::from_str(content)?;
        Ok(catalogue.models.into_iter().map(Into::into).collect())
    }

    pub fn load_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<ModelDescriptor>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::load_yaml(&content)?)
    }
}

impl From<CatalogueEntry> for ModelDescriptor {
    fn from(entry: CatalogueEntry) -> Self {
        ModelDescriptor::builder(entry.id, entry.backend)
            .file_or_remote_name(entry.file_path_or_remote_name)
            .context_window(entry.context_window)
            .recommended_threads(entry.recommended_threads)
            .specialty(entry.specialty)
            .weight_bytes(entry.weight_bytes)
            .quantisation_tag(entry.quantisation_tag)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = LaloConfig::default();
        assert_eq!(cfg.max_parallel_steps_per_request, 2);
        assert_eq!(cfg.request_timeout_seconds, 300);
        assert_eq!(cfg.generation_timeout_seconds, 120);
        assert_eq!(cfg.model_load_timeout_seconds, 60);
        assert_eq!(cfg.confidence_accept_threshold, 0.8);
        assert_eq!(cfg.confidence_escalate_threshold, 0.6);
        assert_eq!(cfg.max_retries_per_step, 2);
    }

    #[test]
    fn load_or_default_falls_back_when_missing() {
        let cfg = LaloConfig::load_or_default("/nonexistent/lalo.toml");
        assert_eq!(cfg, LaloConfig::default());
    }

    #[test]
    fn catalogue_parses_models_list() {
        let yaml = r#"
models:
  - id: general-small
    backend: local_gguf
    file_path_or_remote_name: /models/general-small.gguf
    context_window: 8192
    specialty: general
  - id: gpt-4o
    backend: cloud_openai
    specialty: general
"#;
        let descriptors = ModelCatalogue::load_yaml(yaml).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id, "general-small");
        assert_eq!(descriptors[0].context_window, 8192);
        assert!(!descriptors[1].backend.is_local());
    }
}
