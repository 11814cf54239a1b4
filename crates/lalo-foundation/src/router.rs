//! Router (spec §4.4): produces a [`RoutingDecision`] by consulting a
//! classifier model first, falling back to a deterministic heuristic
//! pipeline when the classifier is unavailable, times out, or emits
//! unparsable output.
//!
//! Grounded on `inference/routing.rs`'s stateless `resolve()` dispatch (one
//! function per policy, no shared mutable state) generalised to "classifier
//! path vs. heuristic path", and `smart_router.rs`'s `TaskType::from_str_opt`
//! keyword-matching idiom for specialty detection. Per spec §9's redesign
//! note, this is the *only* place the core is allowed to substitute a
//! heuristic for a model call — no other component may do so silently.

use crate::registry::{ModelRegistry, Specialty};
use lalo_kernel::error::LaloError;
use lalo_kernel::plan::{Path, RoutingDecision};
use std::collections::BTreeSet;

/// What the Router asks a classifier (specialty=`routing`) model to
/// produce, given a prompt — a structured JSON object matching
/// [`RoutingDecision`]'s shape, requested at low temperature to stabilise
/// output (spec §4.4).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ClassifierOutput {
    pub path: Path,
    pub complexity: f32,
    pub confidence: f32,
    pub reason: String,
    pub recommended: Vec<String>,
    #[serde(default)]
    pub required_tools: BTreeSet<String>,
}

/// Abstraction over "ask the routing-specialty model for a decision",
/// implemented by whichever inference backend the caller wires in (the
/// Local Inference Pool for a local classifier, or the Cloud Adapter). Kept
/// separate from a concrete pool/adapter type so `lalo-foundation` doesn't
/// need a circular dependency on `lalo-local-llm`.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Returns the classifier's raw text completion, or an error if the
    /// model could not be reached/loaded in time. The Router treats any
    /// error here, and any JSON-parse failure of the returned text, as
    /// "classifier unavailable" and falls through to heuristics.
    async fn classify(&self, prompt: &str) -> Result<String, LaloError>;
}

/// No classifier wired up — the Router always uses the heuristic pipeline.
/// Useful for `demo_mode` and for tests of the heuristic path in isolation.
pub struct NoClassifier;

#[async_trait::async_trait]
impl Classifier for NoClassifier {
    async fn classify(&self, _prompt: &str) -> Result<String, LaloError> {
        Err(LaloError::ModelUnavailable("no classifier configured".into()))
    }
}

/// Keyword buckets and thresholds, exactly as spelled out in spec §4.4 —
/// not meant to be user-tunable; they are reproduced here verbatim so a
/// reviewer can check them against the spec line by line.
mod heuristics {
    pub const SIMPLE_KEYWORDS: &[&str] = &["what is", "define", "who", "when"];
    pub const MEDIUM_KEYWORDS: &[&str] = &["how to", "compare", "explain", "summarise", "summarize"];
    pub const COMPLEX_KEYWORDS: &[&str] = &["design", "analyse", "analyze", "research", "plan", "optimise", "optimize"];

    pub const CODE_KEYWORDS: &[&str] = &["code", "function", "program", "bug", "compile", "refactor"];
    pub const MATH_KEYWORDS: &[&str] = &["calculate", "solve", "equation", "integral", "derivative", "+", "-", "*", "/"];
    pub const RESEARCH_KEYWORDS: &[&str] = &["research", "paper", "study", "literature"];

    pub const TOOL_KEYWORDS: &[&str] = &["search", "browse", "run code", "read file", "fetch", "lookup"];
}

/// Deterministic heuristic pipeline (spec §4.4 fallback method).
pub struct HeuristicRouter;

impl HeuristicRouter {
    /// `base` from keyword buckets plus up to 0.3 for length
    /// (`words/100`, capped), exactly per spec.
    pub fn complexity(prompt: &str) -> f32 {
        let lower = prompt.to_lowercase();
        let base = if heuristics::COMPLEX_KEYWORDS.iter().any(|k| lower.contains(k)) {
            0.8
        } else if heuristics::MEDIUM_KEYWORDS.iter().any(|k| lower.contains(k)) {
            0.5
        } else if heuristics::SIMPLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            0.2
        } else {
            0.4
        };
        let word_count = prompt.split_whitespace().count() as f32;
        let length_bonus = (word_count / 100.0).min(0.3);
        (base + length_bonus).min(1.0)
    }

    pub fn required_tools(prompt: &str) -> BTreeSet<String> {
        let lower = prompt.to_lowercase();
        heuristics::TOOL_KEYWORDS
            .iter()
            .filter(|k| lower.contains(*k))
            .map(|k| k.replace(' ', "_"))
            .collect()
    }

    /// Path selection per spec: complexity <0.3 and no tool keywords →
    /// `simple`; complexity ≥0.6 or any tool keyword → `complex`;
    /// otherwise `specialized`.
    pub fn path(complexity: f32, required_tools: &BTreeSet<String>) -> Path {
        if complexity < 0.3 && required_tools.is_empty() {
            Path::Simple
        } else if complexity >= 0.6 || !required_tools.is_empty() {
            Path::Complex
        } else {
            Path::Specialized
        }
    }

    /// Specialty detected via keyword scan, used to pick the `specialized`
    /// path's recommended model.
    pub fn detect_specialty(prompt: &str) -> Specialty {
        let lower = prompt.to_lowercase();
        if heuristics::CODE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Specialty::Code
        } else if heuristics::MATH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Specialty::Math
        } else if heuristics::RESEARCH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Specialty::Research
        } else {
            Specialty::General
        }
    }
}

/// Consults a classifier model first; falls back to the deterministic
/// heuristic pipeline whenever the classifier is unavailable, times out, or
/// returns unparsable output (spec §4.4).
pub struct Router<C: Classifier> {
    classifier: C,
}

impl<C: Classifier> Router<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }

    /// Produces a [`RoutingDecision`] for `prompt`, choosing candidate
    /// models from `registry`. `prompt_tokens` is used for the
    /// context-window tie-break; callers compute it however they estimate
    /// tokens (spec §3 "~1.3 tokens per whitespace token").
    pub async fn route(&self, prompt: &str, registry: &ModelRegistry, prompt_tokens: u32) -> RoutingDecision {
        if prompt.trim().is_empty() {
            // Callers should reject empty prompts before routing (spec §8);
            // the Router still returns a best-effort decision rather than
            // panicking, so a misbehaving caller doesn't crash the process.
            return self.heuristic_decision(prompt, registry, prompt_tokens);
        }

        let classifier_prompt = format!(
            "Classify the following request and respond with a JSON object \
             {{path, complexity, confidence, reason, recommended, required_tools}}.\n\nRequest: {prompt}"
        );

        match self.classifier.classify(&classifier_prompt).await {
            Ok(raw) => match parse_classifier_output(&raw) {
                Some(parsed) => {
                    let decision = RoutingDecision {
                        path: parsed.path,
                        complexity: parsed.complexity.clamp(0.0, 1.0),
                        confidence: parsed.confidence.clamp(0.0, 1.0),
                        reason: parsed.reason,
                        recommended: parsed.recommended,
                        required_tools: parsed.required_tools,
                        action_plan: None,
                    };
                    if decision.validate(&registry.ids()).is_ok() {
                        decision
                    } else {
                        self.heuristic_decision(prompt, registry, prompt_tokens)
                    }
                }
                None => self.heuristic_decision(prompt, registry, prompt_tokens),
            },
            Err(_) => self.heuristic_decision(prompt, registry, prompt_tokens),
        }
    }

    fn heuristic_decision(&self, prompt: &str, registry: &ModelRegistry, prompt_tokens: u32) -> RoutingDecision {
        let complexity = HeuristicRouter::complexity(prompt);
        let required_tools = HeuristicRouter::required_tools(prompt);
        let path = HeuristicRouter::path(complexity, &required_tools);

        let recommended = match path {
            Path::Simple => self.fastest_general_model(registry, prompt_tokens),
            Path::Specialized => {
                let specialty = HeuristicRouter::detect_specialty(prompt);
                self.best_specialty_model(registry, specialty, prompt_tokens)
            }
            Path::Complex => self.routing_capable_model(registry, prompt_tokens),
        };

        RoutingDecision {
            path,
            complexity,
            confidence: 0.5,
            reason: "heuristic fallback".to_string(),
            recommended,
            required_tools,
            action_plan: None,
        }
    }

    /// `simple` path: the fastest general model that fits the prompt.
    /// "Fastest" is approximated by smallest context window among
    /// candidates that fit, matching the tie-break rule spec §4.4 gives
    /// for specialty ties ("prefer the model with smaller context window
    /// that still fits the prompt").
    fn fastest_general_model(&self, registry: &ModelRegistry, prompt_tokens: u32) -> Vec<String> {
        self.smallest_fitting(registry, Specialty::General, prompt_tokens)
            .or_else(|| self.any_fitting(registry, prompt_tokens))
            .unwrap_or_default()
    }

    fn best_specialty_model(&self, registry: &ModelRegistry, specialty: Specialty, prompt_tokens: u32) -> Vec<String> {
        self.smallest_fitting(registry, specialty, prompt_tokens)
            .or_else(|| self.smallest_fitting(registry, Specialty::General, prompt_tokens))
            .or_else(|| self.any_fitting(registry, prompt_tokens))
            .unwrap_or_default()
    }

    fn routing_capable_model(&self, registry: &ModelRegistry, prompt_tokens: u32) -> Vec<String> {
        self.smallest_fitting(registry, Specialty::Routing, prompt_tokens)
            .or_else(|| self.smallest_fitting(registry, Specialty::General, prompt_tokens))
            .or_else(|| self.any_fitting(registry, prompt_tokens))
            .unwrap_or_default()
    }

    fn smallest_fitting(&self, registry: &ModelRegistry, specialty: Specialty, prompt_tokens: u32) -> Option<Vec<String>> {
        let mut candidates: Vec<_> = registry
            .list(Some(specialty))
            .into_iter()
            .filter(|d| !d.unavailable && d.fits(prompt_tokens, 0))
            .collect();
        candidates.sort_by_key(|d| d.context_window);
        candidates.first().map(|d| vec![d.id.clone()])
    }

    fn any_fitting(&self, registry: &ModelRegistry, prompt_tokens: u32) -> Option<Vec<String>> {
        let mut candidates: Vec<_> = registry
            .list(None)
            .into_iter()
            .filter(|d| !d.unavailable && d.fits(prompt_tokens, 0))
            .collect();
        candidates.sort_by_key(|d| d.context_window);
        candidates.first().map(|d| vec![d.id.clone()])
    }
}

fn parse_classifier_output(raw: &str) -> Option<ClassifierOutput> {
    // Classifier output is prompted to be a bare JSON object but models
    // sometimes wrap it in prose or a fenced code block; take the first
    // `{...}` span before attempting to parse, the same tolerant-extraction
    // idiom used elsewhere in this workspace for LLM JSON replies.
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
    use crate::registry::Backend;

    fn registry_with(models: Vec<(&str, Specialty, u32)>) -> ModelRegistry {
        ModelRegistry::from_descriptors(
            models
                .into_iter()
                .map(|(id, specialty, ctx)| {
                    crate::registry::ModelDescriptor::builder(id, Backend::LocalGguf)
                        .specialty(specialty)
                        .context_window(ctx)
                        .build()
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn simple_keyword_routes_to_simple_path() {
        let router = Router::new(NoClassifier);
        let registry = registry_with(vec![("general-1", Specialty::General, 4096)]);
        let decision = router.route("What is the capital of France?", &registry, 10).await;
        assert_eq!(decision.path, Path::Simple);
        assert_eq!(decision.recommended, vec!["general-1"]);
    }

    #[tokio::test]
    async fn complex_keyword_routes_to_complex_path() {
        let router = Router::new(NoClassifier);
        let registry = registry_with(vec![("router-1", Specialty::Routing, 8192)]);
        let decision = router
            .route("Design and optimise a distributed caching architecture", &registry, 10)
            .await;
        assert_eq!(decision.path, Path::Complex);
        assert!(decision.complexity >= 0.6);
    }

    #[tokio::test]
    async fn tool_keyword_forces_complex_path_regardless_of_complexity() {
        let router = Router::new(NoClassifier);
        let registry = registry_with(vec![("router-1", Specialty::Routing, 8192)]);
        let decision = router.route("What is a good search engine?", &registry, 10).await;
        assert_eq!(decision.path, Path::Complex);
        assert!(decision.required_tools.contains("search"));
    }

    #[tokio::test]
    async fn specialized_path_prefers_code_specialty_model() {
        let router = Router::new(NoClassifier);
        let registry = registry_with(vec![
            ("general-1", Specialty::General, 4096),
            ("code-1", Specialty::Code, 4096),
        ]);
        let decision = router
            .route("Explain how to refactor this function for performance", &registry, 10)
            .await;
        assert_eq!(decision.path, Path::Specialized);
        assert_eq!(decision.recommended, vec!["code-1"]);
    }

    #[tokio::test]
    async fn tie_break_prefers_smaller_context_window_that_fits() {
        let router = Router::new(NoClassifier);
        let registry = registry_with(vec![
            ("code-small", Specialty::Code, 2048),
            ("code-large", Specialty::Code, 16384),
        ]);
        let decision = router.route("Please explain how to debug this code", &registry, 10).await;
        assert_eq!(decision.recommended, vec!["code-small"]);
    }

    struct JsonClassifier(&'static str);

    #[async_trait::async_trait]
    impl Classifier for JsonClassifier {
        async fn classify(&self, _prompt: &str) -> Result<String, LaloError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn uses_classifier_output_when_valid() {
        let registry = registry_with(vec![("router-1", Specialty::Routing, 8192)]);
        let router = Router::new(JsonClassifier(
            r#"Sure, here is the classification: {"path": "simple", "complexity": 0.1, "confidence": 0.95, "reason": "trivial", "recommended": ["router-1"], "required_tools": []}"#,
        ));
        let decision = router.route("Hi", &registry, 5).await;
        assert_eq!(decision.path, Path::Simple);
        assert_eq!(decision.confidence, 0.95);
    }

    #[tokio::test]
    async fn falls_back_to_heuristics_on_unparsable_classifier_output() {
        let registry = registry_with(vec![("general-1", Specialty::General, 4096)]);
        let router = Router::new(JsonClassifier("not json at all"));
        let decision = router.route("What is 2+2?", &registry, 5).await;
        assert_eq!(decision.path, Path::Simple);
        assert_eq!(decision.reason, "heuristic fallback");
    }

    #[tokio::test]
    async fn falls_back_when_classifier_recommends_unknown_model() {
        let registry = registry_with(vec![("general-1", Specialty::General, 4096)]);
        let router = Router::new(JsonClassifier(
            r#"{"path": "simple", "complexity": 0.1, "confidence": 0.9, "reason": "x", "recommended": ["ghost-model"], "required_tools": []}"#,
        ));
        let decision = router.route("Hi", &registry, 5).await;
        assert_eq!(decision.reason, "heuristic fallback");
        assert_eq!(decision.recommended, vec!["general-1"]);
    }
}
