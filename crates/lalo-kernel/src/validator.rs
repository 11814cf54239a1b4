//! Confidence Validator (spec §4.6): scores an (output, request, sources)
//! triple on four axes, flags evasive text independently of the numeric
//! score, and maps the result onto an `accept`/`retry`/`escalate`
//! recommendation.
//!
//! Grounded on `GlobalError`'s classification-method idiom (small, pure
//! functions that turn a value into a stable enum) and on the keyword/regex
//! style of this workspace's routing heuristics, generalised from keyword
//! buckets to evasive-text pattern matching.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The validator's scored judgement on an output (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceReport {
    pub overall: f32,
    pub components: ConfidenceComponents,
    pub evasive: bool,
    pub recommendation: Recommendation,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfidenceComponents {
    pub factual: f32,
    pub consistent: f32,
    pub complete: f32,
    pub grounded: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Accept,
    Retry,
    Escalate,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::Accept => "accept",
            Recommendation::Retry => "retry",
            Recommendation::Escalate => "escalate",
        };
        write!(f, "{s}")
    }
}

/// Threshold configuration (spec §6 `confidence_accept_threshold` /
/// `confidence_escalate_threshold`) plus the tunable evasive-text pattern
/// set (spec §9 Open Question #2).
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub accept_threshold: f32,
    pub escalate_threshold: f32,
    pub evasive_patterns: Vec<String>,
}

/// Small, documented default pattern set — refusals and hedges that
/// substitute for substance rather than qualify it.
pub fn default_evasive_patterns() -> Vec<String> {
    vec![
        r"(?i)^\s*i('m| am) (not able|unable) to".to_string(),
        r"(?i)^\s*i can('t|not) (help|assist) with that".to_string(),
        r"(?i)^\s*as an ai( language model)?,? i".to_string(),
        r"(?i)i don'?t have (enough|sufficient) information".to_string(),
        r"(?i)it('s| is) (difficult|hard|impossible) to (say|know|determine)".to_string(),
    ]
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.8,
            escalate_threshold: 0.6,
            evasive_patterns: default_evasive_patterns(),
        }
    }
}

/// A model-produced raw score, prior to clamping/rounding, for the four
/// axes plus overall — the shape the validator's own `model_generate` call
/// (specialty=`validation`) is asked to return as JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScores {
    pub overall: f32,
    pub factual: f32,
    pub consistent: f32,
    pub complete: f32,
    pub grounded: f32,
}

pub struct ConfidenceValidator {
    config: ValidatorConfig,
    evasive_regexes: Vec<Regex>,
}

impl ConfidenceValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let evasive_regexes = config
            .evasive_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            config,
            evasive_regexes,
        }
    }

    /// Builds a report from the validation model's parsed output and the
    /// raw completion text (for the deterministic evasive-text check).
    pub fn score(&self, raw: RawScores, output_text: &str) -> ConfidenceReport {
        let components = ConfidenceComponents {
            factual: clamp01(raw.factual),
            consistent: clamp01(raw.consistent),
            complete: clamp01(raw.complete),
            grounded: clamp01(raw.grounded),
        };
        let overall = clamp01(raw.overall);
        let evasive = self.is_evasive(output_text);
        let recommendation = Self::recommend(overall, evasive, &self.config);
        let mut notes = Vec::new();
        if evasive {
            notes.push("output matched an evasive-text pattern".to_string());
        }
        ConfidenceReport {
            overall,
            components,
            evasive,
            recommendation,
            notes,
        }
    }

    /// The degraded-neutral report returned when the validation model
    /// itself is unavailable or its output is unparsable (spec §4.6: this
    /// policy is conservative — it surfaces the outcome rather than
    /// blocking delivery).
    pub fn degraded_report(&self) -> ConfidenceReport {
        ConfidenceReport {
            overall: 0.6,
            components: ConfidenceComponents::default(),
            evasive: false,
            recommendation: Recommendation::Accept,
            notes: vec!["confidence signal degraded: validator unavailable".to_string()],
        }
    }

    /// Deterministic evasive-text check against the first and last
    /// sentences, independent of the model-supplied scores.
    pub fn is_evasive(&self, text: &str) -> bool {
        let sentences: Vec<&str> = text
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let Some(first) = sentences.first() else {
            return false;
        };
        let last = sentences.last().unwrap_or(first);
        self.evasive_regexes
            .iter()
            .any(|re| re.is_match(first) || re.is_match(last))
    }

    fn recommend(overall: f32, evasive: bool, config: &ValidatorConfig) -> Recommendation {
        if overall >= config.accept_threshold && evasive {
            Recommendation::Retry
        } else if overall >= config.accept_threshold {
            Recommendation::Accept
        } else if overall >= config.escalate_threshold {
            Recommendation::Retry
        } else {
            Recommendation::Escalate
        }
    }
}

fn clamp01(v: f32) -> f32 {
    if !v.is_finite() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(overall: f32) -> RawScores {
        RawScores {
            overall,
            factual: overall,
            consistent: overall,
            complete: overall,
            grounded: overall,
        }
    }

    #[test]
    fn accepts_high_confidence_non_evasive() {
        let v = ConfidenceValidator::new(ValidatorConfig::default());
        let report = v.score(raw(0.9), "The answer is 4.");
        assert_eq!(report.recommendation, Recommendation::Accept);
        assert!(!report.evasive);
    }

    #[test]
    fn retries_mid_confidence() {
        let v = ConfidenceValidator::new(ValidatorConfig::default());
        let report = v.score(raw(0.65), "The answer is probably around 4.");
        assert_eq!(report.recommendation, Recommendation::Retry);
    }

    #[test]
    fn escalates_low_confidence() {
        let v = ConfidenceValidator::new(ValidatorConfig::default());
        let report = v.score(raw(0.3), "I truly have no idea.");
        assert_eq!(report.recommendation, Recommendation::Escalate);
    }

    #[test]
    fn high_score_but_evasive_forces_retry() {
        let v = ConfidenceValidator::new(ValidatorConfig::default());
        let report = v.score(raw(0.95), "I'm not able to help with that request.");
        assert!(report.evasive);
        assert_eq!(report.recommendation, Recommendation::Retry);
    }

    #[test]
    fn degraded_report_is_conservative_accept() {
        let v = ConfidenceValidator::new(ValidatorConfig::default());
        let report = v.degraded_report();
        assert_eq!(report.recommendation, Recommendation::Accept);
        assert_eq!(report.overall, 0.6);
        assert!(!report.notes.is_empty());
    }

    #[test]
    fn scores_out_of_range_are_clamped() {
        let v = ConfidenceValidator::new(ValidatorConfig::default());
        let report = v.score(raw(1.5), "fine");
        assert_eq!(report.overall, 1.0);
    }
}
