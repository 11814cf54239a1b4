//! Small accounting helpers shared by the simple- and plan-execution paths.

use lalo_kernel::telemetry::{estimate_tokens, FallbackOutcome};
use lalo_kernel::error::LaloError;

/// Token accounting attached to the terminal `Done` event's usage view.
#[derive(Debug, Clone)]
pub struct UsageSummary {
    pub model_id: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl UsageSummary {
    pub fn for_exchange(model_id: impl Into<String>, prompt: &str, completion: &str) -> Self {
        let prompt_tokens = estimate_tokens(prompt);
        let completion_tokens = estimate_tokens(completion);
        Self {
            model_id: model_id.into(),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Classifies a failed attempt for a [`lalo_kernel::telemetry::FallbackTrace`]
/// entry (spec §3 "Fallback Trace").
pub fn classify_fallback_outcome(err: &LaloError) -> FallbackOutcome {
    match err {
        LaloError::ModelUnavailable(_) => FallbackOutcome::Unavailable,
        LaloError::ModelLoadTimeout { .. } | LaloError::GenerationTimeout { .. } => FallbackOutcome::TimedOut,
        _ => FallbackOutcome::Errored,
    }
}

/// Truncates to a short single-line summary for `StepComplete` events,
/// matching the demo generator's truncation idiom.
pub fn summarize(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(120) {
        Some((idx, _)) => format!("{}…", &collapsed[..idx]),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_truncates_long_text() {
        let text = "word ".repeat(50);
        let summary = summarize(&text);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn summarize_keeps_short_text_intact() {
        assert_eq!(summarize("short answer"), "short answer");
    }
}
