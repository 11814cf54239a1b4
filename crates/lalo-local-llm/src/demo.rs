//! Deterministic heuristic generator used under `demo_mode` (spec §4.2).
//!
//! Recognises a small set of prompt shapes — arithmetic, greeting, code
//! request, generic — and returns a short, policy-consistent string so
//! higher layers (Router, Orchestrator, Validator, Handler) can be
//! exercised end to end without any real model weights. Never silently
//! active: its activation is surfaced in the Routing Decision's `reason`
//! and in telemetry by the caller.

/// Produces the same completion for the same prompt every time (spec §8
/// round-trip property: "re-submitting an identical Request with
/// `demo_mode=true` yields an identical final text").
pub fn generate(prompt: &str) -> String {
    let trimmed = prompt.trim();
    let lower = trimmed.to_lowercase();

    if let Some(result) = try_arithmetic(trimmed) {
        return result;
    }

    if is_greeting(&lower) {
        return "Hello! I'm running in demo mode — ask me anything.".to_string();
    }

    if is_code_request(&lower) {
        return format!(
            "Here is a minimal sketch for your request (demo mode, no real model loaded):\n\
             ```\n// TODO: implement — demo mode returns a stub, not a real completion\n```"
        );
    }

    format!(
        "This is a deterministic demo-mode response. In production this request \
         would be routed to a real model. Prompt summary: \"{}\"",
        truncate(trimmed, 80)
    )
}

/// Recognises `"what is N op M"`/`"N op M"` shaped prompts and evaluates
/// them directly, so the literal scenario in spec §8 #1 ("What is 2+2?" →
/// contains "4") holds without any model at all.
fn try_arithmetic(prompt: &str) -> Option<String> {
    let cleaned: String = prompt
        .chars()
        .filter(|c| c.is_ascii_digit() || "+-*/. ".contains(*c))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    for op in ['+', '-', '*', '/'] {
        if let Some(idx) = cleaned.find(op) {
            let (lhs, rhs) = cleaned.split_at(idx);
            let rhs = &rhs[1..];
            let (Ok(a), Ok(b)) = (lhs.trim().parse::<f64>(), rhs.trim().parse::<f64>()) else {
                continue;
            };
            let result = match op {
                '+' => a + b,
                '-' => a - b,
                '*' => a * b,
                '/' if b != 0.0 => a / b,
                _ => continue,
            };
            return Some(format_number(result));
        }
    }
    None
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn is_greeting(lower: &str) -> bool {
    ["hi", "hello", "hey", "good morning", "good evening"]
        .iter()
        .any(|g| lower.starts_with(g))
}

fn is_code_request(lower: &str) -> bool {
    ["write a function", "write code", "implement", "write a program"]
        .iter()
        .any(|k| lower.contains(k))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_prompt_contains_the_result() {
        let out = generate("What is 2+2?");
        assert!(out.contains('4'));
    }

    #[test]
    fn greeting_is_recognised() {
        assert!(generate("Hi there!").contains("demo mode"));
    }

    #[test]
    fn code_request_returns_stub_block() {
        assert!(generate("Please write a function that sorts a list").contains("```"));
    }

    #[test]
    fn generic_prompt_falls_through() {
        assert!(generate("Tell me about the history of Rome").contains("demo-mode response"));
    }

    #[test]
    fn deterministic_for_same_prompt() {
        assert_eq!(generate("What is 5*3?"), generate("What is 5*3?"));
    }
}
