//! The streamed `Event` vocabulary (spec §3, §6) and its wire shape.
//!
//! Grounded on the `StreamEvent` enum in `workflow::graph`: a
//! tagged, serde-renamed enum pushed down a channel as the orchestrator
//! makes progress. Events for one request are totally ordered; the stream
//! always ends with exactly one of [`Event::Done`] or [`Event::Error`].

use crate::plan::RoutingDecisionView;
use serde::{Deserialize, Serialize};

/// One observable outcome along a request's timeline, streamed to the
/// caller as newline-delimited `data: <json>\n\n` SSE frames (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Event {
    /// The Router's decision, emitted once at the start of a request.
    Routing { decision: RoutingDecisionView },

    /// One opaque text fragment of a generation. `step_id` is present for
    /// plan-driven requests, absent for the simple path.
    Token {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        step_id: Option<u32>,
    },

    /// The orchestrator is invoking a tool for a `tool_call` step.
    ToolCall {
        tool: String,
        args: serde_json::Value,
        step_id: u32,
    },

    /// The outcome of a tool invocation — exactly one follows every
    /// `ToolCall` with the same `step_id`.
    ToolResult {
        step_id: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A plan step has finished; no event for a dependent step precedes
    /// this for every one of its dependencies.
    StepComplete { step_id: u32, summary: String },

    /// The validator's scored judgement on an output.
    Confidence {
        scores: ConfidenceScoresView,
        recommendation: String,
    },

    /// Terminal success event. Exactly one per request, always last if
    /// present.
    Done {
        final_text: String,
        usage: UsageView,
    },

    /// Terminal failure event. Exactly one per request, always last if
    /// present.
    Error { kind: String, message: String },
}

/// Wire-friendly mirror of [`crate::validator::ConfidenceReport`]'s
/// `components`, kept here to avoid a circular module dependency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceScoresView {
    pub overall: f32,
    pub factual: f32,
    pub consistent: f32,
    pub complete: f32,
    pub grounded: f32,
    pub evasive: bool,
}

/// Wire-friendly usage summary attached to `Done`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UsageView {
    pub model_id: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A monotonically increasing sequence number and the request it belongs
/// to, wrapping an [`Event`] for transport/ordering assertions in tests and
/// telemetry without polluting the wire schema itself.
#[derive(Debug, Clone)]
pub struct SequencedEvent {
    pub request_id: String,
    pub seq: u64,
    pub event: Event,
}

impl Event {
    /// True for the two terminal variants; a valid stream has exactly one
    /// terminal event, and it is the last one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Done { .. } | Event::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_and_error_are_terminal() {
        assert!(Event::Done {
            final_text: "x".into(),
            usage: UsageView::default()
        }
        .is_terminal());
        assert!(Event::Error {
            kind: "cancelled".into(),
            message: "x".into()
        }
        .is_terminal());
        assert!(!Event::Token {
            text: "x".into(),
            step_id: None
        }
        .is_terminal());
    }

    #[test]
    fn token_wire_shape_omits_absent_step_id() {
        let event = Event::Token {
            text: "hi".into(),
            step_id: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "token");
        assert_eq!(json["content"]["text"], "hi");
        assert!(json["content"].get("step_id").is_none());
    }

    #[test]
    fn error_round_trips() {
        let event = Event::Error {
            kind: "cancelled".into(),
            message: "caller closed the stream".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
