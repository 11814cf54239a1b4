//! Telemetry Sink (spec §4.9): append-only, best-effort recording of Usage
//! Records, per-step audit entries, and Fallback Traces.
//!
//! Grounded on the pervasive `tracing::info!`/`#[instrument]` idiom used
//! throughout the wider workspace's gateway and kernel crates — the default sink
//! here is a thin wrapper over `tracing` events rather than a bespoke
//! logging format, plus a JSONL file sink for durable usage accounting and
//! an in-memory `UsageRepository` for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Per-request usage accounting (spec §3 "Usage Record").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRecord {
    pub request_id: String,
    pub user_id: Option<String>,
    pub model_id: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_micro_usd: u64,
    pub timestamp: u64,
    pub path: String,
    pub succeeded: bool,
}

/// Heuristic token estimate when a backend doesn't report usage directly
/// (spec §3: "~1.3 tokens per whitespace token").
pub fn estimate_tokens(text: &str) -> u32 {
    let whitespace_tokens = text.split_whitespace().count();
    ((whitespace_tokens as f64) * 1.3).round() as u32
}

/// One attempt recorded in a [`FallbackTrace`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackAttempt {
    pub attempt_no: u32,
    pub attempted_model: String,
    pub outcome: FallbackOutcome,
    pub note: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackOutcome {
    Used,
    Unavailable,
    TimedOut,
    Errored,
    RejectedByConfidence,
}

/// Ordered audit trail of alternative attempts (spec §3 "Fallback Trace"),
/// attached to the Usage Record of the request that produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FallbackTrace {
    pub request_id: String,
    pub attempts: Vec<FallbackAttempt>,
}

/// A debug-level per-step audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepAuditEntry {
    pub request_id: String,
    pub step_id: u32,
    pub message: String,
}

/// Best-effort sink: a failure here must never fail the request it is
/// recording.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record_usage(&self, record: UsageRecord);
    async fn record_step(&self, entry: StepAuditEntry);
    async fn record_fallback(&self, trace: FallbackTrace);
}

/// Default sink: every record becomes a structured `tracing` event. Never
/// fails — `tracing` itself is infallible from the caller's perspective.
pub struct TracingTelemetrySink;

#[async_trait]
impl TelemetrySink for TracingTelemetrySink {
    async fn record_usage(&self, record: UsageRecord) {
        tracing::info!(
            request_id = %record.request_id,
            model_id = %record.model_id,
            total_tokens = record.total_tokens,
            cost_micro_usd = record.cost_micro_usd,
            succeeded = record.succeeded,
            "usage record"
        );
    }

    async fn record_step(&self, entry: StepAuditEntry) {
        tracing::debug!(
            request_id = %entry.request_id,
            step_id = entry.step_id,
            "{}",
            entry.message
        );
    }

    async fn record_fallback(&self, trace: FallbackTrace) {
        tracing::info!(request_id = %trace.request_id, attempts = trace.attempts.len(), "fallback trace");
    }
}

/// Appends each record as one JSON line to a file, for durable usage
/// accounting without a database. A write failure is logged and swallowed
/// — best-effort per spec §4.9.
pub struct JsonlTelemetrySink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlTelemetrySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        use std::io::Write;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(err) = result {
            tracing::warn!(path = %self.path.display(), %err, "telemetry sink write failed");
        }
    }
}

#[async_trait]
impl TelemetrySink for JsonlTelemetrySink {
    async fn record_usage(&self, record: UsageRecord) {
        if let Ok(line) = serde_json::to_string(&record) {
            self.append_line(&line);
        }
    }

    async fn record_step(&self, entry: StepAuditEntry) {
        if let Ok(line) = serde_json::to_string(&entry) {
            self.append_line(&line);
        }
    }

    async fn record_fallback(&self, trace: FallbackTrace) {
        if let Ok(line) = serde_json::to_string(&trace) {
            self.append_line(&line);
        }
    }
}

/// Narrow repository interface the core consumes for persisted state it
/// does not own (spec §6 "Persisted state layout").
#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn record_usage(&self, record: UsageRecord);
    async fn attach_fallbacks(&self, trace: FallbackTrace);
    async fn store_feedback(&self, feedback: Feedback);

    /// Whether a Usage Record with this request id has been recorded.
    /// `POST /ai/feedback` uses this to return 404 for an unknown
    /// `response_id` rather than silently accepting it; repositories with
    /// no lookup support (e.g. [`NullUsageRepository`]) default to `false`.
    async fn has_usage_record(&self, _request_id: &str) -> bool {
        false
    }
}

/// `POST /ai/feedback` payload (spec §6), persisted but never applied to
/// in-flight or future routing (spec §9 Open Question #3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub response_id: String,
    pub rating: FeedbackRating,
    pub reasons: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackRating {
    Up,
    Down,
}

/// Discards everything; useful when the core is run without a database
/// collaborator wired up.
pub struct NullUsageRepository;

#[async_trait]
impl UsageRepository for NullUsageRepository {
    async fn record_usage(&self, _record: UsageRecord) {}
    async fn attach_fallbacks(&self, _trace: FallbackTrace) {}
    async fn store_feedback(&self, _feedback: Feedback) {}
}

/// Keeps everything in memory, for tests and the non-streaming façade's
/// in-process summary block.
#[derive(Default)]
pub struct InMemoryUsageRepository {
    usage: Mutex<Vec<UsageRecord>>,
    fallbacks: Mutex<Vec<FallbackTrace>>,
    feedback: Mutex<Vec<Feedback>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn fallback_traces(&self) -> Vec<FallbackTrace> {
        self.fallbacks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn feedback_entries(&self) -> Vec<Feedback> {
        self.feedback.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn record_usage(&self, record: UsageRecord) {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).push(record);
    }

    async fn attach_fallbacks(&self, trace: FallbackTrace) {
        self.fallbacks.lock().unwrap_or_else(|e| e.into_inner()).push(trace);
    }

    async fn store_feedback(&self, feedback: Feedback) {
        self.feedback.lock().unwrap_or_else(|e| e.into_inner()).push(feedback);
    }

    async fn has_usage_record(&self, request_id: &str) -> bool {
        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|r| r.request_id == request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_uses_1_3_ratio() {
        assert_eq!(estimate_tokens("one two three four"), 5);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[tokio::test]
    async fn in_memory_repository_records_usage() {
        let repo = InMemoryUsageRepository::new();
        repo.record_usage(UsageRecord {
            request_id: "r1".into(),
            user_id: None,
            model_id: "m1".into(),
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            cost_micro_usd: 0,
            timestamp: 0,
            path: "simple".into(),
            succeeded: true,
        })
        .await;
        assert_eq!(repo.usage_records().len(), 1);
    }

    #[tokio::test]
    async fn jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.jsonl");
        let sink = JsonlTelemetrySink::new(&path);
        sink.record_usage(UsageRecord {
            request_id: "r1".into(),
            user_id: None,
            model_id: "m1".into(),
            prompt_tokens: 1,
            completion_tokens: 1,
            total_tokens: 2,
            cost_micro_usd: 0,
            timestamp: 0,
            path: "simple".into(),
            succeeded: true,
        })
        .await;
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"request_id\":\"r1\""));
    }
}
