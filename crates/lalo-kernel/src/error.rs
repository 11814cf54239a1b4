//! Crate-level error taxonomy for `lalo-kernel`.
//!
//! [`LaloError`] is the stable, client-facing error shape carried from the
//! Router through the Orchestrator, the Pool, the Cloud Adapter and the
//! Request Handler. Every variant maps to exactly one `kind` string and one
//! HTTP status at the façade boundary; nothing downstream of the core should
//! need to invent a new kind.
//!
//! Classification methods (`category`, `severity`, `is_retryable`,
//! `is_fatal`) let callers make scheduling decisions (retry with next model,
//! back off, escalate) without matching on the variant directly.

use error_stack::Report;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Stable error taxonomy surfaced to clients (spec §7).
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LaloError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("model load timed out after {timeout_secs}s: {model_id}")]
    ModelLoadTimeout { model_id: String, timeout_secs: u64 },

    #[error("context overflow: prompt+output exceeds every candidate's context window")]
    ContextOverflow,

    #[error("generation timed out after {timeout_secs}s")]
    GenerationTimeout { timeout_secs: u64 },

    #[error("tool '{tool}' timed out after {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("tool '{tool}' denied by sandbox policy: {reason}")]
    ToolDenied { tool: String, reason: String },

    #[error("cloud provider auth failed: {0}")]
    AuthFailed(String),

    #[error("cloud provider quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("cloud provider rate limited: {0}")]
    RateLimited(String),

    #[error("cloud provider error: {0}")]
    ProviderError(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("insufficient memory: {0}")]
    InsufficientMemory(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Broad bucket a [`LaloError`] falls into, for coarse-grained handling
/// (metrics, log sampling) independent of the exact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Client,
    Model,
    Tool,
    Provider,
    Cancellation,
    Internal,
}

/// How urgently an error should be surfaced / alerted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Fatal,
    Retryable,
    Warning,
}

impl LaloError {
    /// The stable `kind` string used on the wire (§6, §7).
    pub fn kind(&self) -> &'static str {
        match self {
            LaloError::InvalidRequest(_) => "invalid_request",
            LaloError::Unauthenticated(_) => "unauthenticated",
            LaloError::ModelUnavailable(_) => "model_unavailable",
            LaloError::ModelLoadTimeout { .. } => "model_load_timeout",
            LaloError::ContextOverflow => "context_overflow",
            LaloError::GenerationTimeout { .. } => "generation_timeout",
            LaloError::ToolTimeout { .. } => "tool_timeout",
            LaloError::ToolDenied { .. } => "tool_denied",
            LaloError::AuthFailed(_) => "auth_failed",
            LaloError::QuotaExhausted(_) => "quota_exhausted",
            LaloError::RateLimited(_) => "rate_limited",
            LaloError::ProviderError(_) => "provider_error",
            LaloError::Cancelled => "cancelled",
            LaloError::InsufficientMemory(_) => "insufficient_memory",
            LaloError::Internal(_) => "internal",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LaloError::InvalidRequest(_) | LaloError::Unauthenticated(_) => ErrorCategory::Client,
            LaloError::ModelUnavailable(_)
            | LaloError::ModelLoadTimeout { .. }
            | LaloError::ContextOverflow
            | LaloError::GenerationTimeout { .. }
            | LaloError::InsufficientMemory(_) => ErrorCategory::Model,
            LaloError::ToolTimeout { .. } | LaloError::ToolDenied { .. } => ErrorCategory::Tool,
            LaloError::AuthFailed(_)
            | LaloError::QuotaExhausted(_)
            | LaloError::RateLimited(_)
            | LaloError::ProviderError(_) => ErrorCategory::Provider,
            LaloError::Cancelled => ErrorCategory::Cancellation,
            LaloError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        if self.is_retryable() {
            ErrorSeverity::Retryable
        } else {
            match self.category() {
                ErrorCategory::Client | ErrorCategory::Cancellation => ErrorSeverity::Warning,
                _ => ErrorSeverity::Fatal,
            }
        }
    }

    /// Whether the core itself may retry this error (§7 table). This is a
    /// property of the *kind*, not of any particular retry budget — callers
    /// still enforce `max_retries_per_step`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LaloError::ModelUnavailable(_)
                | LaloError::ModelLoadTimeout { .. }
                | LaloError::GenerationTimeout { .. }
                | LaloError::ToolTimeout { .. }
                | LaloError::RateLimited(_)
                | LaloError::ProviderError(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Fatal)
    }

    /// The HTTP status this kind maps to at the façade boundary (§6).
    pub fn http_status(&self) -> u16 {
        match self {
            LaloError::InvalidRequest(_) | LaloError::ContextOverflow => 400,
            LaloError::Unauthenticated(_) => 401,
            LaloError::QuotaExhausted(_) => 402,
            LaloError::RateLimited(_) => 429,
            LaloError::GenerationTimeout { .. }
            | LaloError::ToolTimeout { .. }
            | LaloError::ModelLoadTimeout { .. } => 504,
            _ => 500,
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        LaloError::InvalidRequest(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        LaloError::Internal(msg.into())
    }
}

/// Free-form breadcrumbs attached while an error propagates upward, in the
/// spirit of `error_stack`'s attach points but serialisable for telemetry.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    pub location: Option<String>,
    pub details: Vec<(String, String)>,
    pub timestamp: u64,
}

impl ErrorContext {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            details: Vec::new(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }
}

/// A [`LaloError`] paired with the [`ErrorContext`] gathered as it
/// propagated; implements `std::error::Error` so it composes with `?`.
#[derive(Debug, Clone)]
pub struct ContextualError {
    pub error: LaloError,
    pub context: ErrorContext,
}

impl std::fmt::Display for ContextualError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.error, self.context.message)
    }
}

impl std::error::Error for ContextualError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Extension trait to attach an [`ErrorContext`] onto a `Result<_, LaloError>`.
pub trait WithContext<T> {
    fn with_context(self, ctx: ErrorContext) -> Result<T, ContextualError>;
    fn context(self, message: impl Into<String>) -> Result<T, ContextualError>;
}

impl<T> WithContext<T> for Result<T, LaloError> {
    fn with_context(self, ctx: ErrorContext) -> Result<T, ContextualError> {
        self.map_err(|error| ContextualError { error, context: ctx })
    }

    fn context(self, message: impl Into<String>) -> Result<T, ContextualError> {
        self.with_context(ErrorContext::new(message))
    }
}

/// Build an [`LaloError::Internal`] with a formatted message.
#[macro_export]
macro_rules! format_err {
    ($($arg:tt)*) => {
        $crate::error::LaloError::Internal(format!($($arg)*))
    };
}

/// Build a [`LaloError::ProviderError`] with a formatted message.
#[macro_export]
macro_rules! provider_err {
    ($($arg:tt)*) => {
        $crate::error::LaloError::ProviderError(format!($($arg)*))
    };
}

/// Build a [`LaloError::InvalidRequest`] with a formatted message.
#[macro_export]
macro_rules! invalid_request {
    ($($arg:tt)*) => {
        $crate::error::LaloError::InvalidRequest(format!($($arg)*))
    };
}

/// Build a [`LaloError::ToolDenied`] given a tool id and formatted reason.
#[macro_export]
macro_rules! tool_denied {
    ($tool:expr, $($arg:tt)*) => {
        $crate::error::LaloError::ToolDenied { tool: $tool.to_string(), reason: format!($($arg)*) }
    };
}

/// Convenience result alias using [`error_stack::Report`] for rich,
/// context-carrying propagation across module boundaries.
pub type LaloResult<T> = Result<T, Report<LaloError>>;

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::{Report, ResultExt};

    #[test]
    fn kind_strings_match_spec_table() {
        assert_eq!(LaloError::InvalidRequest("x".into()).kind(), "invalid_request");
        assert_eq!(LaloError::Cancelled.kind(), "cancelled");
        assert_eq!(
            LaloError::ModelLoadTimeout {
                model_id: "m".into(),
                timeout_secs: 60
            }
            .kind(),
            "model_load_timeout"
        );
    }

    #[test]
    fn retryable_matches_spec_table() {
        assert!(LaloError::RateLimited("x".into()).is_retryable());
        assert!(LaloError::ModelUnavailable("x".into()).is_retryable());
        assert!(!LaloError::InvalidRequest("x".into()).is_retryable());
        assert!(!LaloError::ToolDenied {
            tool: "t".into(),
            reason: "r".into()
        }
        .is_retryable());
        assert!(!LaloError::Cancelled.is_retryable());
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(LaloError::InvalidRequest("x".into()).http_status(), 400);
        assert_eq!(LaloError::Unauthenticated("x".into()).http_status(), 401);
        assert_eq!(LaloError::QuotaExhausted("x".into()).http_status(), 402);
        assert_eq!(LaloError::RateLimited("x".into()).http_status(), 429);
        assert_eq!(
            LaloError::GenerationTimeout { timeout_secs: 1 }.http_status(),
            504
        );
        assert_eq!(LaloError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn context_attaches_and_displays() {
        let result: Result<(), LaloError> = Err(LaloError::Internal("boom".into()));
        let err = result.context("loading model registry").unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(err.to_string().contains("loading model registry"));
    }

    #[test]
    fn report_carries_context() {
        let result: LaloResult<()> =
            Err(Report::new(LaloError::Internal("root cause".into()))).attach("while routing");
        let report = result.unwrap_err();
        let display = format!("{report:?}");
        assert!(display.contains("root cause"));
        assert!(display.contains("while routing"));
    }

    #[test]
    fn macros_build_expected_variants() {
        let e = invalid_request!("bad field {}", "prompt");
        assert!(matches!(e, LaloError::InvalidRequest(_)));
        let e = tool_denied!("web_search", "network disabled");
        assert!(matches!(e, LaloError::ToolDenied { .. }));
    }
}
