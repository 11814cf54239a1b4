//! Tool Executor interface (spec §4.7) — the contract the orchestrator
//! consumes, not a concrete implementation (that lives in `lalo-smith`).
//!
//! Grounded on the trait-at-the-seam style of `NodeFunc` in
//! `workflow::graph`): the core depends on a narrow async trait and knows
//! nothing about how a tool actually does its work.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call sandbox constraints the executor must enforce (spec §4.7:
/// "time, memory, network, filesystem scope").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxPolicy {
    pub timeout: Duration,
    pub max_memory_bytes: Option<u64>,
    pub network_allowed: bool,
    pub filesystem_scope: Vec<String>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_memory_bytes: None,
            network_allowed: false,
            filesystem_scope: Vec::new(),
        }
    }
}

/// A tool's result: either a plain string or a structured mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolOutcome {
    Text(String),
    Structured(serde_json::Value),
}

/// Typed tool failures (spec §4.7).
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ToolError {
    #[error("tool '{0}' timed out")]
    Timeout(String),
    #[error("tool '{tool}' denied: {reason}")]
    Denied { tool: String, reason: String },
    #[error("tool '{tool}' failed: {message}")]
    Failed { tool: String, message: String },
    #[error("tool '{0}' not found")]
    NotFound(String),
}

impl From<ToolError> for crate::error::LaloError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Timeout(tool) => crate::error::LaloError::ToolTimeout {
                tool,
                timeout_secs: 30,
            },
            ToolError::Denied { tool, reason } => crate::error::LaloError::ToolDenied { tool, reason },
            ToolError::Failed { tool, message } => {
                crate::error::LaloError::Internal(format!("tool '{tool}' failed: {message}"))
            }
            ToolError::NotFound(tool) => {
                crate::error::LaloError::invalid_request(format!("unknown tool '{tool}'"))
            }
        }
    }
}

/// Static descriptor for a tool the executor can resolve, used by the
/// orchestrator to fail fast on unknown tool ids at plan validation time
/// (spec §9: "the orchestrator resolves tools once at plan validation
/// time; unknown tool ids fail fast").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub id: String,
    pub description: String,
}

/// Consumed by the orchestrator: resolve a tool name + arguments to a
/// typed result under a sandbox policy. Implementations must be
/// deterministic within their declared side-effect domain and idempotent
/// where the orchestrator may retry (spec §4.7).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tools this executor can resolve, for plan-validation-time checks.
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    fn has_tool(&self, tool_id: &str) -> bool {
        self.descriptors().iter().any(|d| d.id == tool_id)
    }

    async fn execute(
        &self,
        tool_id: &str,
        arguments: serde_json::Value,
        policy: &SandboxPolicy,
    ) -> Result<ToolOutcome, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopExecutor;

    #[async_trait]
    impl ToolExecutor for NoopExecutor {
        fn descriptors(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor {
                id: "echo".into(),
                description: "returns its input".into(),
            }]
        }

        async fn execute(
            &self,
            tool_id: &str,
            arguments: serde_json::Value,
            _policy: &SandboxPolicy,
        ) -> Result<ToolOutcome, ToolError> {
            if tool_id != "echo" {
                return Err(ToolError::NotFound(tool_id.to_string()));
            }
            Ok(ToolOutcome::Structured(arguments))
        }
    }

    #[test]
    fn has_tool_reflects_descriptors() {
        let exec = NoopExecutor;
        assert!(exec.has_tool("echo"));
        assert!(!exec.has_tool("web_search"));
    }

    #[tokio::test]
    async fn unknown_tool_errors_not_found() {
        let exec = NoopExecutor;
        let err = exec
            .execute("ghost", serde_json::json!({}), &SandboxPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn tool_error_maps_to_taxonomy() {
        let lalo_err: crate::error::LaloError = ToolError::Denied {
            tool: "web_search".into(),
            reason: "network disabled".into(),
        }
        .into();
        assert_eq!(lalo_err.kind(), "tool_denied");
    }
}
