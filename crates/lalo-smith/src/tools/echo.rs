//! `echo`: returns its input unchanged. The simplest possible tool,
//! useful for exercising the orchestrator's `ToolCall`/`ToolResult` event
//! pair without any real side effect.

use super::Tool;
use async_trait::async_trait;
use lalo_kernel::tools::{SandboxPolicy, ToolError, ToolOutcome};

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn id(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "returns its input arguments unchanged"
    }

    async fn call(&self, arguments: serde_json::Value, _policy: &SandboxPolicy) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome::Structured(arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_arguments_back() {
        let tool = EchoTool;
        let args = serde_json::json!({"text": "hello"});
        let out = tool.call(args.clone(), &SandboxPolicy::default()).await.unwrap();
        assert_eq!(out, ToolOutcome::Structured(args));
    }
}
