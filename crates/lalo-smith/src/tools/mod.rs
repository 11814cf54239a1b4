//! Reference tools exposed through [`crate::SmithToolExecutor`].
//!
//! Each tool is deterministic within its declared side-effect domain and
//! idempotent under retries (spec §4.7) — both of these are trivially true
//! for `echo` and `word_count` since neither touches the filesystem or the
//! network; they exist to exercise the orchestrator's tool-call path in
//! tests and demos, not to be a real tool catalogue.

pub mod echo;
pub mod word_count;

pub use echo::EchoTool;
pub use word_count::WordCountTool;

use lalo_kernel::tools::{SandboxPolicy, ToolError, ToolOutcome};

/// One in-process tool, narrower than [`lalo_kernel::tools::ToolExecutor`]
/// so [`crate::SmithToolExecutor`] can dispatch to a `HashMap` of these
/// instead of matching on tool id by hand.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn call(&self, arguments: serde_json::Value, policy: &SandboxPolicy) -> Result<ToolOutcome, ToolError>;
}
