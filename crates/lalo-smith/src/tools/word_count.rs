//! `word_count`: counts whitespace-separated words and characters in a
//! `text` argument. Deterministic, no side effects — a stand-in for a real
//! analysis tool in tests and demos.

use super::Tool;
use async_trait::async_trait;
use lalo_kernel::tools::{SandboxPolicy, ToolError, ToolOutcome};

pub struct WordCountTool;

#[async_trait]
impl Tool for WordCountTool {
    fn id(&self) -> &'static str {
        "word_count"
    }

    fn description(&self) -> &'static str {
        "counts words and characters in the 'text' argument"
    }

    async fn call(&self, arguments: serde_json::Value, _policy: &SandboxPolicy) -> Result<ToolOutcome, ToolError> {
        let text = arguments
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::Failed {
                tool: self.id().to_string(),
                message: "missing string argument 'text'".to_string(),
            })?;

        Ok(ToolOutcome::Structured(serde_json::json!({
            "words": text.split_whitespace().count(),
            "characters": text.chars().count(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_words_and_characters() {
        let tool = WordCountTool;
        let out = tool
            .call(serde_json::json!({"text": "one two three"}), &SandboxPolicy::default())
            .await
            .unwrap();
        let ToolOutcome::Structured(value) = out else {
            panic!("expected structured outcome");
        };
        assert_eq!(value["words"], 3);
        assert_eq!(value["characters"], 13);
    }

    #[tokio::test]
    async fn missing_text_argument_fails() {
        let tool = WordCountTool;
        let err = tool.call(serde_json::json!({}), &SandboxPolicy::default()).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }
}
