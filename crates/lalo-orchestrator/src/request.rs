//! Inbound request shape the orchestrator executes (spec §3 "Request",
//! narrowed to the fields the Agent Orchestrator itself needs — the
//! Request Handler façade owns parsing/validation of the wire payload).

use std::collections::HashMap;
use uuid::Uuid;

/// One request to run to completion, already past Router classification.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub id: String,
    pub user_id: Option<String>,
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Cloud credentials the caller presented, keyed by provider
    /// (`"openai"`, `"anthropic"`, `"other"`) — never persisted beyond the
    /// lifetime of this struct (spec §4.3 "credentials passed per-call").
    pub cloud_api_keys: HashMap<String, String>,
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            prompt: prompt.into(),
            max_output_tokens: 512,
            temperature: 0.2,
            top_p: 1.0,
            cloud_api_keys: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_cloud_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.cloud_api_keys.insert(provider.into(), key.into());
        self
    }
}

/// Maps a [`lalo_foundation::registry::Backend`] onto the provider key an
/// [`AgentRequest`]'s `cloud_api_keys` map is indexed by.
pub fn provider_key(backend: lalo_foundation::registry::Backend) -> &'static str {
    use lalo_foundation::registry::Backend;
    match backend {
        Backend::CloudOpenai => "openai",
        Backend::CloudAnthropic => "anthropic",
        Backend::CloudOther => "other",
        Backend::LocalGguf => "local",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let req = AgentRequest::new("hello").with_user("u1").with_cloud_key("openai", "sk-x");
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.user_id.as_deref(), Some("u1"));
        assert_eq!(req.cloud_api_keys.get("openai").map(String::as_str), Some("sk-x"));
    }
}
