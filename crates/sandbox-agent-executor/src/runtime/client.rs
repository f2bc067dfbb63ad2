//! Agent runtime backed by an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use sandbox_agent_core::{
    AgentProfile, AgentRuntime, RuntimeError, RuntimeStep, ToolDeclaration, Transcript,
    config::ModelSettings,
};
use secrecy::{ExposeSecret, Secret};

use super::protocol::{ChatResponse, from_chat_response, to_chat_request};

/// Asks a hosted model for the next step of a session.
pub struct ChatCompletionsRuntime {
    endpoint: String,
    key: Secret<String>,
    model: String,
    profile: AgentProfile,
    http: reqwest::Client,
}

impl ChatCompletionsRuntime {
    /// Create a runtime for `settings`, speaking as `profile`.
    #[must_use]
    pub fn new(settings: &ModelSettings, profile: AgentProfile) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            key: settings.key.clone(),
            model: settings.name.clone(),
            profile,
            http: reqwest::Client::new(),
        }
    }

    /// Build the chat completions URL.
    pub(crate) fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    #[must_use]
    pub const fn profile(&self) -> &AgentProfile {
        &self.profile
    }
}

#[async_trait]
impl AgentRuntime for ChatCompletionsRuntime {
    async fn next_step(
        &self,
        transcript: &Transcript,
        tools: &[ToolDeclaration],
    ) -> Result<RuntimeStep, RuntimeError> {
        let url = self.completions_url();
        let body = to_chat_request(&self.model, &self.profile.instruction, transcript, tools);

        tracing::debug!(
            url = %url,
            model = %self.model,
            messages = body.messages.len(),
            "requesting next step from model"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| RuntimeError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RuntimeError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(RuntimeError::Request(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| RuntimeError::Protocol(format!("invalid JSON response: {e}")))?;

        from_chat_response(parsed)
    }
}
