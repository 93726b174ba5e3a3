//! HTTP adapter for the LLM provider.
//!
//! Speaks the OpenAI-compatible chat-completions contract over reqwest.
//! No retry lives here: a failed call is a failed step, and the
//! orchestrator decides what the user sees.

use super::wire::{self, ChatRequest, ChatResponse};
use async_trait::async_trait;
use crossbar_application::ports::llm_client::{LlmClient, LlmReply, ProviderError};
use crossbar_domain::{ToolDescriptor, Turn};
use std::time::Duration;
use tracing::debug;

/// Connection settings for the provider endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL, e.g. `https://api.example.com/v1`
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Optional system preamble prepended to every request
    pub system_prompt: Option<String>,
    pub request_timeout: Duration,
}

/// Chat-completions client.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl ChatCompletionsClient {
    pub fn new(settings: LlmSettings) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { http, settings })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDescriptor],
    ) -> Result<LlmReply, ProviderError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: wire::encode_turns(self.settings.system_prompt.as_deref(), turns),
            tools: wire::encode_tools(tools),
        };
        debug!(
            model = %self.settings.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "requesting completion"
        );

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Unauthorized,
                429 => ProviderError::RateLimited,
                code => ProviderError::Status { status: code, body },
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        wire::decode_reply(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let client = ChatCompletionsClient::new(LlmSettings {
            endpoint: "http://localhost:8080/v1/".into(),
            api_key: "k".into(),
            model: "m".into(),
            system_prompt: None,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(
            client.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }
}
