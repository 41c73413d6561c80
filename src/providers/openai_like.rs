use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ProviderError, Result};
use crate::gateway::config::ProviderConfig;
use crate::gateway::ChatRequest;

use super::{
    build_http_client, ensure_success, require_api_key, ProviderKind, ProviderReply,
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};

/// Shared client for the OpenAI chat-completions wire shape, which OpenAI,
/// Mistral and Gemini's compatibility surface all speak. The URL is fixed by
/// the owning adapter; Gemini tolerates a missing usage block.
pub(crate) struct OpenAiLikeClient {
    kind: ProviderKind,
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    zero_usage_when_missing: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiLikeClient {
    pub(crate) fn new(
        kind: ProviderKind,
        config: &ProviderConfig,
        url: String,
        zero_usage_when_missing: bool,
    ) -> Self {
        Self {
            kind,
            http: build_http_client(),
            url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            zero_usage_when_missing,
        }
    }

    pub(crate) async fn call(
        &self,
        request: &ChatRequest,
        system_prompt: &str,
    ) -> Result<ProviderReply> {
        require_api_key(self.kind, &self.api_key)?;

        let mut messages = Vec::<Value>::new();
        if !system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        let response = ensure_success(response).await?;

        let parsed = response
            .json::<ChatCompletionsResponse>()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            ProviderError::Decode(format!("{} response has no choices", self.kind))
        })?;
        let usage = match parsed.usage {
            Some(usage) => usage,
            None if self.zero_usage_when_missing => Usage::default(),
            None => {
                return Err(ProviderError::Decode(format!(
                    "{} response has no usage block",
                    self.kind
                )))
            }
        };

        Ok(ProviderReply {
            text: choice.message.content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}
