use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{ProviderError, Result};
use crate::gateway::config::ProviderConfig;
use crate::gateway::ChatRequest;

use super::{
    build_http_client, ensure_success, require_api_key, ProviderAdapter, ProviderKind,
    ProviderReply, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicAdapter {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: build_http_client(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.endpoint)
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn call(&self, request: &ChatRequest, system_prompt: &str) -> Result<ProviderReply> {
        require_api_key(self.kind(), &self.api_key)?;

        let mut body = Map::<String, Value>::new();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert(
            "max_tokens".to_string(),
            json!(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        );
        body.insert(
            "temperature".to_string(),
            json!(request.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
        );
        if !system_prompt.is_empty() {
            body.insert("system".to_string(), Value::String(system_prompt.to_string()));
        }
        body.insert(
            "messages".to_string(),
            json!([{ "role": "user", "content": request.prompt }]),
        );

        let response = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        let response = ensure_success(response).await?;

        let parsed = response
            .json::<MessagesResponse>()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| {
                ProviderError::Decode("anthropic response has no content blocks".to_string())
            })?;

        Ok(ProviderReply {
            text,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}
