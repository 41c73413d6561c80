use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ProviderError, Result};
use crate::gateway::config::ProviderConfig;
use crate::gateway::ChatRequest;

use super::{
    build_http_client, ensure_success, require_api_key, ProviderAdapter, ProviderKind,
    ProviderReply, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};

pub struct OllamaAdapter {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaAdapter {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: build_http_client(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.endpoint)
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn call(&self, request: &ChatRequest, system_prompt: &str) -> Result<ProviderReply> {
        require_api_key(self.kind(), &self.api_key)?;

        let mut messages = Vec::<Value>::new();
        if !system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                "num_predict": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            },
        });

        let response = self
            .http
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        let response = ensure_success(response).await?;

        let parsed = response
            .json::<OllamaChatResponse>()
            .await
            .map_err(ProviderError::from_reqwest)?;

        Ok(ProviderReply {
            text: parsed.message.content,
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}
