use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ProviderError, Result};
use crate::gateway::config::ProviderConfig;
use crate::gateway::ChatRequest;

use super::{
    build_http_client, ensure_success, require_api_key, ProviderAdapter, ProviderKind,
    ProviderReply, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};

const COHERE_PREAMBLE: &str = "You are a helpful assistant.";

// Upstream sends the system prompt twice: a SYSTEM chat_history entry (with a
// literal "test" stand-in when the prompt is empty) plus the fixed preamble.
// Kept as-is for wire compatibility.
pub struct CohereAdapter {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct CohereChatResponse {
    text: String,
    #[serde(default)]
    meta: CohereMeta,
}

#[derive(Debug, Default, Deserialize)]
struct CohereMeta {
    #[serde(default)]
    tokens: CohereTokens,
    #[serde(default)]
    billed_units: CohereBilledUnits,
}

#[derive(Debug, Default, Deserialize)]
struct CohereTokens {
    #[serde(default)]
    input_tokens: u64,
}

#[derive(Debug, Default, Deserialize)]
struct CohereBilledUnits {
    #[serde(default)]
    output_tokens: u64,
}

impl CohereAdapter {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: build_http_client(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat", self.endpoint)
    }
}

#[async_trait]
impl ProviderAdapter for CohereAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cohere
    }

    async fn call(&self, request: &ChatRequest, system_prompt: &str) -> Result<ProviderReply> {
        require_api_key(self.kind(), &self.api_key)?;

        let history_system = if system_prompt.is_empty() {
            "test"
        } else {
            system_prompt
        };
        let body = json!({
            "model": self.model,
            "message": request.prompt,
            "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "chat_history": [{ "role": "SYSTEM", "message": history_system }],
            "preamble": COHERE_PREAMBLE,
        });

        let response = self
            .http
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        let response = ensure_success(response).await?;

        let parsed = response
            .json::<CohereChatResponse>()
            .await
            .map_err(ProviderError::from_reqwest)?;

        Ok(ProviderReply {
            text: parsed.text,
            input_tokens: parsed.meta.tokens.input_tokens,
            output_tokens: parsed.meta.billed_units.output_tokens,
            // Cohere does not echo the model back; report the configured one.
            model: self.model.clone(),
        })
    }
}
