use async_trait::async_trait;

use crate::error::Result;
use crate::gateway::config::ProviderConfig;
use crate::gateway::ChatRequest;

use super::openai_like::OpenAiLikeClient;
use super::{ProviderAdapter, ProviderKind, ProviderReply};

/// Gemini's OpenAI-compatibility surface: chat-completions body posted to the
/// `:chatCompletions` method suffix, usage block sometimes absent.
pub struct GeminiAdapter {
    inner: OpenAiLikeClient,
}

impl GeminiAdapter {
    pub fn new(config: &ProviderConfig) -> Self {
        let url = format!("{}:chatCompletions", config.endpoint.trim_end_matches('/'));
        Self {
            inner: OpenAiLikeClient::new(ProviderKind::Gemini, config, url, true),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn call(&self, request: &ChatRequest, system_prompt: &str) -> Result<ProviderReply> {
        self.inner.call(request, system_prompt).await
    }
}
