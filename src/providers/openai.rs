use async_trait::async_trait;

use crate::error::Result;
use crate::gateway::config::ProviderConfig;
use crate::gateway::ChatRequest;

use super::openai_like::OpenAiLikeClient;
use super::{ProviderAdapter, ProviderKind, ProviderReply};

pub struct OpenAiAdapter {
    inner: OpenAiLikeClient,
}

impl OpenAiAdapter {
    pub fn new(config: &ProviderConfig) -> Self {
        let url = format!(
            "{}/v1/chat/completions",
            config.endpoint.trim_end_matches('/')
        );
        Self {
            inner: OpenAiLikeClient::new(ProviderKind::OpenAi, config, url, false),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn call(&self, request: &ChatRequest, system_prompt: &str) -> Result<ProviderReply> {
        self.inner.call(request, system_prompt).await
    }
}
