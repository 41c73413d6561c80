//! Provider adapters: one canonical chat contract mapped onto six wire formats.

mod anthropic;
mod cohere;
mod gemini;
mod mistral;
mod ollama;
mod openai;
mod openai_like;

pub use anthropic::AnthropicAdapter;
pub use cohere::CohereAdapter;
pub use gemini::GeminiAdapter;
pub use mistral::MistralAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};
use crate::gateway::config::ProviderConfig;
use crate::gateway::ChatRequest;

pub(crate) const DEFAULT_TEMPERATURE: f64 = 0.7;
pub(crate) const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Variants are declared in id-lexicographic order so the derived `Ord` (and
/// the registry's `BTreeMap`) yield the deterministic failover order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Cohere,
    Gemini,
    Mistral,
    Ollama,
    OpenAi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Anthropic,
        ProviderKind::Cohere,
        ProviderKind::Gemini,
        ProviderKind::Mistral,
        ProviderKind::Ollama,
        ProviderKind::OpenAi,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Cohere => "cohere",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Raw provider output before guardrails run and before the serving provider
/// id is stamped onto the canonical response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn call(&self, request: &ChatRequest, system_prompt: &str) -> Result<ProviderReply>;
}

/// Enabled adapters keyed by kind; iteration order is id-lexicographic.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: BTreeMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn from_config(providers: &BTreeMap<ProviderKind, ProviderConfig>) -> Self {
        let mut registry = Self::default();
        for (kind, config) in providers {
            if !config.enabled() {
                continue;
            }
            let adapter: Arc<dyn ProviderAdapter> = match kind {
                ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(config)),
                ProviderKind::Cohere => Arc::new(CohereAdapter::new(config)),
                ProviderKind::Gemini => Arc::new(GeminiAdapter::new(config)),
                ProviderKind::Mistral => Arc::new(MistralAdapter::new(config)),
                ProviderKind::Ollama => Arc::new(OllamaAdapter::new(config)),
                ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new(config)),
            };
            registry.register(adapter);
        }
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    pub fn enabled(&self) -> Vec<ProviderKind> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

pub(crate) fn require_api_key(kind: ProviderKind, api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(ProviderError::Configuration(format!(
            "{} api key is not set",
            kind.id()
        )));
    }
    Ok(())
}

pub(crate) fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Transport(format!("status {status}: {body}")))
}
