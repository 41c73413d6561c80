//! hydra-llm: an AI gateway exposing one chat contract over OpenAI,
//! Anthropic, Gemini, Ollama, Mistral and Cohere, with prompt caching,
//! per-IP rate limiting, response guardrails, automatic failover and
//! usage analytics.

mod error;
pub mod gateway;
pub mod providers;

pub use error::{ProviderError, Result};
pub use gateway::config::{GatewayConfig, ProviderConfig, ServerConfig};
pub use gateway::guardrails::GuardrailsConfig;
pub use gateway::limits::{Admission, RateLimitPlan};
pub use gateway::logging::{LogLevel, LoggingConfig, SinkConfig};
pub use gateway::stats::StatsSnapshot;
pub use gateway::{
    ChatOutcome, ChatRequest, ChatResponse, Clock, Gateway, GatewayError, SystemClock,
};
pub use providers::{ProviderAdapter, ProviderKind, ProviderRegistry, ProviderReply};
