use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::providers::ProviderKind;

use super::guardrails::GuardrailsConfig;
use super::limits::RateLimitPlan;
use super::logging::LoggingConfig;

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderConfig {
    /// A provider participates in dispatch iff its endpoint is set.
    pub fn enabled(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub port: u16,
    pub admin_port: u16,
    pub verbose_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            admin_port: 8081,
            verbose_logging: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub providers: BTreeMap<ProviderKind, ProviderConfig>,
    pub cache_ttl_seconds: u64,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub system_prompt: String,
    pub guardrails: GuardrailsConfig,
    pub rate_limit_plan: Option<RateLimitPlan>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            providers: BTreeMap::new(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            system_prompt: String::new(),
            guardrails: GuardrailsConfig::default(),
            rate_limit_plan: None,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.providers.values().any(ProviderConfig::enabled) {
            return Err("at least one provider must be configured".to_string());
        }
        self.guardrails.validate()?;
        if let Some(plan) = &self.rate_limit_plan {
            plan.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_an_enabled_provider() {
        let mut config = GatewayConfig::default();
        assert!(config.validate().is_err());

        config.providers.insert(
            ProviderKind::OpenAi,
            ProviderConfig {
                endpoint: "https://api.openai.com".to_string(),
                api_key: "sk-test".to_string(),
                model: "gpt-4".to_string(),
            },
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn provider_with_blank_endpoint_is_disabled() {
        let config = ProviderConfig {
            endpoint: "  ".to_string(),
            ..ProviderConfig::default()
        };
        assert!(!config.enabled());
    }

    #[test]
    fn provider_debug_redacts_api_key() {
        let config = ProviderConfig {
            endpoint: "https://api.openai.com".to_string(),
            api_key: "sk-secret".to_string(),
            model: "gpt-4".to_string(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn config_deserializes_with_camel_case_keys_and_defaults() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{
                "providers": { "openai": { "endpoint": "https://api.openai.com", "apiKey": "sk", "model": "gpt-4" } },
                "server": { "port": 9090 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.cache_ttl_seconds, DEFAULT_CACHE_TTL_SECONDS);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.admin_port, 8081);
        assert!(config.providers[&ProviderKind::OpenAi].enabled());
    }
}
