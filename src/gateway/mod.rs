//! Gateway core: canonical chat types and the per-request pipeline
//! (admission, cache, dispatch with failover, bookkeeping).

pub mod admin;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod guardrails;
pub mod http;
pub mod limits;
pub mod logging;
pub mod stats;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::error::ProviderError;
use crate::providers::{ProviderAdapter, ProviderKind, ProviderRegistry};

use admin::{AdminState, ControlSnapshot};
use cache::{cache_key, CacheEntryView, CacheLookup, PromptCache};
use config::GatewayConfig;
use guardrails::GuardrailsConfig;
use limits::{Admission, RateLimitPlan, RateLimiter};
use logging::{LogLevel, Logger, LoggingConfig};
use stats::{Stats, StatsSnapshot};

/// The provider-agnostic chat request. Immutable once accepted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!("temperature {temperature} is outside [0, 2]"));
            }
        }
        if self.max_tokens == Some(0) {
            return Err("maxTokens must be positive".to_string());
        }
        Ok(())
    }
}

/// The provider-agnostic chat response; `provider` names the adapter that
/// actually served the request, which may differ from the requested one after
/// failover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
    pub provider: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
    #[error("configuration: {reason}")]
    Configuration { reason: String },
    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },
    #[error("rate limit exceeded")]
    RateLimited {
        limit: u32,
        remaining: u32,
        reset_seconds: u64,
    },
    #[error("upstream failure: {message}")]
    Upstream { message: String },
    #[error("request cancelled")]
    Cancelled,
}

pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_else(|_| std::time::Duration::from_secs(0))
            .as_secs()
    }
}

/// A served request plus the admission echoed back as RateLimit-* headers.
#[derive(Clone, Debug)]
pub struct ChatOutcome {
    pub response: ChatResponse,
    pub admission: Admission,
}

pub struct Gateway {
    registry: ProviderRegistry,
    cache: PromptCache,
    limiter: RateLimiter,
    stats: Stats,
    admin: AdminState,
    logger: Logger,
    clock: Arc<dyn Clock>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GatewayConfig, clock: Arc<dyn Clock>) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|reason| GatewayError::Configuration { reason })?;

        Ok(Self {
            registry: ProviderRegistry::from_config(&config.providers),
            cache: PromptCache::new(config.cache_ttl_seconds),
            limiter: RateLimiter::default(),
            stats: Stats::default(),
            admin: AdminState::new(
                config.system_prompt,
                config.guardrails,
                config.rate_limit_plan,
            ),
            logger: Logger::new(config.logging, config.server.verbose_logging),
            clock,
        })
    }

    /// Replaces (or adds) the adapter for its kind. Tests use this to stub
    /// providers out.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.registry.register(adapter);
    }

    pub fn enabled_providers(&self) -> Vec<ProviderKind> {
        self.registry.enabled()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn system_prompt(&self) -> String {
        self.admin.system_prompt().as_ref().clone()
    }

    pub fn set_system_prompt(&self, prompt: String) {
        self.admin.set_system_prompt(prompt);
    }

    pub fn guardrails(&self) -> GuardrailsConfig {
        self.admin.guardrails().as_ref().clone()
    }

    pub fn set_guardrails(&self, guardrails: GuardrailsConfig) -> Result<(), GatewayError> {
        guardrails
            .validate()
            .map_err(|reason| GatewayError::Configuration { reason })?;
        self.admin.set_guardrails(guardrails);
        Ok(())
    }

    pub fn rate_limit_plan(&self) -> Option<RateLimitPlan> {
        self.admin.plan().map(|plan| plan.as_ref().clone())
    }

    /// Installing or removing a plan atomically drops every per-IP window.
    pub fn set_rate_limit_plan(&self, plan: RateLimitPlan) -> Result<(), GatewayError> {
        plan.validate()
            .map_err(|reason| GatewayError::Configuration { reason })?;
        self.admin.set_plan(Some(plan));
        self.limiter.clear();
        Ok(())
    }

    pub fn clear_rate_limit_plan(&self) {
        self.admin.set_plan(None);
        self.limiter.clear();
    }

    pub fn logging_config(&self) -> LoggingConfig {
        self.logger.config().as_ref().clone()
    }

    pub fn set_logging_config(&self, config: LoggingConfig) {
        self.logger.set_config(config);
    }

    pub fn verbose_logging(&self) -> bool {
        self.logger.verbose()
    }

    pub fn set_verbose_logging(&self, verbose: bool) {
        self.logger.set_verbose(verbose);
    }

    pub fn cache(&self) -> &PromptCache {
        &self.cache
    }

    pub fn cache_snapshot(&self) -> std::collections::BTreeMap<String, CacheEntryView> {
        self.cache.snapshot(self.clock.now_epoch_seconds())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn now_epoch_seconds(&self) -> u64 {
        self.clock.now_epoch_seconds()
    }

    /// Runs the full pipeline for one chat request.
    ///
    /// Ordering is fixed: rate check, cache lookup, provider dispatch with
    /// failover, bookkeeping, cache store. Exactly one bookkeeping block runs
    /// per terminal disposition (hit, success, failure); rate-limit denials
    /// and malformed requests never enter the pipeline and are not counted.
    pub async fn handle(
        &self,
        provider: &str,
        request: ChatRequest,
        client_ip: &str,
        request_id: &str,
    ) -> Result<ChatOutcome, GatewayError> {
        if let Err(reason) = request.validate() {
            return Err(GatewayError::InvalidRequest { reason });
        }
        let Some(primary) = ProviderKind::parse(provider) else {
            self.logger.log(
                LogLevel::Warn,
                "dispatcher",
                "unknown provider requested",
                json!({ "requestId": request_id, "provider": provider }),
            );
            return Err(GatewayError::UnknownProvider {
                name: provider.to_string(),
            });
        };

        let snapshot = self.admin.snapshot();
        let now = self.clock.now_epoch_seconds();

        let admission = self.limiter.admit(client_ip, snapshot.plan.as_deref(), now);
        if !admission.allowed {
            self.logger.log(
                LogLevel::Warn,
                "ratelimit",
                "request denied",
                json!({
                    "requestId": request_id,
                    "clientIp": client_ip,
                    "limit": admission.limit,
                    "resetSeconds": admission.reset_seconds,
                }),
            );
            return Err(GatewayError::RateLimited {
                limit: admission.limit,
                remaining: admission.remaining,
                reset_seconds: admission.reset_seconds,
            });
        }

        let key = cache_key(primary.id(), &request.prompt);
        match self.cache.lookup(&key, now) {
            CacheLookup::Hit(response) => {
                self.stats.record_cache_hit(
                    &response.provider,
                    response.input_tokens,
                    response.output_tokens,
                );
                self.logger.log(
                    LogLevel::Debug,
                    "cache",
                    "cache hit",
                    json!({ "requestId": request_id, "provider": primary.id() }),
                );
                return Ok(ChatOutcome {
                    response,
                    admission,
                });
            }
            CacheLookup::ExpiredMiss | CacheLookup::Miss => {
                self.stats.record_cache_miss();
            }
        }

        // Failover iterates enabled providers after the primary, in
        // id-lexicographic order; it is active only when at least two
        // providers are enabled overall.
        let failover_enabled = self.registry.len() >= 2;
        let mut order = vec![primary];
        if failover_enabled {
            order.extend(
                self.registry
                    .enabled()
                    .into_iter()
                    .filter(|kind| *kind != primary),
            );
        }

        let mut last_error: Option<ProviderError> = None;
        for kind in order {
            if last_error.is_some() {
                self.logger.log(
                    LogLevel::Info,
                    "dispatcher",
                    "failing over",
                    json!({ "requestId": request_id, "provider": kind.id() }),
                );
            }
            match self.attempt(kind, &request, &snapshot).await {
                Ok(response) => {
                    self.stats.record_success(
                        kind.id(),
                        response.input_tokens,
                        response.output_tokens,
                    );
                    self.cache
                        .store(key.clone(), response.clone(), self.clock.now_epoch_seconds());
                    self.logger.log(
                        LogLevel::Info,
                        "dispatcher",
                        "request served",
                        json!({
                            "requestId": request_id,
                            "provider": &response.provider,
                            "model": &response.model,
                            "inputTokens": response.input_tokens,
                            "outputTokens": response.output_tokens,
                        }),
                    );
                    return Ok(ChatOutcome {
                        response,
                        admission,
                    });
                }
                Err(err) => {
                    self.logger.log(
                        LogLevel::Error,
                        "provider",
                        "provider call failed",
                        json!({
                            "requestId": request_id,
                            "provider": kind.id(),
                            "errorKind": err.kind(),
                            "error": err.to_string(),
                        }),
                    );
                    let abort = !err.triggers_failover();
                    last_error = Some(err);
                    if abort {
                        break;
                    }
                }
            }
        }

        let err = last_error.unwrap_or_else(|| {
            ProviderError::Configuration("no provider attempted".to_string())
        });
        self.stats
            .record_failure(primary.id(), err.kind(), &err.to_string());
        self.logger.log(
            LogLevel::Error,
            "dispatcher",
            "all providers failed",
            json!({
                "requestId": request_id,
                "primary": primary.id(),
                "error": err.to_string(),
            }),
        );

        if matches!(err, ProviderError::Cancelled) {
            return Err(GatewayError::Cancelled);
        }
        Err(GatewayError::Upstream {
            message: err.to_string(),
        })
    }

    async fn attempt(
        &self,
        kind: ProviderKind,
        request: &ChatRequest,
        snapshot: &ControlSnapshot,
    ) -> Result<ChatResponse, ProviderError> {
        let adapter = self.registry.get(kind).ok_or_else(|| {
            ProviderError::Configuration(format!("provider {} is not enabled", kind.id()))
        })?;
        let reply = adapter.call(request, &snapshot.system_prompt).await?;
        let text = snapshot
            .guardrails
            .apply(&reply.text)
            .map_err(ProviderError::Guardrail)?;
        Ok(ChatResponse {
            text,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            model: reply.model,
            provider: kind.id().to_string(),
        })
    }
}
