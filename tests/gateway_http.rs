use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use hydra_llm::gateway::cache::cache_key;
use hydra_llm::gateway::http;
use hydra_llm::{
    ChatRequest, ChatResponse, Clock, Gateway, GatewayConfig, GuardrailsConfig, ProviderAdapter,
    ProviderConfig, ProviderError, ProviderKind, ProviderReply, RateLimitPlan,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

struct ManualClock(AtomicU64);

impl ManualClock {
    fn new(now: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(now)))
    }

    fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct StaticAdapter {
    kind: ProviderKind,
    reply: ProviderReply,
    calls: AtomicU32,
}

impl StaticAdapter {
    fn new(kind: ProviderKind, text: &str, input_tokens: u64, output_tokens: u64, model: &str) -> Self {
        Self {
            kind,
            reply: ProviderReply {
                text: text.to_string(),
                input_tokens,
                output_tokens,
                model: model.to_string(),
            },
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ProviderAdapter for StaticAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn call(
        &self,
        _request: &ChatRequest,
        _system_prompt: &str,
    ) -> hydra_llm::Result<ProviderReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

struct FailingAdapter {
    kind: ProviderKind,
    make_error: fn() -> ProviderError,
}

#[async_trait]
impl ProviderAdapter for FailingAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn call(
        &self,
        _request: &ChatRequest,
        _system_prompt: &str,
    ) -> hydra_llm::Result<ProviderReply> {
        Err((self.make_error)())
    }
}

fn provider_config() -> ProviderConfig {
    ProviderConfig {
        endpoint: "http://unused.test".to_string(),
        api_key: "sk-test".to_string(),
        model: "stub".to_string(),
    }
}

fn base_config(kinds: &[ProviderKind]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    for kind in kinds {
        config.providers.insert(*kind, provider_config());
    }
    config
}

fn chat_request(provider: &str, client_ip: &str, prompt: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("x-llm-provider", provider)
        .header("x-forwarded-for", client_ip)
        .header("content-type", "application/json")
        .body(Body::from(json!({ "prompt": prompt }).to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn cache_hit_serves_seeded_response_and_counts_once() {
    let clock = ManualClock::new(1000);
    let gateway = Gateway::with_clock(base_config(&[ProviderKind::OpenAi]), clock.clone()).unwrap();

    let seeded = ChatResponse {
        text: "hi".to_string(),
        input_tokens: 3,
        output_tokens: 1,
        model: "gpt-4".to_string(),
        provider: "openai".to_string(),
    };
    gateway
        .cache()
        .store(cache_key("openai", "hello"), seeded.clone(), 1000);

    let gateway = Arc::new(gateway);
    let app = http::router(gateway.clone());

    clock.set(1500);
    let response = app
        .oneshot(chat_request("openai", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("ratelimit-limit").unwrap(), "0");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: ChatResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed, seeded);

    let stats = gateway.stats_snapshot();
    assert_eq!(stats.requests.total, 1);
    assert_eq!(stats.requests.successful, 1);
    assert_eq!(stats.requests.cache_hits, 1);
    assert_eq!(stats.requests.cache_misses, 0);
    assert_eq!(stats.tokens.total_input, 3);
    assert_eq!(stats.tokens.total_output, 1);
    assert_eq!(stats.requests.by_provider["openai"], 1);
}

#[tokio::test]
async fn failover_serves_from_secondary_and_caches_under_primary_key() {
    let clock = ManualClock::new(0);
    let mut gateway = Gateway::with_clock(
        base_config(&[ProviderKind::OpenAi, ProviderKind::Anthropic]),
        clock.clone(),
    )
    .unwrap();
    gateway.register_adapter(Arc::new(FailingAdapter {
        kind: ProviderKind::OpenAi,
        make_error: || ProviderError::Transport("connection refused".to_string()),
    }));
    gateway.register_adapter(Arc::new(StaticAdapter::new(
        ProviderKind::Anthropic,
        "ok",
        5,
        2,
        "claude-3",
    )));

    let gateway = Arc::new(gateway);
    let app = http::router(gateway.clone());

    let response = app
        .clone()
        .oneshot(chat_request("openai", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: ChatResponse = serde_json::from_slice(
        &to_bytes(response.into_body(), usize::MAX).await.unwrap(),
    )
    .unwrap();
    assert_eq!(parsed.provider, "anthropic");
    assert_eq!(parsed.model, "claude-3");
    assert_eq!(parsed.text, "ok");

    let stats = gateway.stats_snapshot();
    assert_eq!(stats.requests.total, 1);
    assert_eq!(stats.requests.successful, 1);
    assert_eq!(stats.requests.by_provider["anthropic"], 1);
    assert_eq!(stats.requests.cache_misses, 1);

    // The stored entry lives under the requested provider's key, so an
    // identical request hits the cache even though anthropic served it.
    let response = app
        .oneshot(chat_request("openai", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: ChatResponse = serde_json::from_slice(
        &to_bytes(response.into_body(), usize::MAX).await.unwrap(),
    )
    .unwrap();
    assert_eq!(parsed.provider, "anthropic");

    let stats = gateway.stats_snapshot();
    assert_eq!(stats.requests.total, 2);
    assert_eq!(stats.requests.cache_hits, 1);
    assert_eq!(stats.requests.by_provider["anthropic"], 2);
}

#[tokio::test]
async fn rate_limit_denies_third_request_within_window() {
    let clock = ManualClock::new(100);
    let mut config = base_config(&[ProviderKind::OpenAi]);
    config.rate_limit_plan = Some(RateLimitPlan {
        name: "basic".to_string(),
        requests_per_window: 2,
        window_seconds: 60,
    });
    let mut gateway = Gateway::with_clock(config, clock.clone()).unwrap();
    gateway.register_adapter(Arc::new(StaticAdapter::new(
        ProviderKind::OpenAi,
        "hi",
        1,
        1,
        "gpt-4",
    )));

    let app = http::router(Arc::new(gateway));

    let first = app
        .clone()
        .oneshot(chat_request("openai", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("ratelimit-remaining").unwrap(), "1");

    clock.set(105);
    let second = app
        .clone()
        .oneshot(chat_request("openai", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    clock.set(109);
    let third = app
        .clone()
        .oneshot(chat_request("openai", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(third).await;
    assert_eq!(body["limit"], json!(2));
    assert_eq!(body["remaining"], json!(0));
    let reset = body["reset"].as_u64().unwrap();
    assert!(reset > 50 && reset <= 60, "reset out of range: {reset}");

    // A different client is unaffected.
    let other = app
        .oneshot(chat_request("openai", "5.6.7.8", "hello"))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn guardrail_rejection_without_failover_surfaces_upstream_error() {
    let clock = ManualClock::new(0);
    let mut config = base_config(&[ProviderKind::OpenAi]);
    config.guardrails = GuardrailsConfig {
        banned_phrases: vec!["forbidden".to_string()],
        ..GuardrailsConfig::default()
    };
    let mut gateway = Gateway::with_clock(config, clock).unwrap();
    gateway.register_adapter(Arc::new(StaticAdapter::new(
        ProviderKind::OpenAi,
        "this is Forbidden content",
        4,
        4,
        "gpt-4",
    )));

    let gateway = Arc::new(gateway);
    let app = http::router(gateway.clone());

    let response = app
        .oneshot(chat_request("openai", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("forbidden"));

    let stats = gateway.stats_snapshot();
    assert_eq!(stats.requests.total, 1);
    assert_eq!(stats.requests.failed, 1);
    assert_eq!(stats.requests.errors_by_provider["openai"], 1);
    assert_eq!(stats.errors.by_type["guardrail"], 1);
    assert!(!stats.errors.recent_errors.is_empty());
}

#[tokio::test]
async fn disclaimer_is_appended_to_compliant_responses() {
    let clock = ManualClock::new(0);
    let mut config = base_config(&[ProviderKind::OpenAi]);
    config.guardrails = GuardrailsConfig {
        require_disclaimer: true,
        disclaimer: Some("AI may err.".to_string()),
        ..GuardrailsConfig::default()
    };
    let mut gateway = Gateway::with_clock(config, clock).unwrap();
    gateway.register_adapter(Arc::new(StaticAdapter::new(
        ProviderKind::OpenAi,
        "2+2=4",
        2,
        2,
        "gpt-4",
    )));

    let app = http::router(Arc::new(gateway));
    let response = app
        .oneshot(chat_request("openai", "1.2.3.4", "math"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["text"], json!("2+2=4\n\nAI may err."));
}

#[tokio::test]
async fn cancelled_primary_does_not_fail_over() {
    let clock = ManualClock::new(0);
    let mut gateway = Gateway::with_clock(
        base_config(&[ProviderKind::OpenAi, ProviderKind::Anthropic]),
        clock,
    )
    .unwrap();
    gateway.register_adapter(Arc::new(FailingAdapter {
        kind: ProviderKind::OpenAi,
        make_error: || ProviderError::Cancelled,
    }));
    let secondary = Arc::new(StaticAdapter::new(
        ProviderKind::Anthropic,
        "ok",
        1,
        1,
        "claude-3",
    ));
    gateway.register_adapter(secondary.clone());

    let gateway = Arc::new(gateway);
    let app = http::router(gateway.clone());

    let response = app
        .oneshot(chat_request("openai", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);

    let stats = gateway.stats_snapshot();
    assert_eq!(stats.requests.failed, 1);
    assert_eq!(stats.errors.by_type["cancelled"], 1);
}

#[tokio::test]
async fn unknown_provider_header_is_a_bad_gateway() {
    let clock = ManualClock::new(0);
    let gateway = Gateway::with_clock(base_config(&[ProviderKind::OpenAi]), clock).unwrap();
    let app = http::router(Arc::new(gateway));

    let response = app
        .oneshot(chat_request("replicate", "1.2.3.4", "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn out_of_range_temperature_is_rejected_before_dispatch() {
    let clock = ManualClock::new(0);
    let mut gateway = Gateway::with_clock(base_config(&[ProviderKind::OpenAi]), clock).unwrap();
    let adapter = Arc::new(StaticAdapter::new(ProviderKind::OpenAi, "hi", 1, 1, "gpt-4"));
    gateway.register_adapter(adapter.clone());
    let app = http::router(Arc::new(gateway));

    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("x-llm-provider", "openai")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "prompt": "hello", "temperature": 3.0 }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let clock = ManualClock::new(0);
    let gateway = Gateway::with_clock(base_config(&[ProviderKind::OpenAi]), clock).unwrap();
    let app = http::router(Arc::new(gateway));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("ok"));
}
