use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::cache::CacheEntryView;
use super::dashboard;
use super::guardrails::GuardrailsConfig;
use super::limits::{Admission, RateLimitPlan};
use super::logging::{LogLevel, LoggingConfig};
use super::stats::StatsSnapshot;
use super::{ChatRequest, Gateway, GatewayError};

#[derive(Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
}

/// Data-plane router (`POST /chat`).
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(handle_chat))
        .with_state(AppState { gateway })
}

/// Control-plane router, served on the admin port.
pub fn admin_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route(
            "/admin/system-prompt",
            get(get_system_prompt).put(set_system_prompt),
        )
        .route("/admin/guardrails", get(get_guardrails).put(set_guardrails))
        .route("/admin/cache", get(get_cache).delete(clear_cache))
        .route(
            "/admin/rate-limit-plan",
            get(get_plan).put(set_plan).delete(delete_plan),
        )
        .route("/admin/logging", get(get_logging).put(set_logging))
        .route("/admin/verbose", get(get_verbose).put(set_verbose))
        .route("/admin/stats", get(get_stats))
        .route("/admin/dashboard", get(get_dashboard))
        .with_state(AppState { gateway })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn apply_rate_limit_headers(response: &mut Response, admission: &Admission) {
    let pairs = [
        ("ratelimit-limit", admission.limit.to_string()),
        ("ratelimit-remaining", admission.remaining.to_string()),
        ("ratelimit-reset", admission.reset_seconds.to_string()),
    ];
    let headers = response.headers_mut();
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let provider = header_value(&headers, "x-llm-provider");
    let client_ip = header_value(&headers, "x-forwarded-for");

    state.gateway.logger().log(
        LogLevel::Debug,
        "http",
        "chat request received",
        json!({
            "requestId": &request_id,
            "provider": &provider,
            "clientIp": &client_ip,
        }),
    );

    match state
        .gateway
        .handle(&provider, payload, &client_ip, &request_id)
        .await
    {
        Ok(outcome) => {
            let mut response = (StatusCode::OK, Json(outcome.response)).into_response();
            apply_rate_limit_headers(&mut response, &outcome.admission);
            response
        }
        Err(err) => error_response(err),
    }
}

fn error_response(err: GatewayError) -> Response {
    match err {
        GatewayError::RateLimited {
            limit,
            remaining,
            reset_seconds,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate limit exceeded",
                "limit": limit,
                "remaining": remaining,
                "reset": reset_seconds,
            })),
        )
            .into_response(),
        GatewayError::InvalidRequest { reason } | GatewayError::Configuration { reason } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": reason })),
        )
            .into_response(),
        err @ (GatewayError::UnknownProvider { .. } | GatewayError::Upstream { .. }) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        GatewayError::Cancelled => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "request cancelled" })),
        )
            .into_response(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemPromptBody {
    system_prompt: String,
}

async fn get_system_prompt(State(state): State<AppState>) -> Json<SystemPromptBody> {
    Json(SystemPromptBody {
        system_prompt: state.gateway.system_prompt(),
    })
}

async fn set_system_prompt(
    State(state): State<AppState>,
    Json(body): Json<SystemPromptBody>,
) -> StatusCode {
    state.gateway.logger().log(
        LogLevel::Info,
        "admin",
        "system prompt updated",
        json!({ "length": body.system_prompt.len() }),
    );
    state.gateway.set_system_prompt(body.system_prompt);
    StatusCode::NO_CONTENT
}

async fn get_guardrails(State(state): State<AppState>) -> Json<GuardrailsConfig> {
    Json(state.gateway.guardrails())
}

async fn set_guardrails(
    State(state): State<AppState>,
    Json(body): Json<GuardrailsConfig>,
) -> Response {
    match state.gateway.set_guardrails(body) {
        Ok(()) => {
            state.gateway.logger().log(
                LogLevel::Info,
                "admin",
                "guardrails updated",
                json!({}),
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheView {
    size: usize,
    entries: BTreeMap<String, CacheEntryView>,
}

async fn get_cache(State(state): State<AppState>) -> Json<CacheView> {
    let entries = state.gateway.cache_snapshot();
    Json(CacheView {
        size: entries.len(),
        entries,
    })
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.gateway.clear_cache();
    state
        .gateway
        .logger()
        .log(LogLevel::Info, "admin", "prompt cache cleared", json!({}));
    StatusCode::NO_CONTENT
}

async fn get_plan(State(state): State<AppState>) -> Json<Option<RateLimitPlan>> {
    Json(state.gateway.rate_limit_plan())
}

async fn set_plan(State(state): State<AppState>, Json(body): Json<RateLimitPlan>) -> Response {
    let name = body.name.clone();
    match state.gateway.set_rate_limit_plan(body) {
        Ok(()) => {
            state.gateway.logger().log(
                LogLevel::Info,
                "admin",
                "rate limit plan installed",
                json!({ "plan": name }),
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn delete_plan(State(state): State<AppState>) -> StatusCode {
    state.gateway.clear_rate_limit_plan();
    state
        .gateway
        .logger()
        .log(LogLevel::Info, "admin", "rate limit plan removed", json!({}));
    StatusCode::NO_CONTENT
}

async fn get_logging(State(state): State<AppState>) -> Json<LoggingConfig> {
    Json(state.gateway.logging_config())
}

async fn set_logging(State(state): State<AppState>, Json(body): Json<LoggingConfig>) -> StatusCode {
    state.gateway.set_logging_config(body);
    state
        .gateway
        .logger()
        .log(LogLevel::Info, "admin", "logging config updated", json!({}));
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize, Deserialize)]
struct VerboseBody {
    verbose: bool,
}

async fn get_verbose(State(state): State<AppState>) -> Json<VerboseBody> {
    Json(VerboseBody {
        verbose: state.gateway.verbose_logging(),
    })
}

async fn set_verbose(State(state): State<AppState>, Json(body): Json<VerboseBody>) -> StatusCode {
    state.gateway.set_verbose_logging(body.verbose);
    StatusCode::NO_CONTENT
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.gateway.stats_snapshot())
}

async fn get_dashboard(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.gateway.stats_snapshot();
    let cache_size = state.gateway.cache().len();
    Html(dashboard::render(
        dashboard::DEFAULT_TEMPLATE,
        &snapshot,
        cache_size,
    ))
}
