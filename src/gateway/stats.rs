use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

const RECENT_ERRORS_CAP: usize = 10;

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub by_provider: BTreeMap<String, u64>,
    pub errors_by_provider: BTreeMap<String, u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStats {
    pub total_input: u64,
    pub total_output: u64,
    pub input_by_provider: BTreeMap<String, u64>,
    pub output_by_provider: BTreeMap<String, u64>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total: u64,
    pub by_type: BTreeMap<String, u64>,
    pub recent_errors: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub requests: RequestStats,
    pub tokens: TokenStats,
    pub errors: ErrorStats,
}

#[derive(Debug, Default)]
struct StatsInner {
    requests: RequestStats,
    tokens: TokenStats,
    errors_total: u64,
    errors_by_type: BTreeMap<String, u64>,
    recent_errors: VecDeque<String>,
}

impl StatsInner {
    fn add_tokens(&mut self, provider: &str, input_tokens: u64, output_tokens: u64) {
        self.tokens.total_input += input_tokens;
        self.tokens.total_output += output_tokens;
        *self
            .tokens
            .input_by_provider
            .entry(provider.to_string())
            .or_default() += input_tokens;
        *self
            .tokens
            .output_by_provider
            .entry(provider.to_string())
            .or_default() += output_tokens;
    }
}

/// Process-wide counters. Each terminal disposition of a request runs exactly
/// one bookkeeping method, and each method is a single critical section.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsInner>,
}

impl Stats {
    pub fn record_cache_hit(&self, provider: &str, input_tokens: u64, output_tokens: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.requests.total += 1;
        inner.requests.successful += 1;
        inner.requests.cache_hits += 1;
        *inner
            .requests
            .by_provider
            .entry(provider.to_string())
            .or_default() += 1;
        inner.add_tokens(provider, input_tokens, output_tokens);
    }

    pub fn record_cache_miss(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.requests.cache_misses += 1;
    }

    pub fn record_success(&self, provider: &str, input_tokens: u64, output_tokens: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.requests.total += 1;
        inner.requests.successful += 1;
        *inner
            .requests
            .by_provider
            .entry(provider.to_string())
            .or_default() += 1;
        inner.add_tokens(provider, input_tokens, output_tokens);
    }

    /// `primary` is the caller-requested provider, charged with the failure
    /// even when failover providers were attempted after it.
    pub fn record_failure(&self, primary: &str, kind: &str, message: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.requests.total += 1;
        inner.requests.failed += 1;
        *inner
            .requests
            .errors_by_provider
            .entry(primary.to_string())
            .or_default() += 1;
        inner.errors_total += 1;
        *inner.errors_by_type.entry(kind.to_string()).or_default() += 1;
        if inner.recent_errors.len() == RECENT_ERRORS_CAP {
            inner.recent_errors.pop_front();
        }
        inner.recent_errors.push_back(message.to_string());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        StatsSnapshot {
            requests: inner.requests.clone(),
            tokens: inner.tokens.clone(),
            errors: ErrorStats {
                total: inner.errors_total,
                by_type: inner.errors_by_type.clone(),
                recent_errors: inner.recent_errors.iter().cloned().collect(),
            },
        }
    }
}
