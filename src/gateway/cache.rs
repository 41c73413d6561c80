use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use super::ChatResponse;

/// Cache key: `provider + ":" + prompt`, exact byte equality.
pub fn cache_key(provider: &str, prompt: &str) -> String {
    format!("{provider}:{prompt}")
}

#[derive(Clone, Debug)]
struct CacheEntry {
    response: ChatResponse,
    stored_at: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryView {
    pub response: ChatResponse,
    pub stored_at: u64,
    pub age_seconds: u64,
}

#[derive(Debug)]
pub enum CacheLookup {
    Hit(ChatResponse),
    ExpiredMiss,
    Miss,
}

/// TTL-bounded map from `provider:prompt` to a prior canonical response.
///
/// Expired entries are removed lazily on lookup. There is deliberately no
/// single-flight dedup: two concurrent misses on one key each call the
/// provider and the second store overwrites the first.
#[derive(Debug)]
pub struct PromptCache {
    ttl_seconds: u64,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl PromptCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn lookup(&self, key: &str, now: u64) -> CacheLookup {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get(key) else {
            return CacheLookup::Miss;
        };
        if now.saturating_sub(entry.stored_at) >= self.ttl_seconds {
            entries.remove(key);
            return CacheLookup::ExpiredMiss;
        }
        CacheLookup::Hit(entry.response.clone())
    }

    pub fn store(&self, key: String, response: ChatResponse, now: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key,
            CacheEntry {
                response,
                stored_at: now,
            },
        );
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shallow copy for admin inspection, sorted by key.
    pub fn snapshot(&self, now: u64) -> BTreeMap<String, CacheEntryView> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(key, entry)| {
                (
                    key.clone(),
                    CacheEntryView {
                        response: entry.response.clone(),
                        stored_at: entry.stored_at,
                        age_seconds: now.saturating_sub(entry.stored_at),
                    },
                )
            })
            .collect()
    }
}
