//! Bounded in-memory store for validation outcomes (moka-backed).
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::Op;
use std::time::Duration;

use crate::services::cache::record::TokenRecord;

/// What the TTL clock of a cache entry is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryAnchor {
    /// Entries expire `ttl` after they were written.
    #[default]
    Write,
    /// Entries expire `ttl` after they were last read or written.
    Access,
}

impl ExpiryAnchor {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "write" => Some(Self::Write),
            "access" | "idle" => Some(Self::Access),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_entries: u64,
    pub ttl: Duration,
    pub anchor: ExpiryAnchor,
}

impl CacheSettings {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            max_entries,
            ttl,
            anchor: ExpiryAnchor::Write,
        }
    }

    pub fn with_anchor(mut self, anchor: ExpiryAnchor) -> Self {
        self.anchor = anchor;
        self
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(30))
    }
}

/// One of the validator's two outcome caches.
///
/// Expired entries are never returned by `get`, even before moka physically evicts them.
/// Capacity overflow is resolved by moka's admission/eviction policy (TinyLFU).
pub struct OutcomeCache {
    inner: Cache<String, TokenRecord>,
    settings: CacheSettings,
}

impl std::fmt::Debug for OutcomeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeCache")
            .field("settings", &self.settings)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

impl OutcomeCache {
    pub fn new(settings: CacheSettings) -> Self {
        let builder = Cache::builder().max_capacity(settings.max_entries);
        let builder = match settings.anchor {
            ExpiryAnchor::Write => builder.time_to_live(settings.ttl),
            ExpiryAnchor::Access => builder.time_to_idle(settings.ttl),
        };

        Self {
            inner: builder.build(),
            settings,
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    pub fn ttl(&self) -> Duration {
        self.settings.ttl
    }

    pub async fn get(&self, key: &str) -> Option<TokenRecord> {
        self.inner.get(key).await
    }

    /// Inserts or replaces the record for `key`. The record is stored whole.
    pub async fn put(&self, key: &str, record: TokenRecord) {
        self.inner.insert(key.to_string(), record).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Removes the entry for `key` only if the record currently stored is stale at `now`.
    ///
    /// Runs atomically for the key, so a fresh record written by a concurrent validation
    /// between our read and this call survives.
    ///
    /// Returns `true` when an entry was removed.
    pub async fn invalidate_if_stale(&self, key: &str, now: DateTime<Utc>) -> bool {
        let result = self
            .inner
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if !entry.value().is_fresh(now) => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        matches!(result, moka::ops::compute::CompResult::Removed(_))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Number of live entries after moka has flushed its pending maintenance.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
