//! Get-or-refresh caching for one external dataset.
//!
//! Each dataset is stored under two independent keys: the payload itself
//! and a `<key>_last` refresh timestamp. A refresh that fails for any
//! reason (network, decode, sanity check) leaves the stored entry
//! untouched and serves whatever was cached before, stale or not.
//! Availability beats freshness here.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, KeyValueStore};

/// One cached dataset: the value (if any) and when it was fetched.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry<T> {
    pub value: Option<T>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> CacheEntry<T> {
    /// An entry with no value and no history.
    pub fn empty() -> Self {
        Self { value: None, fetched_at: None }
    }

    /// Whether the entry holds a value younger than `ttl_minutes`.
    pub fn is_fresh(&self, ttl_minutes: u64, now: DateTime<Utc>) -> bool {
        self.value.is_some()
            && self
                .fetched_at
                .is_some_and(|t| now.signed_duration_since(t) < Duration::minutes(ttl_minutes as i64))
    }
}

/// TTL-based cache over the key-value store, one instance shared by all
/// datasets (entries are independent per key).
#[derive(Clone, Debug)]
pub struct DatasetCache {
    store: KeyValueStore,
}

/// Storage key holding a dataset's last-refreshed timestamp.
pub fn timestamp_key(key: &str) -> String {
    format!("{key}_last")
}

impl DatasetCache {
    pub fn new(store: KeyValueStore) -> Self {
        Self { store }
    }

    /// Read the cached entry for `key`.
    ///
    /// Storage or decode problems are logged and reported as an empty
    /// entry; a corrupt cache is indistinguishable from no cache.
    pub async fn entry<T: DeserializeOwned>(&self, key: &str) -> CacheEntry<T> {
        let value = match self.store.get::<T>(key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read cached dataset");
                None
            }
        };

        let fetched_at = match self.store.get::<String>(&timestamp_key(key)).await {
            Ok(raw) => raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|t| t.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read dataset timestamp");
                None
            }
        };

        CacheEntry { value, fetched_at }
    }

    /// Persist a freshly fetched value and its timestamp.
    pub async fn write<T: Serialize>(&self, key: &str, value: &T, fetched_at: DateTime<Utc>) -> Result<(), Error> {
        self.store.set(key, value).await?;
        self.store.set(&timestamp_key(key), &fetched_at.to_rfc3339()).await
    }

    /// Drop a dataset's timestamp so the next refresh ignores the TTL.
    /// The payload itself stays available as a fallback.
    pub async fn invalidate(&self, key: &str) -> Result<(), Error> {
        self.store.delete(&timestamp_key(key)).await
    }

    /// The get-or-refresh contract.
    ///
    /// - Disabled datasets short-circuit to an empty entry without
    ///   touching storage.
    /// - A cached value younger than the TTL is returned without any
    ///   network call.
    /// - Otherwise `fetch` runs and its result must pass `validate`; on
    ///   success the new value is persisted and returned.
    /// - On any failure the previous cached value is returned unchanged,
    ///   even if stale or absent. Failures never propagate to the caller.
    pub async fn get_or_refresh<T, F, Fut, V>(
        &self,
        key: &str,
        ttl_minutes: u64,
        enabled: bool,
        fetch: F,
        validate: V,
    ) -> CacheEntry<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
        V: FnOnce(&T) -> Result<(), Error>,
    {
        if !enabled {
            return CacheEntry::empty();
        }

        let cached = self.entry::<T>(key).await;
        let now = Utc::now();
        if cached.is_fresh(ttl_minutes, now) {
            tracing::debug!(key, "dataset cache hit");
            return cached;
        }

        tracing::debug!(key, "refreshing dataset");
        match fetch().await.and_then(|value| validate(&value).map(|()| value)) {
            Ok(value) => {
                if let Err(e) = self.write(key, &value, now).await {
                    tracing::warn!(key, error = %e, "failed to persist refreshed dataset");
                }
                CacheEntry { value: Some(value), fetched_at: Some(now) }
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "refresh failed, serving cached value");
                cached
            }
        }
    }
}
