//! Assembles the six cached datasets into one catalog snapshot.
//!
//! Datasets refresh independently and concurrently; there is no ordering
//! dependency between them. Concurrent snapshot requests (a scan racing a
//! status command, say) share one in-flight assembly instead of issuing
//! duplicate fetches. There is only one snapshot, so the single-flight
//! slot is global.

use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use shelfmark_core::catalog::{self, DatasetTimes, ItemId};
use shelfmark_core::{AppConfig, CacheEntry, CatalogSnapshot, DatasetCache, Error, KeyValueStore, Settings, UserCatalogState};
use tokio::sync::Mutex;

use crate::feeds::{self, KEY_ACCOUNT, KEY_BUNDLES, KEY_CARDS, KEY_DELISTED, KEY_DLC, KEY_LIMITED};
use crate::fetch::JsonTransport;

/// The one failure that escapes assembly; everything else degrades to
/// cached data inside the dataset caches.
#[derive(Debug, Clone, Copy)]
struct NotSignedIn;

type SharedAssembly = Shared<BoxFuture<'static, Result<Arc<CatalogSnapshot>, NotSignedIn>>>;

/// Cache freshness summary for one dataset, for status reporting.
#[derive(Debug, Clone)]
pub struct DatasetStatus {
    pub key: &'static str,
    pub refreshed_at: Option<chrono::DateTime<Utc>>,
    pub entries: Option<usize>,
}

struct Inner {
    store: KeyValueStore,
    cache: DatasetCache,
    transport: Arc<dyn JsonTransport>,
    config: AppConfig,
    inflight: Mutex<Option<SharedAssembly>>,
}

/// Runs the account cache and the five catalog dataset caches, merging
/// the results into a [`CatalogSnapshot`].
#[derive(Clone)]
pub struct RefreshOrchestrator {
    inner: Arc<Inner>,
}

impl RefreshOrchestrator {
    pub fn new(store: KeyValueStore, transport: Arc<dyn JsonTransport>, config: AppConfig) -> Self {
        let cache = DatasetCache::new(store.clone());
        Self { inner: Arc::new(Inner { store, cache, transport, config, inflight: Mutex::new(None) }) }
    }

    /// Get the current snapshot, refreshing expired datasets.
    ///
    /// # Errors
    ///
    /// `Error::NotAuthenticated` when the account endpoint reports no
    /// session and no cached account data exists; nothing useful can be
    /// annotated in that state. All other failures degrade to cached
    /// values inside the per-dataset caches.
    pub async fn snapshot(&self, settings: &Settings) -> Result<Arc<CatalogSnapshot>, Error> {
        let shared = {
            let mut inflight = self.inner.inflight.lock().await;
            match inflight.as_ref() {
                Some(pending) => {
                    tracing::debug!("joining in-flight snapshot assembly");
                    pending.clone()
                }
                None => {
                    let assembly = Self::assemble(self.inner.clone(), settings.clone()).boxed().shared();
                    *inflight = Some(assembly.clone());
                    assembly
                }
            }
        };

        let result = shared.clone().await;

        let mut inflight = self.inner.inflight.lock().await;
        if inflight.as_ref().is_some_and(|pending| pending.ptr_eq(&shared)) {
            *inflight = None;
        }

        result.map_err(|NotSignedIn| Error::NotAuthenticated)
    }

    /// Drop every dataset's refresh timestamp so the next snapshot
    /// re-fetches regardless of TTLs. Cached payloads stay as fallbacks.
    pub async fn invalidate_all(&self) -> Result<(), Error> {
        for &key in feeds::DATASET_KEYS {
            self.inner.cache.invalidate(key).await?;
        }
        Ok(())
    }

    /// Report cache freshness and entry counts per dataset.
    pub async fn status(&self) -> Result<Vec<DatasetStatus>, Error> {
        let mut statuses = Vec::with_capacity(feeds::DATASET_KEYS.len());
        for &key in feeds::DATASET_KEYS {
            let entry = self.inner.cache.entry::<serde_json::Value>(key).await;
            let entries = entry.value.as_ref().and_then(|v| match v {
                serde_json::Value::Object(map) => Some(map.len()),
                serde_json::Value::Array(items) => Some(items.len()),
                _ => None,
            });
            statuses.push(DatasetStatus { key, refreshed_at: entry.fetched_at, entries });
        }
        Ok(statuses)
    }

    /// Access to the underlying store, for host commands (factory reset).
    pub fn store(&self) -> &KeyValueStore {
        &self.inner.store
    }

    async fn assemble(inner: Arc<Inner>, settings: Settings) -> Result<Arc<CatalogSnapshot>, NotSignedIn> {
        let cache = &inner.cache;
        let transport = inner.transport.as_ref();
        let config = &inner.config;
        let min = config.min_feed_entries;

        let (account, delisted, dlc, cards, bundles, limited) = tokio::join!(
            Self::account_entry(&inner, &settings),
            cache.get_or_refresh(
                KEY_DELISTED,
                settings.delisted_refresh_interval,
                settings.want_delisted,
                || feeds::fetch_delisted(transport, &config.delisted_url),
                |_| Ok(()),
            ),
            cache.get_or_refresh(
                KEY_DLC,
                settings.dlc_refresh_interval,
                settings.want_dlc,
                || feeds::fetch_dlc(transport, &config.dlc_url),
                |map| feeds::check_min_entries(map, min),
            ),
            cache.get_or_refresh(
                KEY_CARDS,
                settings.cards_refresh_interval,
                settings.want_cards,
                || feeds::fetch_cards(transport, &config.cards_url),
                |map| feeds::check_min_entries(map, min),
            ),
            cache.get_or_refresh(
                KEY_BUNDLES,
                settings.bundles_refresh_interval,
                settings.want_bundles,
                || feeds::fetch_bundles(transport, &config.bundles_url),
                |map| feeds::check_min_entries(map, min),
            ),
            cache.get_or_refresh(
                KEY_LIMITED,
                settings.limited_refresh_interval,
                settings.want_limited,
                || feeds::fetch_limited(transport, &config.limited_url),
                |map| feeds::check_min_entries(map, min),
            ),
        );

        let account = account?;

        let refreshed = DatasetTimes {
            user: account.fetched_at,
            delisted: delisted.fetched_at,
            dlc: dlc.fetched_at,
            cards: cards.fetched_at,
            bundles: bundles.fetched_at,
            limited: limited.fetched_at,
        };

        let snapshot = CatalogSnapshot {
            user: account.value.unwrap_or_default(),
            delisted: delisted.value.map(catalog::index_by_item),
            dlc: dlc.value.map(catalog::index_by_item),
            cards: cards.value.map(catalog::index_by_item),
            bundles: bundles.value.map(catalog::index_by_number),
            limited: limited
                .value
                .map(|map| map.into_keys().filter_map(|k| k.parse().ok().map(ItemId)).collect()),
            refreshed,
        };

        tracing::debug!(
            owned = snapshot.user.owned_items.len(),
            wishlist = snapshot.user.wishlist.len(),
            "assembled catalog snapshot"
        );

        Ok(Arc::new(snapshot))
    }

    /// Account data is special-cased: an unauthenticated payload falls
    /// back to cached data if any exists and aborts the pass otherwise.
    /// Plain fetch failures degrade like any other dataset.
    async fn account_entry(inner: &Inner, settings: &Settings) -> Result<CacheEntry<UserCatalogState>, NotSignedIn> {
        let cached = inner.cache.entry::<UserCatalogState>(KEY_ACCOUNT).await;
        let now = Utc::now();

        if cached.is_fresh(settings.user_refresh_interval, now) {
            tracing::debug!("account cache hit");
            return Ok(cached);
        }

        match feeds::fetch_account(inner.transport.as_ref(), &inner.config.account_url).await {
            Ok(state) => {
                if let Err(e) = inner.cache.write(KEY_ACCOUNT, &state, now).await {
                    tracing::warn!(error = %e, "failed to persist account data");
                }
                Ok(CacheEntry { value: Some(state), fetched_at: Some(now) })
            }
            Err(Error::NotAuthenticated) => {
                if cached.value.is_some() {
                    tracing::warn!("account endpoint has no session, serving cached account data");
                    Ok(cached)
                } else {
                    Err(NotSignedIn)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "account refresh failed, serving cached account data");
                Ok(cached)
            }
        }
    }
}
