//! Dataset-specific fetch and validation functions.
//!
//! One function per upstream feed, each returning the typed payload that
//! gets persisted in the dataset cache. Validators are separate so the
//! cache can apply them to fresh fetches only.

use std::collections::HashMap;

use chrono::Utc;
use shelfmark_core::Error;
use shelfmark_core::catalog::{
    AccountPayload, BundleEntry, CardEntry, DelistedEntry, DelistedFeed, DlcEntry, UserCatalogState,
};

use crate::fetch::JsonTransport;

/// Storage keys for the six datasets (`<key>_last` holds the timestamp).
pub const KEY_ACCOUNT: &str = "dataset_account";
pub const KEY_DELISTED: &str = "dataset_delisted";
pub const KEY_DLC: &str = "dataset_dlc";
pub const KEY_CARDS: &str = "dataset_cards";
pub const KEY_BUNDLES: &str = "dataset_bundles";
pub const KEY_LIMITED: &str = "dataset_limited";

/// All dataset payload keys, for cache invalidation and status reporting.
pub const DATASET_KEYS: &[&str] = &[KEY_ACCOUNT, KEY_DELISTED, KEY_DLC, KEY_CARDS, KEY_BUNDLES, KEY_LIMITED];

/// Fetch the account snapshot and derive the membership sets.
///
/// The endpoint serves an empty payload instead of an error when there is
/// no signed-in session; that case is reported as `NotAuthenticated` so
/// the orchestrator can decide between cached data and aborting.
pub async fn fetch_account(transport: &dyn JsonTransport, url: &str) -> Result<UserCatalogState, Error> {
    // cache-buster, the endpoint is aggressively cached upstream
    let url = format!("{url}?t={}", Utc::now().timestamp_millis());
    let payload: AccountPayload = serde_json::from_value(transport.get_json(&url).await?)?;

    if payload.is_unauthenticated() {
        return Err(Error::NotAuthenticated);
    }

    Ok(payload.into())
}

/// Fetch the delisted-items registry, keyed by item id.
pub async fn fetch_delisted(transport: &dyn JsonTransport, url: &str) -> Result<HashMap<String, DelistedEntry>, Error> {
    let feed: DelistedFeed = serde_json::from_value(transport.get_json(url).await?)?;

    if !feed.success {
        return Err(Error::Validation("delisted feed reported failure".into()));
    }

    Ok(feed.removed_apps.into_iter().map(|entry| (entry.appid.clone(), entry)).collect())
}

/// Fetch the downloadable-content map.
pub async fn fetch_dlc(transport: &dyn JsonTransport, url: &str) -> Result<HashMap<String, DlcEntry>, Error> {
    Ok(serde_json::from_value(transport.get_json(url).await?)?)
}

/// Fetch the trading-card map.
///
/// Decoding into [`CardEntry`] requires the `marketable` field, which
/// doubles as the format check for pre-marketable cached payloads.
pub async fn fetch_cards(transport: &dyn JsonTransport, url: &str) -> Result<HashMap<String, CardEntry>, Error> {
    Ok(serde_json::from_value(transport.get_json(url).await?)?)
}

/// Fetch the bundle-history map.
pub async fn fetch_bundles(transport: &dyn JsonTransport, url: &str) -> Result<HashMap<String, BundleEntry>, Error> {
    Ok(serde_json::from_value(transport.get_json(url).await?)?)
}

/// Fetch the low-confidence-flag map. Only the keys carry information.
pub async fn fetch_limited(
    transport: &dyn JsonTransport,
    url: &str,
) -> Result<HashMap<String, serde_json::Value>, Error> {
    Ok(serde_json::from_value(transport.get_json(url).await?)?)
}

/// Sanity check for the flat map feeds: a payload implausibly smaller
/// than the known catalog size is a truncated or error response.
pub fn check_min_entries<T>(map: &HashMap<String, T>, min: usize) -> Result<(), Error> {
    if map.len() < min {
        return Err(Error::Validation(format!("feed has {} entries, expected at least {min}", map.len())));
    }
    Ok(())
}
