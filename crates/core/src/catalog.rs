//! Catalog data model: identifiers, user state, third-party datasets, and
//! the merged snapshot a scan pass reads from.
//!
//! Wire shapes mirror the upstream feeds exactly; see the `#[serde(rename)]`
//! attributes. Lookup structures are maps keyed by id. The delisted feed
//! arrives as an array and is converted to a map at fetch time so that
//! per-element lookup during a scan is O(1).

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog item (game or add-on), identified by a numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A purchasable package of items; a separate id namespace from items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub u32);

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Account snapshot as served by the store's dynamicstore endpoint.
///
/// Five parallel membership collections; `rgIgnoredApps` is an
/// object-used-as-set whose values carry no information.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountPayload {
    #[serde(rename = "rgOwnedApps", default)]
    pub owned_apps: Vec<u32>,
    #[serde(rename = "rgOwnedPackages", default)]
    pub owned_packages: Vec<u32>,
    #[serde(rename = "rgWishlist", default)]
    pub wishlist: Vec<u32>,
    #[serde(rename = "rgIgnoredApps", default)]
    pub ignored_apps: HashMap<String, serde_json::Value>,
    #[serde(rename = "rgFollowedApps", default)]
    pub followed_apps: Vec<u32>,
}

impl AccountPayload {
    /// An account payload with no owned items and no owned packages is
    /// what the endpoint serves when there is no signed-in session.
    pub fn is_unauthenticated(&self) -> bool {
        self.owned_apps.is_empty() && self.owned_packages.is_empty()
    }
}

/// Per-user membership sets, derived once per refresh from the account
/// payload. Owned by the refresh orchestrator; read-only to rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCatalogState {
    pub owned_items: HashSet<ItemId>,
    pub owned_packages: HashSet<PackageId>,
    pub wishlist: HashSet<ItemId>,
    pub ignored: HashSet<ItemId>,
    pub followed: HashSet<ItemId>,
}

impl From<AccountPayload> for UserCatalogState {
    fn from(payload: AccountPayload) -> Self {
        let ignored = payload
            .ignored_apps
            .keys()
            .filter_map(|k| k.parse().ok().map(ItemId))
            .collect();

        Self {
            owned_items: payload.owned_apps.into_iter().map(ItemId).collect(),
            owned_packages: payload.owned_packages.into_iter().map(PackageId).collect(),
            wishlist: payload.wishlist.into_iter().map(ItemId).collect(),
            ignored,
            followed: payload.followed_apps.into_iter().map(ItemId).collect(),
        }
    }
}

/// One removed/delisted catalog entry from the tracker registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelistedEntry {
    pub appid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub count: u32,
}

/// The delisted-items feed envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct DelistedFeed {
    pub success: bool,
    #[serde(default)]
    pub removed_apps: Vec<DelistedEntry>,
}

/// Downloadable-content record: which base item a DLC belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlcEntry {
    #[serde(rename = "base_appID")]
    pub base_app_id: Option<u32>,
}

/// Trading-card record for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEntry {
    #[serde(default)]
    pub cards: u32,
    pub marketable: bool,
}

/// Bundle-history record for one item or package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    #[serde(default)]
    pub bundles: u32,
}

/// Per-dataset last-refresh instants, surfaced in badge tooltips. Each
/// dataset has its own cadence and thus its own staleness.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetTimes {
    pub user: Option<DateTime<Utc>>,
    pub delisted: Option<DateTime<Utc>>,
    pub dlc: Option<DateTime<Utc>>,
    pub cards: Option<DateTime<Utc>>,
    pub bundles: Option<DateTime<Utc>>,
    pub limited: Option<DateTime<Utc>>,
}

/// The merged, point-in-time view of all cached datasets used to render
/// one scan pass. Datasets disabled in settings (or never fetched) are
/// `None`, which rendering distinguishes from "present without an entry".
///
/// The bundle feed uses one id namespace per entry, so it is keyed by the
/// raw number and consulted for both items and packages.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub user: UserCatalogState,
    pub delisted: Option<HashMap<ItemId, DelistedEntry>>,
    pub dlc: Option<HashMap<ItemId, DlcEntry>>,
    pub cards: Option<HashMap<ItemId, CardEntry>>,
    pub bundles: Option<HashMap<u32, BundleEntry>>,
    pub limited: Option<HashSet<ItemId>>,
    pub refreshed: DatasetTimes,
}

impl CatalogSnapshot {
    pub fn delisted_entry(&self, id: ItemId) -> Option<&DelistedEntry> {
        self.delisted.as_ref()?.get(&id)
    }

    pub fn dlc_entry(&self, id: ItemId) -> Option<&DlcEntry> {
        self.dlc.as_ref()?.get(&id)
    }

    pub fn card_entry(&self, id: ItemId) -> Option<&CardEntry> {
        self.cards.as_ref()?.get(&id)
    }

    pub fn bundle_entry(&self, id: u32) -> Option<&BundleEntry> {
        self.bundles.as_ref()?.get(&id)
    }

    pub fn is_limited(&self, id: ItemId) -> bool {
        self.limited.as_ref().is_some_and(|set| set.contains(&id))
    }
}

/// Re-key a string-keyed feed map by parsed item id, skipping keys that
/// aren't valid non-negative integers.
pub fn index_by_item<T>(map: HashMap<String, T>) -> HashMap<ItemId, T> {
    map.into_iter()
        .filter_map(|(k, v)| k.parse().ok().map(|id| (ItemId(id), v)))
        .collect()
}

/// Same as [`index_by_item`] but keeps the raw numeric key.
pub fn index_by_number<T>(map: HashMap<String, T>) -> HashMap<u32, T> {
    map.into_iter().filter_map(|(k, v)| k.parse().ok().map(|id| (id, v))).collect()
}
