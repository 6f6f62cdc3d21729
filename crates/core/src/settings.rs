//! User settings: feature toggles, badge colors/icons, refresh cadences,
//! page filters, and the re-trigger policy.
//!
//! Settings persist in the key-value store as one JSON object. Loading
//! merges the stored object field-wise over the defaults (unknown fields
//! are dropped, missing fields filled in) and persists the merged result
//! back, so the stored shape converges after upgrades.

use serde::{Deserialize, Serialize};

use crate::{Error, KeyValueStore};

/// Storage key for the settings object.
pub const SETTINGS_KEY: &str = "settings";

/// How annotation reacts to page changes after the initial pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetriggerPolicy {
    /// Scan once at load, never again.
    Disabled,
    /// Re-scan when qualifying DOM mutations are reported.
    Observe,
    /// Re-scan on a fixed interval regardless of mutations.
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Attributes inspected for identifiers, in priority order.
    pub attributes: Vec<String>,

    /// Newline-separated URL substrings; see `allowlist_mode`.
    pub filter_list: String,
    /// When true `filter_list` is an allowlist, otherwise a denylist.
    pub allowlist_mode: bool,

    /// Wrap badges in a styled box.
    pub boxed: bool,
    pub box_color: String,
    pub box_opacity: f64,
    /// Derive the box background from the badge-set encoding.
    pub box_dynamic_color: bool,

    pub icons_scale: f64,
    pub icons_bold: bool,

    /// Insert the badge box before the matched element instead of after.
    pub prefix: bool,
    /// Fixed ISO-like timestamp format instead of the human one.
    pub date_override: bool,

    pub dynamic_content: RetriggerPolicy,
    /// Re-scan cadence for the `ping` policy, in milliseconds.
    pub ping_interval_ms: u64,

    /// Account data refresh cadence, in minutes.
    pub user_refresh_interval: u64,

    pub owned_color: String,
    pub owned_icon: String,
    pub unowned_color: String,
    pub unowned_icon: String,
    pub wishlist_color: String,
    pub wishlist_icon: String,

    pub want_followed: bool,
    pub followed_color: String,
    pub followed_icon: String,

    pub want_ignored: bool,
    pub ignored_color: String,
    pub ignored_icon: String,

    pub want_dlc: bool,
    pub dlc_color: String,
    pub dlc_icon: String,
    pub dlc_refresh_interval: u64,

    pub want_delisted: bool,
    pub delisted_color: String,
    pub delisted_icon: String,
    pub delisted_refresh_interval: u64,

    pub want_limited: bool,
    pub limited_color: String,
    pub limited_icon: String,
    pub limited_refresh_interval: u64,

    pub want_cards: bool,
    pub card_color: String,
    pub card_icon: String,
    pub cards_refresh_interval: u64,

    pub want_bundles: bool,
    pub bundle_color: String,
    pub bundle_icon: String,
    pub bundles_refresh_interval: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            attributes: vec!["href".into(), "src".into(), "style".into()],
            filter_list: String::new(),
            allowlist_mode: false,
            boxed: true,
            box_color: "#000000".into(),
            box_opacity: 0.7,
            box_dynamic_color: false,
            icons_scale: 1.0,
            icons_bold: false,
            prefix: false,
            date_override: false,
            dynamic_content: RetriggerPolicy::Observe,
            ping_interval_ms: 1500,
            user_refresh_interval: 1,
            owned_color: "#008000".into(),
            owned_icon: "&#10004;".into(),
            unowned_color: "#ff0000".into(),
            unowned_icon: "&#10008;".into(),
            wishlist_color: "#ff69b4".into(),
            wishlist_icon: "&#10084;".into(),
            want_followed: true,
            followed_color: "#f7dc6f".into(),
            followed_icon: "&#9733;".into(),
            want_ignored: true,
            ignored_color: "#808080".into(),
            ignored_icon: "&#128683;&#xFE0E;".into(),
            want_dlc: true,
            dlc_color: "#a655b2".into(),
            dlc_icon: "&#8681;".into(),
            dlc_refresh_interval: 1440,
            want_delisted: true,
            delisted_color: "#ffffff".into(),
            delisted_icon: "&#9760;".into(),
            delisted_refresh_interval: 1440,
            want_limited: true,
            limited_color: "#00ffff".into(),
            limited_icon: "&#9881;".into(),
            limited_refresh_interval: 2880,
            want_cards: true,
            card_color: "#0000ff".into(),
            card_icon: "&#x1F0A1;".into(),
            cards_refresh_interval: 2880,
            want_bundles: true,
            bundle_color: "#ffff00".into(),
            bundle_icon: "&#127873;&#xFE0E;".into(),
            bundles_refresh_interval: 2880,
        }
    }
}

/// Parse a `#rrggbb` color into its channels.
pub fn parse_hex_color(color: &str) -> Option<[u8; 3]> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

impl Settings {
    /// Whether annotation should run on this page at all.
    pub fn allows_url(&self, url: &str) -> bool {
        let matched = self
            .filter_list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .any(|line| url.contains(line));

        if self.allowlist_mode { matched } else { !matched }
    }

    /// Validate value ranges after loading.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` naming the offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.attributes.is_empty() {
            return Err(Error::InvalidInput("attributes: must name at least one attribute".into()));
        }
        if !(0.0..=1.0).contains(&self.box_opacity) {
            return Err(Error::InvalidInput("box_opacity: must be between 0 and 1".into()));
        }
        if self.icons_scale <= 0.0 {
            return Err(Error::InvalidInput("icons_scale: must be positive".into()));
        }
        if self.ping_interval_ms < 100 {
            return Err(Error::InvalidInput("ping_interval_ms: must be at least 100ms".into()));
        }

        for (field, value) in [
            ("user_refresh_interval", self.user_refresh_interval),
            ("dlc_refresh_interval", self.dlc_refresh_interval),
            ("delisted_refresh_interval", self.delisted_refresh_interval),
            ("limited_refresh_interval", self.limited_refresh_interval),
            ("cards_refresh_interval", self.cards_refresh_interval),
            ("bundles_refresh_interval", self.bundles_refresh_interval),
        ] {
            if value == 0 {
                return Err(Error::InvalidInput(format!("{field}: must be at least one minute")));
            }
        }

        for (field, color) in [
            ("box_color", &self.box_color),
            ("owned_color", &self.owned_color),
            ("unowned_color", &self.unowned_color),
            ("wishlist_color", &self.wishlist_color),
            ("followed_color", &self.followed_color),
            ("ignored_color", &self.ignored_color),
            ("dlc_color", &self.dlc_color),
            ("delisted_color", &self.delisted_color),
            ("limited_color", &self.limited_color),
            ("card_color", &self.card_color),
            ("bundle_color", &self.bundle_color),
        ] {
            if parse_hex_color(color).is_none() {
                return Err(Error::InvalidInput(format!("{field}: '{color}' is not a #rrggbb color")));
            }
        }

        Ok(())
    }
}

/// Loads and persists [`Settings`] through the key-value store.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    store: KeyValueStore,
}

impl SettingsStore {
    pub fn new(store: KeyValueStore) -> Self {
        Self { store }
    }

    /// Load settings, merging whatever is stored over the defaults, and
    /// persist the merged result back.
    ///
    /// A stored object that fails to decode is logged and replaced by the
    /// defaults rather than failing the caller.
    pub async fn load(&self) -> Result<Settings, Error> {
        let stored: Option<serde_json::Value> = self.store.get(SETTINGS_KEY).await?;

        let settings = match stored {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored settings are unreadable, using defaults");
                Settings::default()
            }),
            None => Settings::default(),
        };

        self.store.set(SETTINGS_KEY, &settings).await?;
        Ok(settings)
    }

    /// Persist settings after validating them.
    pub async fn save(&self, settings: &Settings) -> Result<(), Error> {
        settings.validate()?;
        self.store.set(SETTINGS_KEY, settings).await
    }

    /// Replace one field by name with a JSON value, validate, persist.
    pub async fn set_field(&self, field: &str, value: serde_json::Value) -> Result<Settings, Error> {
        let serde_json::Value::Object(mut map) = serde_json::to_value(self.load().await?)? else {
            return Err(Error::Parse("settings did not serialize to an object".into()));
        };

        if !map.contains_key(field) {
            return Err(Error::InvalidInput(format!("unknown setting '{field}'")));
        }
        map.insert(field.to_string(), value);

        let settings: Settings = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| Error::InvalidInput(format!("{field}: {e}")))?;
        self.save(&settings).await?;
        Ok(settings)
    }

    /// Restore the defaults, discarding stored settings.
    pub async fn reset(&self) -> Result<Settings, Error> {
        let defaults = Settings::default();
        self.store.set(SETTINGS_KEY, &defaults).await?;
        Ok(defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_opacity() {
        let settings = Settings { box_opacity: 1.5, ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_color() {
        let settings = Settings { owned_color: "green".into(), ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let settings = Settings { dlc_refresh_interval: 0, ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff69b4"), Some([0xff, 0x69, 0xb4]));
        assert_eq!(parse_hex_color("008000"), Some([0x00, 0x80, 0x00]));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gggggg"), None);
    }

    #[test]
    fn test_denylist_and_allowlist() {
        let mut settings = Settings { filter_list: "example.com\n\nforum.test".into(), ..Default::default() };

        assert!(!settings.allows_url("https://example.com/page"));
        assert!(settings.allows_url("https://other.org/"));

        settings.allowlist_mode = true;
        assert!(settings.allows_url("https://example.com/page"));
        assert!(!settings.allows_url("https://other.org/"));
    }

    #[tokio::test]
    async fn test_load_fills_defaults_and_persists() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        store
            .set_raw(SETTINGS_KEY, r#"{"prefix": true, "legacy_field": 3}"#.to_string())
            .await
            .unwrap();

        let settings = SettingsStore::new(store.clone()).load().await.unwrap();
        assert!(settings.prefix);
        assert_eq!(settings.owned_color, "#008000");

        // merged result was persisted back, unknown field dropped
        let raw = store.get_raw(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(raw.contains("owned_color"));
        assert!(!raw.contains("legacy_field"));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        let settings_store = SettingsStore::new(store);

        let settings = Settings {
            prefix: true,
            box_opacity: 0.25,
            attributes: vec!["href".into()],
            filter_list: "example.com".into(),
            ..Default::default()
        };

        settings_store.save(&settings).await.unwrap();
        assert_eq!(settings_store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_set_field() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        let settings_store = SettingsStore::new(store);

        let updated = settings_store
            .set_field("wishlist_color", serde_json::json!("#123456"))
            .await
            .unwrap();
        assert_eq!(updated.wishlist_color, "#123456");

        assert!(settings_store.set_field("no_such_field", serde_json::json!(1)).await.is_err());
        assert!(
            settings_store
                .set_field("box_opacity", serde_json::json!(9.0))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unreadable_settings_fall_back_to_defaults() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        store
            .set_raw(SETTINGS_KEY, r#"{"dynamic_content": "sometimes"}"#.to_string())
            .await
            .unwrap();

        let settings = SettingsStore::new(store).load().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let store = KeyValueStore::open_in_memory().await.unwrap();
        let settings_store = SettingsStore::new(store);

        settings_store
            .set_field("prefix", serde_json::json!(true))
            .await
            .unwrap();
        let settings = settings_store.reset().await.unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings_store.load().await.unwrap(), Settings::default());
    }
}
