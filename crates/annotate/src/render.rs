//! Badge rendering.
//!
//! State-free: identity plus snapshot plus settings in, markup out. The
//! base status is exactly one of owned/wishlisted/unowned (owned wins
//! over wishlisted); every other badge is additive in a fixed order.
//! Each badge's tooltip carries the refresh instant of the dataset that
//! produced it, not a global timestamp.

use chrono::{DateTime, Utc};
use shelfmark_core::settings::parse_hex_color;
use shelfmark_core::{CatalogSnapshot, ItemId, PackageId, Settings};

use crate::dom::escape_attr;
use crate::extract::ExtractedId;

/// Class on every injected badge container.
pub const BLOCK_CLASS: &str = "shelfmark-block";

/// Modifier class when the box display mode is on.
pub const BOXED_CLASS: &str = "shelfmark-boxed";

/// Badge weights, summed into the fragment encoding.
const OWNED: u32 = 1;
const UNOWNED: u32 = 2;
const WISHLISTED: u32 = 3;
const FOLLOWED: u32 = 4;
const IGNORED: u32 = 5;
const DLC: u32 = 6;
const DELISTED: u32 = 7;
const LIMITED: u32 = 8;
const CARDS: u32 = 9;
const BUNDLES: u32 = 10;

/// Rendered markup for one matched element plus its badge-set encoding.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub html: String,
    pub encoding: u32,
}

fn plural(count: u32) -> &'static str {
    if count == 1 { "" } else { "s" }
}

fn strip_quotes(name: &str) -> String {
    name.replace(['"', '\''], "")
}

/// Format a dataset refresh instant for tooltips.
pub fn format_refreshed(refreshed: Option<DateTime<Utc>>, date_override: bool) -> String {
    match refreshed {
        None => "unknown".to_string(),
        Some(t) if date_override => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        Some(t) => t.format("%b %-d, %Y, %H:%M:%S").to_string(),
    }
}

/// The rgba() background derived from a badge-set encoding.
pub fn dynamic_color(encoding: u32, opacity: f64) -> String {
    let hex = format!("{:06x}", encoding * 305040);
    let [r, g, b] = parse_hex_color(&hex).expect("six hex digits");
    format!("rgba({r}, {g}, {b}, {opacity})")
}

fn attribution() -> String {
    format!("shelfmark ({})", env!("CARGO_PKG_VERSION"))
}

/// One badge: an icon span with color, tooltip, and optional detail link.
fn icon_html(color: &str, status: &str, refreshed: &str, icon: &str, link: Option<&str>) -> String {
    match link {
        Some(href) => {
            let tooltip = format!("{status}\n\nLast updated at {refreshed}\n{}", attribution());
            format!(
                "<span title=\"{}\"><a style=\"color: {color} !important;\" href=\"{}\" target=\"_blank\">{icon}</a></span>",
                escape_attr(&tooltip),
                escape_attr(href),
            )
        }
        None => {
            let tooltip = format!("{status} on Steam\n\nLast updated at {refreshed}\n{}", attribution());
            format!(
                "<span style=\"color: {color} !important;\" title=\"{}\">{icon}</span>",
                escape_attr(&tooltip),
            )
        }
    }
}

/// Render the badge set for an item.
pub fn render_item(id: ItemId, snapshot: &CatalogSnapshot, settings: &Settings) -> Fragment {
    let mut html = String::new();
    let mut encoding = 0;

    // Subject labeling: with no DLC data there is no telling games and
    // DLC apart, so the label hedges.
    let subject = match &snapshot.dlc {
        Some(map) if map.contains_key(&id) => "DLC",
        Some(_) => "Game",
        None => "Game or DLC",
    };

    let user_when = format_refreshed(snapshot.refreshed.user, settings.date_override);

    if snapshot.user.owned_items.contains(&id) {
        html += &icon_html(&settings.owned_color, &format!("{subject} ({id}) owned"), &user_when, &settings.owned_icon, None);
        encoding += OWNED;
    } else if snapshot.user.wishlist.contains(&id) {
        html += &icon_html(
            &settings.wishlist_color,
            &format!("{subject} ({id}) wishlisted"),
            &user_when,
            &settings.wishlist_icon,
            None,
        );
        encoding += WISHLISTED;
    } else {
        html += &icon_html(
            &settings.unowned_color,
            &format!("{subject} ({id}) not owned"),
            &user_when,
            &settings.unowned_icon,
            None,
        );
        encoding += UNOWNED;
    }

    if settings.want_followed && snapshot.user.followed.contains(&id) {
        html += &icon_html(
            &settings.followed_color,
            &format!("{subject} ({id}) followed"),
            &user_when,
            &settings.followed_icon,
            None,
        );
        encoding += FOLLOWED;
    }

    if settings.want_ignored && snapshot.user.ignored.contains(&id) {
        html += &icon_html(
            &settings.ignored_color,
            &format!("{subject} ({id}) ignored"),
            &user_when,
            &settings.ignored_icon,
            None,
        );
        encoding += IGNORED;
    }

    if settings.want_dlc
        && let Some(entry) = snapshot.dlc_entry(id)
    {
        let owns_base = entry
            .base_app_id
            .is_some_and(|base| snapshot.user.owned_items.contains(&ItemId(base)));
        let base_color = if owns_base { &settings.owned_color } else { &settings.unowned_color };
        let marker = if owns_base { "⁺" } else { "⁻" };
        let ownership = if owns_base { "" } else { "un" };
        let status = match entry.base_app_id {
            Some(base) => format!("{subject} ({id}) is downloadable content for an {ownership}owned base game ({base})"),
            None => format!("{subject} ({id}) is downloadable content for an unowned base game"),
        };
        let icon = format!("{}<span style=\"color: {base_color};\">{marker}</span>", settings.dlc_icon);
        html += &icon_html(
            &settings.dlc_color,
            &status,
            &format_refreshed(snapshot.refreshed.dlc, settings.date_override),
            &icon,
            None,
        );
        encoding += DLC;
    }

    if settings.want_delisted
        && let Some(entry) = snapshot.delisted_entry(id)
    {
        let status = format!(
            "The {} '{}' ({id}) is {} and has only {} confirmed owner{} on Steam",
            entry.kind,
            strip_quotes(&entry.name),
            entry.category.to_lowercase(),
            entry.count,
            plural(entry.count),
        );
        html += &icon_html(
            &settings.delisted_color,
            &status,
            &format_refreshed(snapshot.refreshed.delisted, settings.date_override),
            &settings.delisted_icon,
            Some(&format!("https://steam-tracker.com/app/{id}/")),
        );
        encoding += DELISTED;
    }

    if settings.want_limited && snapshot.is_limited(id) {
        html += &icon_html(
            &settings.limited_color,
            &format!("Game ({id}) has profile features limited"),
            &format_refreshed(snapshot.refreshed.limited, settings.date_override),
            &settings.limited_icon,
            None,
        );
        encoding += LIMITED;
    }

    if settings.want_cards
        && let Some(entry) = snapshot.card_entry(id)
        && entry.cards > 0
    {
        let marketable = if entry.marketable { "" } else { "un" };
        html += &icon_html(
            &settings.card_color,
            &format!("Game ({id}) has {} {marketable}marketable card{}", entry.cards, plural(entry.cards)),
            &format_refreshed(snapshot.refreshed.cards, settings.date_override),
            &settings.card_icon,
            Some(&format!("https://www.steamcardexchange.net/index.php?gamepage-appid-{id}")),
        );
        encoding += CARDS;
    }

    if settings.want_bundles
        && let Some(entry) = snapshot.bundle_entry(id.0)
        && entry.bundles > 0
    {
        html += &icon_html(
            &settings.bundle_color,
            &format!("Game ({id}) has been in {} bundle{}", entry.bundles, plural(entry.bundles)),
            &format_refreshed(snapshot.refreshed.bundles, settings.date_override),
            &settings.bundle_icon,
            Some(&format!("https://barter.vg/steam/app/{id}/#bundles")),
        );
        encoding += BUNDLES;
    }

    Fragment { html, encoding }
}

/// Render the reduced badge set for a package: ownership, plus the bundle
/// badge when enabled.
pub fn render_package(id: PackageId, snapshot: &CatalogSnapshot, settings: &Settings) -> Fragment {
    let mut html = String::new();
    let mut encoding = 0;

    let user_when = format_refreshed(snapshot.refreshed.user, settings.date_override);

    if snapshot.user.owned_packages.contains(&id) {
        html += &icon_html(&settings.owned_color, &format!("Package ({id}) owned"), &user_when, &settings.owned_icon, None);
        encoding += OWNED;
    } else {
        html += &icon_html(
            &settings.unowned_color,
            &format!("Package ({id}) not owned"),
            &user_when,
            &settings.unowned_icon,
            None,
        );
        encoding += UNOWNED;
    }

    if settings.want_bundles
        && let Some(entry) = snapshot.bundle_entry(id.0)
        && entry.bundles > 0
    {
        html += &icon_html(
            &settings.bundle_color,
            &format!("Package ({id}) has been in {} bundle{}", entry.bundles, plural(entry.bundles)),
            &format_refreshed(snapshot.refreshed.bundles, settings.date_override),
            &settings.bundle_icon,
            Some(&format!("https://barter.vg/steam/sub/{id}/#bundles")),
        );
        encoding += BUNDLES;
    }

    Fragment { html, encoding }
}

/// Wrap a fragment in its badge container.
pub fn box_html(fragment: &Fragment, target: ExtractedId, settings: &Settings) -> String {
    let mut classes = BLOCK_CLASS.to_string();
    if settings.boxed {
        classes.push(' ');
        classes.push_str(BOXED_CLASS);
    }

    let data = match target {
        ExtractedId::Item(id) => format!(" data-item-id=\"{id}\""),
        ExtractedId::Package(id) => format!(" data-package-id=\"{id}\""),
    };

    let style = if settings.box_dynamic_color {
        format!(" style=\"background: {} !important;\"", dynamic_color(fragment.encoding, settings.box_opacity))
    } else {
        String::new()
    };

    format!("<div class=\"{classes}\"{data}{style}>{}</div>", fragment.html)
}

/// The stylesheet injected once per page.
pub fn stylesheet(settings: &Settings) -> String {
    let [r, g, b] = parse_hex_color(&settings.box_color).unwrap_or([0, 0, 0]);
    let weight = if settings.icons_bold { "bold" } else { "normal" };
    format!(
        "\
.{BLOCK_CLASS} {{
    display: inline-block;
    line-height: initial;
    font-size: {scale}em;
    font-weight: {weight};
}}
.{BLOCK_CLASS}.{BOXED_CLASS} {{
    background: rgba({r}, {g}, {b}, {opacity});
    border-radius: 5px;
    margin: auto 4px auto 4px;
    padding: 2px 4px 2px 4px;
    position: relative;
}}
.{BLOCK_CLASS} > span {{
    cursor: help;
    margin: 2px;
}}
.{BLOCK_CLASS} > span > a {{
    cursor: help;
    text-decoration: none;
}}
",
        scale = settings.icons_scale,
        opacity = settings.box_opacity,
    )
}
