//! Attribute-substring matchers for catalog references.
//!
//! The store, the community site, short links, third-party trackers, and
//! a fleet of CDN mirrors all spell item references differently; each
//! spelling is one independent matcher and the first match wins. Matchers
//! are filtered by the attribute-priority setting so disabling an
//! attribute disables every spelling that relies on it.

use crate::dom::{Document, NodeId};

/// Hosts that link to an item page (matched against `href`).
const ITEM_LINK_HOSTS: &[&str] = &[
    "steamcommunity.com/app/",
    "steamdb.info/app/",
    "store.steampowered.com/agecheck/app/",
    "store.steampowered.com/app/",
    "s.team/a/",
];

/// CDN paths serving item artwork (matched against `style` and `img src`).
const ITEM_IMAGE_HOSTS: &[&str] = &[
    "cdn.akamai.steamstatic.com/steam/apps/",
    "cdn.edgecast.steamstatic.com/steam/apps/",
    "steamcdn-a.akamaihd.net/steam/apps/",
    "steamcdn-a.akamaihd.net/steamcommunity/public/images/apps/",
    "cdn.cloudflare.steamstatic.com/steam/apps/",
    "cdn.cloudflare.steamstatic.com/steamcommunity/public/images/apps/",
    "steamcdn-a.opskins.media/steam/apps/",
    "steamcdn-a.opskins.media/steamcommunity/public/images/apps/",
    "steamdb.info/static/camo/apps/",
];

/// Hosts that link to a package page.
const PACKAGE_LINK_HOSTS: &[&str] = &["steamdb.info/sub/", "store.steampowered.com/sub/"];

/// One `[attr*="substring"]`-style matcher, optionally tag-qualified.
#[derive(Debug, Clone)]
pub struct AttrMatcher {
    pub tag: Option<&'static str>,
    pub attr: &'static str,
    pub contains: &'static str,
}

impl AttrMatcher {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if let Some(tag) = self.tag
            && doc.tag_name(id) != Some(tag)
        {
            return false;
        }
        doc.attr(id, self.attr).is_some_and(|value| value.contains(self.contains))
    }
}

/// A set of matchers plus the processed-marker class to skip.
#[derive(Debug, Clone)]
pub struct MatcherSet {
    matchers: Vec<AttrMatcher>,
    skip_class: &'static str,
}

impl MatcherSet {
    pub fn new(matchers: Vec<AttrMatcher>, skip_class: &'static str) -> Self {
        Self { matchers, skip_class }
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        !doc.has_class(id, self.skip_class) && self.matchers.iter().any(|m| m.matches(doc, id))
    }

    /// All unprocessed matching elements, in document order.
    pub fn select(&self, doc: &Document) -> Vec<NodeId> {
        doc.elements().into_iter().filter(|&id| self.matches(doc, id)).collect()
    }
}

/// Item-reference matchers for the enabled attributes.
pub fn item_matchers(attributes: &[String]) -> Vec<AttrMatcher> {
    let mut matchers = Vec::new();
    for attribute in attributes {
        match attribute.as_str() {
            "href" => {
                matchers.extend(
                    ITEM_LINK_HOSTS
                        .iter()
                        .map(|&host| AttrMatcher { tag: None, attr: "href", contains: host }),
                );
            }
            "style" => {
                matchers.extend(
                    ITEM_IMAGE_HOSTS
                        .iter()
                        .map(|&host| AttrMatcher { tag: None, attr: "style", contains: host }),
                );
            }
            "src" => {
                matchers.extend(
                    ITEM_IMAGE_HOSTS
                        .iter()
                        .map(|&host| AttrMatcher { tag: Some("img"), attr: "src", contains: host }),
                );
            }
            other => {
                tracing::debug!(attribute = other, "no item matchers for attribute");
            }
        }
    }
    matchers
}

/// Package-reference matchers. Packages are only ever linked, never
/// referenced through artwork, so the attribute list does not apply.
pub fn package_matchers() -> Vec<AttrMatcher> {
    PACKAGE_LINK_HOSTS
        .iter()
        .map(|&host| AttrMatcher { tag: None, attr: "href", contains: host })
        .collect()
}
