//! Identifier extraction from matched elements.
//!
//! Two mutually exclusive path patterns, evaluated over the attribute
//! priority list: the first attribute whose value carries a pattern wins.
//! Anything that fails to yield a valid id is a silent skip, never an
//! error; an element the page author mangled is just not annotated.

use std::sync::LazyLock;

use regex::Regex;
use shelfmark_core::{ItemId, PackageId};

use crate::dom::{Document, NodeId};

/// Item references: `/app/440`, `/apps/440`, `/a/440`.
static ITEM_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/a(?:pps?)?/([0-9]+)").unwrap());

/// Package references: `sub/469`.
static PACKAGE_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"sub/([0-9]+)").unwrap());

/// A typed identifier extracted from a DOM element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractedId {
    Item(ItemId),
    Package(PackageId),
}

fn capture_id(pattern: &Regex, value: &str) -> Option<u32> {
    pattern.captures(value).and_then(|caps| caps[1].parse().ok())
}

/// Extract an item id from the first matching attribute.
pub fn extract_item(doc: &Document, node: NodeId, attributes: &[String]) -> Option<ItemId> {
    attributes
        .iter()
        .find_map(|attr| capture_id(&ITEM_PATH, doc.attr(node, attr)?))
        .map(ItemId)
}

/// Extract a package id from the first matching attribute.
pub fn extract_package(doc: &Document, node: NodeId, attributes: &[String]) -> Option<PackageId> {
    attributes
        .iter()
        .find_map(|attr| capture_id(&PACKAGE_PATH, doc.attr(node, attr)?))
        .map(PackageId)
}

/// Extract either kind of identifier. The patterns cannot both match one
/// attribute value, so item-before-package ordering is not a precedence
/// choice.
pub fn extract(doc: &Document, node: NodeId, attributes: &[String]) -> Option<ExtractedId> {
    extract_item(doc, node, attributes)
        .map(ExtractedId::Item)
        .or_else(|| extract_package(doc, node, attributes).map(ExtractedId::Package))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Vec<String> {
        vec!["href".into(), "src".into(), "style".into()]
    }

    fn single(html: &str) -> (Document, NodeId) {
        let doc = Document::parse(html);
        let id = doc
            .elements()
            .into_iter()
            .rfind(|&id| doc.tag_name(id) != Some("html") && doc.tag_name(id) != Some("body"))
            .unwrap();
        (doc, id)
    }

    #[test]
    fn test_extract_store_link() {
        let (doc, node) = single(r#"<body><a href="https://store.steampowered.com/app/440/Team_Fortress_2/">x</a></body>"#);
        assert_eq!(extract_item(&doc, node, &attrs()), Some(ItemId(440)));
    }

    #[test]
    fn test_extract_short_link() {
        let (doc, node) = single(r#"<body><a href="https://s.team/a/440/">x</a></body>"#);
        assert_eq!(extract_item(&doc, node, &attrs()), Some(ItemId(440)));
    }

    #[test]
    fn test_extract_cdn_image() {
        let (doc, node) =
            single(r#"<body><img src="https://steamcdn-a.akamaihd.net/steam/apps/570/header.jpg"></body>"#);
        assert_eq!(extract_item(&doc, node, &attrs()), Some(ItemId(570)));
    }

    #[test]
    fn test_extract_inline_style() {
        let (doc, node) = single(concat!(
            r#"<body><div style="background: url(https://cdn.cloudflare.steamstatic.com/steam/apps/730/bg.jpg)">"#,
            "</div></body>",
        ));
        assert_eq!(extract_item(&doc, node, &attrs()), Some(ItemId(730)));
    }

    #[test]
    fn test_extract_stops_at_path_separator() {
        let (doc, node) = single(r#"<body><a href="https://steamdb.info/app/440/patchnotes/?since=1">x</a></body>"#);
        assert_eq!(extract_item(&doc, node, &attrs()), Some(ItemId(440)));
    }

    #[test]
    fn test_extract_package() {
        let (doc, node) = single(r#"<body><a href="https://store.steampowered.com/sub/469/">x</a></body>"#);
        assert_eq!(extract_package(&doc, node, &attrs()), Some(PackageId(469)));
        assert_eq!(extract_item(&doc, node, &attrs()), None);
    }

    #[test]
    fn test_extract_miss_on_unrelated_link() {
        let (doc, node) = single(r#"<body><a href="https://example.com/about/">x</a></body>"#);
        assert_eq!(extract(&doc, node, &attrs()), None);
    }

    #[test]
    fn test_extract_miss_on_missing_attribute() {
        let (doc, node) = single("<body><a>x</a></body>");
        assert_eq!(extract(&doc, node, &attrs()), None);
    }

    #[test]
    fn test_extract_miss_on_overflowing_id() {
        let (doc, node) = single(r#"<body><a href="https://store.steampowered.com/app/99999999999999999999/">x</a></body>"#);
        assert_eq!(extract(&doc, node, &attrs()), None);
    }

    #[test]
    fn test_attribute_priority_order() {
        // href wins over src when both carry ids
        let (doc, node) = single(concat!(
            r#"<body><img href="https://store.steampowered.com/app/10/" "#,
            r#"src="https://steamcdn-a.akamaihd.net/steam/apps/20/header.jpg"></body>"#,
        ));
        assert_eq!(extract_item(&doc, node, &attrs()), Some(ItemId(10)));

        let reversed = vec!["src".to_string(), "href".to_string()];
        assert_eq!(extract_item(&doc, node, &reversed), Some(ItemId(20)));
    }

    #[test]
    fn test_extracted_kind() {
        let (doc, node) = single(r#"<body><a href="https://steamdb.info/sub/1234/">x</a></body>"#);
        assert_eq!(extract(&doc, node, &attrs()), Some(ExtractedId::Package(PackageId(1234))));
    }
}
