//! The scan pass: find unprocessed matches, mark them, annotate them.
//!
//! Marking happens for every matched element before any badge is built,
//! so a re-entrant pass (a fast mutation re-trigger, say) can never
//! double-process a node; badge construction order across elements
//! carries no guarantee and needs none. An element that yields no
//! identifier stays marked and simply gets no badge; one broken element
//! never aborts the pass.

use shelfmark_core::{CatalogSnapshot, Settings};

use crate::dom::{Document, NodeId};
use crate::extract::{self, ExtractedId};
use crate::render;
use crate::selector::{MatcherSet, item_matchers, package_matchers};

/// Class marking an element as processed. Only `clear` removes it.
pub const PROCESSED_CLASS: &str = "shelfmark";

/// Id of the injected stylesheet element.
pub const STYLE_ID: &str = "shelfmark-style";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Elements that received a badge box.
    pub annotated: usize,
    /// Matched elements skipped for want of an identifier.
    pub skipped: usize,
}

/// Scans a document and injects badge fragments next to matches.
pub struct DomScanner {
    settings: Settings,
    items: MatcherSet,
    packages: MatcherSet,
}

impl DomScanner {
    pub fn new(settings: Settings) -> Self {
        let items = MatcherSet::new(item_matchers(&settings.attributes), PROCESSED_CLASS);
        let packages = MatcherSet::new(package_matchers(), PROCESSED_CLASS);
        Self { settings, items, packages }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one scan pass. Safe to call repeatedly; already-processed
    /// elements are never touched again.
    pub fn scan(&self, doc: &mut Document, snapshot: &CatalogSnapshot) -> ScanOutcome {
        self.ensure_stylesheet(doc);

        let item_nodes = self.items.select(doc);
        let package_nodes = self.packages.select(doc);

        for &node in item_nodes.iter().chain(package_nodes.iter()) {
            doc.add_class(node, PROCESSED_CLASS);
        }

        let mut outcome = ScanOutcome::default();

        for node in item_nodes {
            match extract::extract_item(doc, node, &self.settings.attributes) {
                Some(id) => {
                    let fragment = render::render_item(id, snapshot, &self.settings);
                    self.inject(doc, node, &fragment, ExtractedId::Item(id));
                    outcome.annotated += 1;
                }
                None => outcome.skipped += 1,
            }
        }

        for node in package_nodes {
            match extract::extract_package(doc, node, &self.settings.attributes) {
                Some(id) => {
                    let fragment = render::render_package(id, snapshot, &self.settings);
                    self.inject(doc, node, &fragment, ExtractedId::Package(id));
                    outcome.annotated += 1;
                }
                None => outcome.skipped += 1,
            }
        }

        tracing::debug!(annotated = outcome.annotated, skipped = outcome.skipped, "scan pass complete");
        outcome
    }

    fn inject(&self, doc: &mut Document, node: NodeId, fragment: &render::Fragment, target: ExtractedId) {
        let html = render::box_html(fragment, target, &self.settings);
        if self.settings.prefix {
            doc.insert_html_before(node, &html);
        } else {
            doc.insert_html_after(node, &html);
        }
        // badge boxes overflow tight containers otherwise
        if let Some(parent) = doc.parent(node) {
            doc.set_style_property(parent, "overflow", "visible");
        }
    }

    fn ensure_stylesheet(&self, doc: &mut Document) {
        let present = doc
            .elements()
            .into_iter()
            .any(|id| doc.tag_name(id) == Some("style") && doc.attr(id, "id") == Some(STYLE_ID));
        if present {
            return;
        }
        if let Some(head) = doc.find_element("head") {
            let css = render::stylesheet(&self.settings);
            doc.append_html(head, &format!("<style id=\"{STYLE_ID}\">{css}</style>"));
        }
    }

    /// Strip every injected fragment and processed flag, returning the
    /// document to its pre-annotation state. Returns the number of
    /// removed badge boxes.
    pub fn clear(&self, doc: &mut Document) -> usize {
        let mut removed = 0;
        for id in doc.elements() {
            if doc.has_class(id, render::BLOCK_CLASS) {
                doc.remove(id);
                removed += 1;
            } else if doc.has_class(id, PROCESSED_CLASS) {
                doc.remove_class(id, PROCESSED_CLASS);
            } else if doc.tag_name(id) == Some("style") && doc.attr(id, "id") == Some(STYLE_ID) {
                doc.remove(id);
            }
        }
        tracing::debug!(removed, "cleared annotations");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shelfmark_core::ItemId;

    fn snapshot() -> CatalogSnapshot {
        let mut snapshot = CatalogSnapshot::default();
        snapshot.user.owned_items.insert(ItemId(440));
        snapshot.refreshed.user = Some(Utc::now());
        snapshot
    }

    fn page() -> Document {
        Document::parse(concat!(
            "<html><head><title>t</title></head><body>",
            r#"<p><a href="https://store.steampowered.com/app/440/">TF2</a></p>"#,
            r#"<p><a href="https://store.steampowered.com/app/570/">Dota</a></p>"#,
            r#"<p><a href="https://steamdb.info/sub/469/">Pack</a></p>"#,
            r#"<p><a href="https://example.com/unrelated">other</a></p>"#,
            "</body></html>",
        ))
    }

    fn count_blocks(html: &str) -> usize {
        html.matches(render::BLOCK_CLASS).count() - html.matches(STYLE_ID).count() * 4
    }

    #[test]
    fn test_scan_annotates_matches() {
        let scanner = DomScanner::new(Settings::default());
        let mut doc = page();

        let outcome = scanner.scan(&mut doc, &snapshot());
        assert_eq!(outcome.annotated, 3);
        assert_eq!(outcome.skipped, 0);

        let html = doc.to_html();
        assert!(html.contains("data-item-id=\"440\""));
        assert!(html.contains("data-item-id=\"570\""));
        assert!(html.contains("data-package-id=\"469\""));
    }

    #[test]
    fn test_scan_is_idempotent() {
        let scanner = DomScanner::new(Settings::default());
        let mut doc = page();

        scanner.scan(&mut doc, &snapshot());
        let first = doc.to_html();

        let second_outcome = scanner.scan(&mut doc, &snapshot());
        assert_eq!(second_outcome, ScanOutcome::default());
        assert_eq!(doc.to_html(), first);
    }

    #[test]
    fn test_extraction_miss_is_marked_and_skipped() {
        let scanner = DomScanner::new(Settings::default());
        let mut doc = Document::parse(concat!(
            "<html><head></head><body>",
            r#"<a href="https://store.steampowered.com/app/oops/">broken</a>"#,
            r#"<a href="https://store.steampowered.com/app/440/">fine</a>"#,
            "</body></html>",
        ));

        let outcome = scanner.scan(&mut doc, &snapshot());
        assert_eq!(outcome.annotated, 1);
        assert_eq!(outcome.skipped, 1);

        // the broken element was still marked; rescans leave it alone
        let outcome = scanner.scan(&mut doc, &snapshot());
        assert_eq!(outcome, ScanOutcome::default());
    }

    #[test]
    fn test_prefix_places_box_before_element() {
        let snapshot = snapshot();
        let html = r#"<html><head></head><body><a href="https://store.steampowered.com/app/440/">x</a></body></html>"#;

        let mut doc = Document::parse(html);
        DomScanner::new(Settings::default()).scan(&mut doc, &snapshot);
        let suffixed = doc.to_html();
        assert!(suffixed.find("</a>").unwrap() < suffixed.find("data-item-id").unwrap());

        let mut doc = Document::parse(html);
        DomScanner::new(Settings { prefix: true, ..Default::default() }).scan(&mut doc, &snapshot);
        let prefixed = doc.to_html();
        assert!(prefixed.find("data-item-id").unwrap() < prefixed.find("</a>").unwrap());
    }

    #[test]
    fn test_stylesheet_injected_once() {
        let scanner = DomScanner::new(Settings::default());
        let mut doc = page();

        scanner.scan(&mut doc, &snapshot());
        scanner.scan(&mut doc, &snapshot());

        assert_eq!(doc.to_html().matches(STYLE_ID).count(), 1);
    }

    #[test]
    fn test_page_without_head_gets_no_stylesheet() {
        let scanner = DomScanner::new(Settings::default());
        let mut doc = Document::parse(r#"<a href="https://store.steampowered.com/app/440/">x</a>"#);

        let outcome = scanner.scan(&mut doc, &snapshot());
        assert_eq!(outcome.annotated, 1);
    }

    #[test]
    fn test_clear_restores_and_rerun_reannotates() {
        let scanner = DomScanner::new(Settings::default());
        let mut doc = page();

        let first = scanner.scan(&mut doc, &snapshot());
        assert_eq!(scanner.clear(&mut doc), first.annotated);

        let html = doc.to_html();
        assert!(!html.contains(render::BLOCK_CLASS));
        assert!(!html.contains(STYLE_ID));
        assert!(!html.contains(&format!("class=\"{PROCESSED_CLASS}\"")));

        let rerun = scanner.scan(&mut doc, &snapshot());
        assert_eq!(rerun.annotated, first.annotated);
    }

    #[test]
    fn test_scan_outcome_counts() {
        let scanner = DomScanner::new(Settings::default());
        let mut doc = page();
        let outcome = scanner.scan(&mut doc, &snapshot());
        let html = doc.to_html();
        assert_eq!(count_blocks(&html), outcome.annotated);
    }
}
