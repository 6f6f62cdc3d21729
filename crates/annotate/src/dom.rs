//! Mutable document arena for annotation passes.
//!
//! Parsing is delegated to `scraper` (html5ever under the hood); the
//! resulting read-only tree is converted into an index-based arena that
//! supports the few mutations annotation needs: class flags, attribute
//! edits, adjacent fragment insertion, and subtree removal. Serialization
//! back to HTML escapes text and attribute values, except inside raw-text
//! elements (style, script).

use scraper::Html;

/// Handle to one node in a [`Document`]. Ids stay valid for the life of
/// the document; removed nodes are detached, not reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum NodeData {
    /// Synthetic root.
    Document,
    Doctype(String),
    Comment(String),
    Text(String),
    Element { name: String, attrs: Vec<(String, String)> },
}

#[derive(Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An HTML document the scanner can mutate.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text children are written without entity escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

impl Document {
    fn new() -> Self {
        let root = Node { data: NodeData::Document, parent: None, children: Vec::new() };
        Self { nodes: vec![root], root: NodeId(0) }
    }

    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self::new();
        let root = doc.root;
        for child in parsed.tree.root().children() {
            doc.convert(child, root);
        }
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn convert(&mut self, node: ego_tree::NodeRef<'_, scraper::Node>, parent: NodeId) {
        let data = match node.value() {
            scraper::Node::Doctype(doctype) => NodeData::Doctype(doctype.name().to_string()),
            scraper::Node::Comment(comment) => {
                let text: &str = &comment;
                NodeData::Comment(text.to_string())
            }
            scraper::Node::Text(text) => {
                let text: &str = &text;
                NodeData::Text(text.to_string())
            }
            scraper::Node::Element(element) => NodeData::Element {
                name: element.name().to_string(),
                attrs: element.attrs().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            },
            // documents and fragments flatten into their children
            _ => {
                for child in node.children() {
                    self.convert(child, parent);
                }
                return;
            }
        };

        let id = self.push(data, parent);
        for child in node.children() {
            self.convert(child, id);
        }
    }

    fn push(&mut self, data: NodeData, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { data, parent: Some(parent), children: Vec::new() });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Parse an HTML fragment into detached nodes owned by this document.
    fn adopt_fragment(&mut self, html: &str) -> Vec<NodeId> {
        let parsed = Html::parse_fragment(html);
        // fragment parsing wraps content in a synthetic <html> element
        let holder = NodeId(self.nodes.len());
        self.nodes.push(Node { data: NodeData::Document, parent: None, children: Vec::new() });
        for child in parsed.root_element().children() {
            self.convert(child, holder);
        }
        let children = std::mem::take(&mut self.nodes[holder.0].children);
        for &child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// All element nodes reachable from the root, in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(self.root, &mut out);
        out
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if matches!(self.nodes[id.0].data, NodeData::Element { .. }) {
            out.push(id);
        }
        for &child in &self.nodes[id.0].children {
            self.collect_elements(child, out);
        }
    }

    /// First element with the given tag name, in document order.
    pub fn find_element(&self, name: &str) -> Option<NodeId> {
        self.elements().into_iter().find(|&id| self.tag_name(id) == Some(name))
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => {
                attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
            }
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            attrs.retain(|(k, _)| k != name);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let classes = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &classes);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(existing) = self.attr(id, "class") else { return };
        let remaining = existing
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        if remaining.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", &remaining);
        }
    }

    /// Set one property in the inline style attribute, preserving others.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let mut declarations: Vec<String> = self
            .attr(id, "style")
            .map(|style| {
                style
                    .split(';')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .filter(|d| d.split(':').next().map(str::trim) != Some(property))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        declarations.push(format!("{property}: {value}"));
        self.set_attr(id, "style", &declarations.join("; "));
    }

    /// Insert a parsed fragment immediately before `target`.
    pub fn insert_html_before(&mut self, target: NodeId, html: &str) -> Vec<NodeId> {
        self.insert_adjacent(target, html, 0)
    }

    /// Insert a parsed fragment immediately after `target`.
    pub fn insert_html_after(&mut self, target: NodeId, html: &str) -> Vec<NodeId> {
        self.insert_adjacent(target, html, 1)
    }

    fn insert_adjacent(&mut self, target: NodeId, html: &str, offset: usize) -> Vec<NodeId> {
        let Some(parent) = self.parent(target) else { return Vec::new() };
        let ids = self.adopt_fragment(html);
        let position = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == target)
            .expect("target is a child of its parent")
            + offset;
        for (i, &id) in ids.iter().enumerate() {
            self.nodes[id.0].parent = Some(parent);
            self.nodes[parent.0].children.insert(position + i, id);
        }
        ids
    }

    /// Append a parsed fragment as the last children of `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let ids = self.adopt_fragment(html);
        for &id in &ids {
            self.nodes[id.0].parent = Some(parent);
            self.nodes[parent.0].children.push(id);
        }
        ids
    }

    /// Detach a subtree. The ids stay allocated but unreachable.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Serialize the document back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for &child in &self.nodes[self.root.0].children {
            self.write_node(child, false, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Document => {
                for &child in &self.nodes[id.0].children {
                    self.write_node(child, raw_text, out);
                }
            }
            NodeData::Doctype(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            NodeData::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    return;
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&name.as_str());
                for &child in &self.nodes[id.0].children {
                    self.write_node(child, raw, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_query() {
        let doc = Document::parse(r#"<html><body><a href="https://example.com/app/440">Link</a></body></html>"#);
        let link = doc.find_element("a").unwrap();
        assert_eq!(doc.attr(link, "href"), Some("https://example.com/app/440"));
        assert_eq!(doc.tag_name(link), Some("a"));
    }

    #[test]
    fn test_class_helpers() {
        let mut doc = Document::parse(r#"<div class="one"></div>"#);
        let div = doc.find_element("div").unwrap();

        assert!(doc.has_class(div, "one"));
        doc.add_class(div, "two");
        doc.add_class(div, "two"); // no duplicate
        assert_eq!(doc.attr(div, "class"), Some("one two"));

        doc.remove_class(div, "one");
        assert_eq!(doc.attr(div, "class"), Some("two"));
        doc.remove_class(div, "two");
        assert_eq!(doc.attr(div, "class"), None);
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut doc = Document::parse("<body><span>target</span></body>");
        let span = doc.find_element("span").unwrap();

        doc.insert_html_before(span, "<i>pre</i>");
        doc.insert_html_after(span, "<b>post</b>");

        let html = doc.to_html();
        let i = html.find("<i>pre</i>").unwrap();
        let s = html.find("<span>target</span>").unwrap();
        let b = html.find("<b>post</b>").unwrap();
        assert!(i < s && s < b, "unexpected order in {html}");
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut doc = Document::parse("<body><div><span>inner</span></div><p>keep</p></body>");
        let div = doc.find_element("div").unwrap();

        doc.remove(div);

        let html = doc.to_html();
        assert!(!html.contains("inner"));
        assert!(html.contains("keep"));
    }

    #[test]
    fn test_serialize_escapes() {
        let mut doc = Document::parse("<body><p></p></body>");
        let p = doc.find_element("p").unwrap();
        doc.set_attr(p, "title", r#"a "quoted" <value>"#);

        let html = doc.to_html();
        assert!(html.contains("title=\"a &quot;quoted&quot; &lt;value&gt;\""));
    }

    #[test]
    fn test_raw_text_elements_not_escaped() {
        let doc = Document::parse("<head><style>.a > .b { color: red; }</style></head>");
        let html = doc.to_html();
        assert!(html.contains(".a > .b { color: red; }"));
    }

    #[test]
    fn test_void_elements() {
        let doc = Document::parse(r#"<body><img src="x.png"><br></body>"#);
        let html = doc.to_html();
        assert!(html.contains(r#"<img src="x.png">"#));
        assert!(!html.contains("</img>"));
        assert!(!html.contains("</br>"));
    }

    #[test]
    fn test_set_style_property() {
        let mut doc = Document::parse(r#"<div style="color: red; overflow: hidden"></div>"#);
        let div = doc.find_element("div").unwrap();

        doc.set_style_property(div, "overflow", "visible");

        let style = doc.attr(div, "style").unwrap();
        assert!(style.contains("color: red"));
        assert!(style.contains("overflow: visible"));
        assert!(!style.contains("hidden"));
    }

    #[test]
    fn test_append_html() {
        let mut doc = Document::parse("<html><head></head><body></body></html>");
        let head = doc.find_element("head").unwrap();

        doc.append_html(head, "<style>.x{}</style>");

        assert!(doc.to_html().contains("<head><style>.x{}</style></head>"));
    }
}
