//! Document tree capability and an in-memory XHTML tree implementing it.
//!
//! The segmenter and range code only need to walk a tree: children,
//! siblings, parents, tag names and text. [`DocumentTree`] is that surface.
//! [`Document`] is an arena-backed implementation built from XHTML with
//! `quick-xml`, with the mutation helpers the post-processors use.

use core::fmt;

use quick_xml::escape::{partial_escape, resolve_html5_entity, resolve_predefined_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::css::{parse_inline_style, DeclarationBlock};
use crate::error::{EngineError, ErrorPhase};

/// Coarse node classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    /// Document root, comments, doctype.
    Other,
}

/// Read-only traversal surface over a document.
pub trait DocumentTree {
    /// Node handle.
    type Node: Copy + Eq + fmt::Debug;

    /// Tree root (the document node).
    fn root(&self) -> Self::Node;
    /// The `<body>` element, or the root when there is none.
    fn body(&self) -> Self::Node;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn first_child(&self, node: Self::Node) -> Option<Self::Node>;
    fn last_child(&self, node: Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node>;
    fn previous_sibling(&self, node: Self::Node) -> Option<Self::Node>;
    fn kind(&self, node: Self::Node) -> NodeKind;
    /// Lowercased local name for elements.
    fn tag_name(&self, node: Self::Node) -> Option<&str>;
    /// Character data for text nodes.
    fn text(&self, node: Self::Node) -> Option<&str>;

    fn child_count(&self, node: Self::Node) -> usize {
        let mut count = 0usize;
        let mut child = self.first_child(node);
        while let Some(current) = child {
            count += 1;
            child = self.next_sibling(current);
        }
        count
    }

    /// Position among the parent's children.
    fn index_in_parent(&self, node: Self::Node) -> usize {
        let mut idx = 0usize;
        let mut sibling = self.previous_sibling(node);
        while let Some(current) = sibling {
            idx += 1;
            sibling = self.previous_sibling(current);
        }
        idx
    }

    /// Boundary length: characters for text, children otherwise.
    fn node_length(&self, node: Self::Node) -> usize {
        match self.kind(node) {
            NodeKind::Text => self.text(node).map_or(0, |text| text.chars().count()),
            _ => self.child_count(node),
        }
    }

    /// Nth child.
    fn child_at(&self, node: Self::Node, index: usize) -> Option<Self::Node> {
        let mut child = self.first_child(node);
        for _ in 0..index {
            child = self.next_sibling(child?);
        }
        child
    }
}

/// Pre-order successor of `node`.
pub fn next_in_order<T: DocumentTree + ?Sized>(tree: &T, node: T::Node) -> Option<T::Node> {
    tree.first_child(node)
        .or_else(|| next_skipping_children(tree, node))
}

/// Pre-order successor of `node` that is not one of its descendants.
pub fn next_skipping_children<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
) -> Option<T::Node> {
    let mut current = node;
    loop {
        if let Some(sibling) = tree.next_sibling(current) {
            return Some(sibling);
        }
        current = tree.parent(current)?;
    }
}

/// Whether `ancestor` is `node` or one of its ancestors.
pub fn is_inclusive_ancestor<T: DocumentTree + ?Sized>(
    tree: &T,
    ancestor: T::Node,
    node: T::Node,
) -> bool {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if candidate == ancestor {
            return true;
        }
        current = tree.parent(candidate);
    }
    false
}

/// Whether `node` hangs off the tree root.
pub fn is_attached<T: DocumentTree + ?Sized>(tree: &T, node: T::Node) -> bool {
    is_inclusive_ancestor(tree, tree.root(), node)
}

/// Concatenated text of `node` and its descendants.
pub fn text_content<T: DocumentTree + ?Sized>(tree: &T, node: T::Node) -> String {
    let mut out = String::new();
    let mut current = Some(node);
    while let Some(visit) = current {
        if let Some(text) = tree.text(visit) {
            out.push_str(text);
        }
        current = next_in_order(tree, visit).filter(|next| is_inclusive_ancestor(tree, node, *next));
    }
    out
}

/// Elements that never have content.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Arena index of a [`Document`] node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Clone, Debug, PartialEq, Eq)]
enum NodeData {
    Document,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
    Doctype(String),
}

#[derive(Clone, Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// Arena-backed mutable document.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    /// Parse XHTML, keeping whatever was built before a tokenizer error.
    ///
    /// Mismatched end tags close back to the nearest matching open element
    /// or are ignored; HTML void elements never take children.
    pub fn parse(xhtml: &str) -> Self {
        match build_document(xhtml, false) {
            Ok(doc) => doc,
            Err(err) => {
                log::warn!("{}", err);
                Self::new()
            }
        }
    }

    /// Parse XHTML, failing on the first tokenizer error.
    pub fn try_parse(xhtml: &str) -> Result<Self, EngineError> {
        build_document(xhtml, true)
    }

    /// Serialize the tree back to XHTML text.
    pub fn to_xhtml(&self) -> String {
        let mut out = String::with_capacity(self.nodes.len() * 16);
        let root = self.root();
        let mut current = self.first_child(root);
        while let Some(node) = current {
            self.write_open(&mut out, node);
            if let Some(child) = self.first_child(node) {
                current = Some(child);
                continue;
            }
            self.write_close(&mut out, node);
            let mut climb = node;
            current = loop {
                if let Some(sibling) = self.next_sibling(climb) {
                    break Some(sibling);
                }
                match self.parent(climb) {
                    Some(parent) if parent != root => {
                        self.write_close(&mut out, parent);
                        climb = parent;
                    }
                    _ => break None,
                }
            };
        }
        out
    }

    fn write_open(&self, out: &mut String, node: NodeId) {
        match &self.nodes[node.0].data {
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                if self.first_child(node).is_none() && is_void(name) {
                    out.push_str("/>");
                } else {
                    out.push('>');
                }
            }
            NodeData::Text(text) => out.push_str(&partial_escape(text.as_str())),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Doctype(text) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(text.trim());
                out.push('>');
            }
            NodeData::Document => {}
        }
    }

    fn write_close(&self, out: &mut String, node: NodeId) {
        if let NodeData::Element { name, .. } = &self.nodes[node.0].data {
            if self.first_child(node).is_none() && is_void(name) {
                return;
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }

    /// `<html>` element, when present.
    pub fn document_element(&self) -> Option<NodeId> {
        let mut child = self.first_child(self.root());
        while let Some(node) = child {
            if self.kind(node) == NodeKind::Element {
                return Some(node);
            }
            child = self.next_sibling(node);
        }
        None
    }

    /// First `<head>` element, when present.
    pub fn head(&self) -> Option<NodeId> {
        self.first_by_tag("head")
    }

    fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        let mut current = Some(self.root());
        while let Some(node) = current {
            if self.tag_name(node) == Some(tag) {
                return Some(node);
            }
            current = next_in_order(self, node);
        }
        None
    }

    /// Attached elements named `tag`, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut current = Some(self.root());
        while let Some(node) = current {
            if self.tag_name(node) == Some(tag) {
                found.push(node);
            }
            current = next_in_order(self, node);
        }
        found
    }

    /// First attached element whose `id` is `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut current = Some(self.root());
        while let Some(node) = current {
            if self.attribute(node, "id") == Some(id) {
                return Some(node);
            }
            current = next_in_order(self, node);
        }
        None
    }

    /// Direct children of `node`.
    pub fn children(&self, node: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(node),
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(NodeData::Element { attrs, .. }) = self.data_mut(node) {
            match attrs.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
                Some(slot) => slot.1 = value,
                None => attrs.push((name.to_ascii_lowercase(), value)),
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(NodeData::Element { attrs, .. }) = self.data_mut(node) {
            attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// Add `class` unless already present.
    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.kind(node) != NodeKind::Element || self.has_class(node, class) {
            return;
        }
        let joined = match self.attribute(node, "class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", joined);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(existing) = self.attribute(node, "class") else {
            return;
        };
        if !existing.split_ascii_whitespace().any(|c| c == class) {
            return;
        }
        let kept: Vec<&str> = existing
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect();
        let joined = kept.join(" ");
        if joined.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", joined);
        }
    }

    /// Parsed inline `style` attribute.
    pub fn inline_style(&self, node: NodeId) -> DeclarationBlock {
        self.attribute(node, "style")
            .map(parse_inline_style)
            .unwrap_or_default()
    }

    /// Set one inline style property, replacing earlier declarations of it.
    pub fn set_style_property(&mut self, node: NodeId, name: &str, value: &str, important: bool) {
        if self.kind(node) != NodeKind::Element {
            return;
        }
        let mut decls = self.inline_style(node);
        decls.set(name, value, important);
        self.set_attribute(node, "style", decls.to_inline_css());
    }

    /// New detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push_node(NodeData::Element {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    /// New detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    /// Replace the character data of a text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(NodeData::Text(data)) = self.data_mut(node) {
            data.clear();
            data.push_str(text);
        }
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    ///
    /// Appending an ancestor of `parent` would create a cycle and is ignored.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent.0 >= self.nodes.len()
            || child.0 >= self.nodes.len()
            || is_inclusive_ancestor(self, child, parent)
        {
            return;
        }
        self.detach(child);
        let prev = self.nodes[parent.0].last_child;
        {
            let node = &mut self.nodes[child.0];
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = None;
        }
        match prev {
            Some(prev) => self.nodes[prev.0].next_sibling = Some(child),
            None => self.nodes[parent.0].first_child = Some(child),
        }
        self.nodes[parent.0].last_child = Some(child);
    }

    /// Insert `child` before `reference` under `parent`; `None` appends.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let Some(reference) = reference else {
            self.append_child(parent, child);
            return;
        };
        if parent.0 >= self.nodes.len()
            || child.0 >= self.nodes.len()
            || child == reference
            || self.parent(reference) != Some(parent)
            || is_inclusive_ancestor(self, child, parent)
        {
            return;
        }
        self.detach(child);
        let prev = self.nodes[reference.0].prev_sibling;
        {
            let node = &mut self.nodes[child.0];
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = Some(reference);
        }
        self.nodes[reference.0].prev_sibling = Some(child);
        match prev {
            Some(prev) => self.nodes[prev.0].next_sibling = Some(child),
            None => self.nodes[parent.0].first_child = Some(child),
        }
    }

    /// Unlink `node` from its parent. The node and its subtree stay valid
    /// but detached.
    pub fn detach(&mut self, node: NodeId) {
        let Some(current) = self.nodes.get(node.0) else {
            return;
        };
        let (parent, prev, next) = (current.parent, current.prev_sibling, current.next_sibling);
        let Some(parent) = parent else {
            return;
        };
        match prev {
            Some(prev) => self.nodes[prev.0].next_sibling = next,
            None => self.nodes[parent.0].first_child = next,
        }
        match next {
            Some(next) => self.nodes[next.0].prev_sibling = prev,
            None => self.nodes[parent.0].last_child = prev,
        }
        let current = &mut self.nodes[node.0];
        current.parent = None;
        current.prev_sibling = None;
        current.next_sibling = None;
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node::new(data));
        NodeId(self.nodes.len() - 1)
    }

    fn data_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.0).map(|n| &mut n.data)
    }

    /// Append text to `parent`, merging with a trailing text child.
    fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.nodes[parent.0].last_child {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return;
            }
        }
        let node = self.create_text(text);
        self.append_child(parent, node);
    }
}

impl DocumentTree for Document {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn body(&self) -> NodeId {
        self.first_by_tag("body").unwrap_or(NodeId(0))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.first_child
    }

    fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.last_child
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.next_sibling
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.prev_sibling
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        match self.nodes.get(node.0).map(|n| &n.data) {
            Some(NodeData::Element { .. }) => NodeKind::Element,
            Some(NodeData::Text(_)) => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Iterator over a node's direct children.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn reader_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn dom_error(reader: &Reader<&[u8]>, message: String) -> EngineError {
    EngineError::new(ErrorPhase::Dom, "DOM_TOKENIZE_ERROR", message)
        .with_source("xhtml tokenizer")
        .with_offset(reader_offset(reader))
}

fn local_name(raw: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(raw);
    let local = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    local.to_ascii_lowercase()
}

fn resolve_entity(name: &str) -> Option<String> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name)
        .or_else(|| resolve_html5_entity(name))
        .map(str::to_string)
}

/// Resolve `&name;` references, leaving unknown ones as written.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let resolved = after
            .find(';')
            .filter(|end| *end > 0 && *end <= 32)
            .and_then(|end| resolve_entity(&after[..end]).map(|text| (end, text)));
        match resolved {
            Some((end, text)) => {
                out.push_str(&text);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn element_from_start(doc: &mut Document, e: &BytesStart<'_>) -> (NodeId, String) {
    let name = local_name(e.name().as_ref());
    let mut attrs = Vec::with_capacity(4);
    for attr in e.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        if attrs.iter().any(|(existing, _): &(String, String)| *existing == key) {
            continue;
        }
        let raw = String::from_utf8_lossy(&attr.value);
        attrs.push((key, unescape_lenient(&raw)));
    }
    let node = doc.push_node(NodeData::Element {
        name: name.clone(),
        attrs,
    });
    (node, name)
}

fn build_document(xhtml: &str, strict: bool) -> Result<Document, EngineError> {
    let mut doc = Document::new();
    let mut reader = Reader::from_str(xhtml);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }
    let root = doc.root();
    let mut stack: Vec<(NodeId, String)> = vec![(root, String::new())];

    loop {
        let parent = stack.last().map_or(root, |(node, _)| *node);
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let (node, name) = element_from_start(&mut doc, &e);
                doc.append_child(parent, node);
                if !is_void(&name) {
                    stack.push((node, name));
                }
            }
            Ok(Event::Empty(e)) => {
                let (node, _) = element_from_start(&mut doc, &e);
                doc.append_child(parent, node);
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                match stack.iter().rposition(|(_, open)| *open == name) {
                    Some(pos) if pos > 0 => stack.truncate(pos),
                    _ => log::debug!("ignoring unmatched </{}>", name),
                }
            }
            Ok(Event::Text(e)) => match e.decode() {
                Ok(text) => doc.append_text(parent, &text),
                Err(err) if strict => {
                    return Err(dom_error(&reader, format!("Decode error: {:?}", err)));
                }
                Err(_) => {}
            },
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                doc.append_text(parent, &text);
            }
            Ok(Event::GeneralRef(e)) => {
                let name = String::from_utf8_lossy(&e).into_owned();
                match resolve_entity(&name) {
                    Some(text) => doc.append_text(parent, &text),
                    None => doc.append_text(parent, &format!("&{};", name)),
                }
            }
            Ok(Event::Comment(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                let node = doc.push_node(NodeData::Comment(text));
                doc.append_child(parent, node);
            }
            Ok(Event::DocType(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                let node = doc.push_node(NodeData::Doctype(text));
                doc.append_child(parent, node);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                let err = dom_error(&reader, format!("XML error: {:?}", err));
                if strict {
                    return Err(err);
                }
                log::warn!("{}; keeping partial tree", err);
                break;
            }
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_markup_and_finds_body() {
        let doc = Document::parse(
            r#"<?xml version="1.0"?><html xmlns="http://www.w3.org/1999/xhtml"><head><title>t</title></head><body><p id="a">One <b>two</b></p></body></html>"#,
        );
        let body = doc.body();
        assert_eq!(doc.tag_name(body), Some("body"));
        let p = doc.element_by_id("a").expect("p");
        assert_eq!(doc.parent(p), Some(body));
        assert_eq!(text_content(&doc, p), "One two");
        assert_eq!(doc.child_count(p), 2);
    }

    #[test]
    fn void_and_mismatched_tags_are_tolerated() {
        let doc = Document::parse("<body><p>a<br>b</span></p><p>c<img src='x.png'></p></body>");
        let ps = doc.elements_by_tag("p");
        assert_eq!(ps.len(), 2);
        assert_eq!(text_content(&doc, ps[0]), "ab");
        let img = doc.elements_by_tag("img")[0];
        assert_eq!(doc.parent(img), Some(ps[1]));
        assert_eq!(doc.attribute(img, "src"), Some("x.png"));
    }

    #[test]
    fn entities_resolve_to_characters() {
        let doc = Document::parse("<body><p>a&nbsp;b&#8203;c&amp;&bogus;</p></body>");
        let p = doc.elements_by_tag("p")[0];
        assert_eq!(text_content(&doc, p), "a\u{a0}b\u{200b}c&&bogus;");
        assert_eq!(doc.child_count(p), 1);
    }

    #[test]
    fn tokenizer_error_keeps_partial_tree() {
        let doc = Document::parse("<body><p>kept</p><p class=\"x>lost");
        assert_eq!(doc.elements_by_tag("p").len(), 1);
        assert!(Document::try_parse("<body><p>kept</p><p class=\"x>lost").is_err());
    }

    #[test]
    fn serializes_back_to_xhtml() {
        let doc = Document::parse(
            "<!DOCTYPE html><html><body><p class=\"a\">x &lt; y</p><br/><div></div><!-- c --></body></html>",
        );
        assert_eq!(
            doc.to_xhtml(),
            "<!DOCTYPE html><html><body><p class=\"a\">x &lt; y</p><br/><div></div><!-- c --></body></html>"
        );
    }

    #[test]
    fn class_and_style_mutation() {
        let mut doc = Document::parse("<body><img style=\"width: 10px; height: 5px\"/></body>");
        let img = doc.elements_by_tag("img")[0];
        doc.add_class(img, "a");
        doc.add_class(img, "b");
        doc.add_class(img, "a");
        assert_eq!(doc.attribute(img, "class"), Some("a b"));
        doc.remove_class(img, "a");
        assert_eq!(doc.attribute(img, "class"), Some("b"));
        doc.remove_class(img, "b");
        assert_eq!(doc.attribute(img, "class"), None);

        doc.set_style_property(img, "width", "200px", false);
        assert_eq!(doc.attribute(img, "style"), Some("width: 200px; height: 5px"));
    }

    #[test]
    fn append_and_detach_keep_links_consistent() {
        let mut doc = Document::parse("<body><p>a</p><p>b</p></body>");
        let body = doc.body();
        let ps = doc.elements_by_tag("p");
        doc.detach(ps[0]);
        assert_eq!(doc.first_child(body), Some(ps[1]));
        assert_eq!(doc.previous_sibling(ps[1]), None);
        assert!(!is_attached(&doc, ps[0]));

        doc.append_child(body, ps[0]);
        assert_eq!(doc.last_child(body), Some(ps[0]));
        assert_eq!(doc.index_in_parent(ps[0]), 1);

        let html = doc.parent(body);
        doc.append_child(ps[0], body);
        assert_eq!(doc.parent(body), html);
    }

    #[test]
    fn insert_before_places_node_ahead_of_reference() {
        let mut doc = Document::parse("<html><body><p>a</p><p>b</p></body></html>");
        let html = doc.document_element().expect("html");
        let body = doc.body();
        let head = doc.create_element("head");
        doc.insert_before(html, head, doc.first_child(html));
        assert_eq!(doc.first_child(html), Some(head));
        assert_eq!(doc.next_sibling(head), Some(body));
        assert_eq!(doc.head(), Some(head));

        let ps = doc.elements_by_tag("p");
        doc.insert_before(body, ps[1], Some(ps[0]));
        assert_eq!(doc.first_child(body), Some(ps[1]));
        assert_eq!(doc.last_child(body), Some(ps[0]));
        assert_eq!(doc.to_xhtml(), "<html><head></head><body><p>b</p><p>a</p></body></html>");
    }
}
