//! Boundary points and ranges over a [`DocumentTree`].
//!
//! Offsets follow DOM rules: a child index for element containers and a
//! character index for text containers.

use core::cmp::Ordering;

use smallvec::SmallVec;

use crate::dom::{is_attached, next_in_order, next_skipping_children, DocumentTree, NodeKind};
use crate::error::RangeError;

/// Elements that count as content even without any text.
pub const MEDIA_TAGS: &[&str] = &[
    "img", "svg", "video", "audio", "canvas", "math", "iframe", "object", "embed", "hr",
];

/// Characters that do not make a span meaningful besides `char::is_whitespace`.
const INVISIBLE_CHARS: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Position inside a container node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryPoint<N> {
    pub container: N,
    pub offset: usize,
}

impl<N> BoundaryPoint<N> {
    pub fn new(container: N, offset: usize) -> Self {
        Self { container, offset }
    }
}

/// Contiguous span between two boundary points, start never after end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocRange<N> {
    pub start: BoundaryPoint<N>,
    pub end: BoundaryPoint<N>,
}

impl<N: Copy + Eq> DocRange<N> {
    /// Collapsed range at `point`.
    pub fn collapsed(point: BoundaryPoint<N>) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Move the start; an end left before it collapses onto the new start.
    pub fn set_start<T>(&mut self, tree: &T, container: N, offset: usize) -> Result<(), RangeError>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let point = checked_point(tree, container, offset)?;
        self.start = point;
        if compare_points(tree, &self.end, &point)? == Ordering::Less {
            self.end = point;
        }
        Ok(())
    }

    /// Move the end; a start left after it collapses onto the new end.
    pub fn set_end<T>(&mut self, tree: &T, container: N, offset: usize) -> Result<(), RangeError>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let point = checked_point(tree, container, offset)?;
        self.end = point;
        if compare_points(tree, &self.start, &point)? == Ordering::Greater {
            self.start = point;
        }
        Ok(())
    }

    pub fn set_start_before<T>(&mut self, tree: &T, node: N) -> Result<(), RangeError>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let parent = tree.parent(node).ok_or(RangeError::Detached)?;
        self.set_start(tree, parent, tree.index_in_parent(node))
    }

    pub fn set_end_before<T>(&mut self, tree: &T, node: N) -> Result<(), RangeError>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let parent = tree.parent(node).ok_or(RangeError::Detached)?;
        self.set_end(tree, parent, tree.index_in_parent(node))
    }

    pub fn set_end_after<T>(&mut self, tree: &T, node: N) -> Result<(), RangeError>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let parent = tree.parent(node).ok_or(RangeError::Detached)?;
        self.set_end(tree, parent, tree.index_in_parent(node) + 1)
    }

    /// Place the end after the last child (or character) of `container`.
    pub fn set_end_at_end<T>(&mut self, tree: &T, container: N) -> Result<(), RangeError>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        self.set_end(tree, container, tree.node_length(container))
    }

    /// Range spanning exactly `node`.
    pub fn select_node<T>(tree: &T, node: N) -> Result<Self, RangeError>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let parent = tree.parent(node).ok_or(RangeError::Detached)?;
        let idx = tree.index_in_parent(node);
        let start = checked_point(tree, parent, idx)?;
        let end = checked_point(tree, parent, idx + 1)?;
        Ok(Self { start, end })
    }
}

fn checked_point<T>(tree: &T, container: T::Node, offset: usize) -> Result<BoundaryPoint<T::Node>, RangeError>
where
    T: DocumentTree + ?Sized,
{
    if !is_attached(tree, container) {
        return Err(RangeError::Detached);
    }
    let len = tree.node_length(container);
    if offset > len {
        return Err(RangeError::OffsetOutOfBounds { offset, len });
    }
    Ok(BoundaryPoint::new(container, offset))
}

type TreePath = SmallVec<[usize; 16]>;

fn point_path<T>(tree: &T, point: &BoundaryPoint<T::Node>) -> Result<TreePath, RangeError>
where
    T: DocumentTree + ?Sized,
{
    let mut path = TreePath::new();
    path.push(point.offset);
    let mut current = point.container;
    while let Some(parent) = tree.parent(current) {
        path.push(tree.index_in_parent(current));
        current = parent;
    }
    if current != tree.root() {
        return Err(RangeError::Detached);
    }
    path.reverse();
    Ok(path)
}

/// Document-order comparison of two boundary points.
///
/// Fails when either container is detached from the tree.
pub fn compare_points<T>(
    tree: &T,
    a: &BoundaryPoint<T::Node>,
    b: &BoundaryPoint<T::Node>,
) -> Result<Ordering, RangeError>
where
    T: DocumentTree + ?Sized,
{
    if a == b {
        return if is_attached(tree, a.container) {
            Ok(Ordering::Equal)
        } else {
            Err(RangeError::Detached)
        };
    }
    let left = point_path(tree, a)?;
    let right = point_path(tree, b)?;
    Ok(left.as_slice().cmp(right.as_slice()))
}

/// Whether any part of `node` lies inside `range`.
pub fn intersects_node<T>(tree: &T, range: &DocRange<T::Node>, node: T::Node) -> bool
where
    T: DocumentTree + ?Sized,
{
    if !is_attached(tree, node) {
        return false;
    }
    let Some(parent) = tree.parent(node) else {
        return true;
    };
    let offset = tree.index_in_parent(node);
    let before = BoundaryPoint::new(parent, offset);
    let after = BoundaryPoint::new(parent, offset + 1);
    matches!(compare_points(tree, &before, &range.end), Ok(Ordering::Less))
        && matches!(compare_points(tree, &after, &range.start), Ok(Ordering::Greater))
}

/// Visit nodes whose start lies inside `range`, in document order. Text
/// nodes come with their clipped character data. `visit` returns `false` to
/// stop early.
fn walk_range<T, F>(tree: &T, range: &DocRange<T::Node>, mut visit: F)
where
    T: DocumentTree + ?Sized,
    F: FnMut(T::Node, Option<&str>) -> bool,
{
    let start = range.start;
    let end = range.end;
    if tree.kind(start.container) == NodeKind::Text {
        let text = tree.text(start.container).unwrap_or_default();
        let clip_end = (start.container == end.container).then_some(end.offset);
        if !visit(start.container, Some(char_slice(text, start.offset, clip_end))) {
            return;
        }
        if start.container == end.container {
            return;
        }
    }

    let stop = if tree.kind(end.container) == NodeKind::Text {
        Some(end.container)
    } else {
        tree.child_at(end.container, end.offset)
            .or_else(|| next_skipping_children(tree, end.container))
    };
    let mut current = if tree.kind(start.container) == NodeKind::Text {
        next_skipping_children(tree, start.container)
    } else {
        tree.child_at(start.container, start.offset)
            .or_else(|| next_skipping_children(tree, start.container))
    };

    while let Some(node) = current {
        if Some(node) == stop {
            if tree.kind(node) == NodeKind::Text {
                let text = tree.text(node).unwrap_or_default();
                visit(node, Some(char_slice(text, 0, Some(end.offset))));
            }
            return;
        }
        let keep_going = match tree.kind(node) {
            NodeKind::Text => visit(node, tree.text(node)),
            _ => visit(node, None),
        };
        if !keep_going {
            return;
        }
        current = next_in_order(tree, node);
    }
}

fn char_slice(text: &str, from: usize, to: Option<usize>) -> &str {
    let byte_at = |chars: usize| {
        text.char_indices()
            .nth(chars)
            .map_or(text.len(), |(idx, _)| idx)
    };
    let start = byte_at(from);
    let end = to.map_or(text.len(), byte_at).max(start);
    &text[start..end]
}

/// Plain text inside `range`.
pub fn range_text<T>(tree: &T, range: &DocRange<T::Node>) -> String
where
    T: DocumentTree + ?Sized,
{
    let mut out = String::new();
    walk_range(tree, range, |_, text| {
        if let Some(text) = text {
            out.push_str(text);
        }
        true
    });
    out
}

/// Whether a media element starts inside `range`.
pub fn range_contains_media<T>(tree: &T, range: &DocRange<T::Node>) -> bool
where
    T: DocumentTree + ?Sized,
{
    let mut found = false;
    walk_range(tree, range, |node, _| {
        found = tree.tag_name(node).is_some_and(|tag| MEDIA_TAGS.contains(&tag));
        !found
    });
    found
}

/// Whether `text` holds anything besides whitespace and zero-width
/// characters.
pub fn is_meaningful_text(text: &str) -> bool {
    text.chars()
        .any(|ch| !ch.is_whitespace() && !INVISIBLE_CHARS.contains(&ch))
}

/// Whether `range` holds visible text or a media element.
pub fn has_meaningful_content<T>(tree: &T, range: &DocRange<T::Node>) -> bool
where
    T: DocumentTree + ?Sized,
{
    let mut meaningful = false;
    walk_range(tree, range, |node, text| {
        meaningful = match text {
            Some(text) => is_meaningful_text(text),
            None => tree.tag_name(node).is_some_and(|tag| MEDIA_TAGS.contains(&tag)),
        };
        !meaningful
    });
    meaningful
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn doc() -> Document {
        Document::parse("<body><p>Hello <b>big</b> world</p><p><img src=\"a.png\"/></p><p>tail</p></body>")
    }

    #[test]
    fn compare_orders_parents_before_descendants() {
        let doc = doc();
        let body = doc.body();
        let ps = doc.elements_by_tag("p");
        let hello = doc.first_child(ps[0]).expect("text");
        let before_p0 = BoundaryPoint::new(body, 0);
        let in_text = BoundaryPoint::new(hello, 3);
        let before_p1 = BoundaryPoint::new(body, 1);
        assert_eq!(compare_points(&doc, &before_p0, &in_text), Ok(Ordering::Less));
        assert_eq!(compare_points(&doc, &in_text, &before_p1), Ok(Ordering::Less));
        assert_eq!(compare_points(&doc, &before_p1, &before_p1), Ok(Ordering::Equal));
    }

    #[test]
    fn detached_nodes_reject_boundaries() {
        let mut doc = doc();
        let orphan = doc.create_element("p");
        let body = doc.body();
        let mut range = DocRange::collapsed(BoundaryPoint::new(body, 0));
        assert_eq!(range.set_end_before(&doc, orphan), Err(RangeError::Detached));
        assert_eq!(
            range.set_end(&doc, body, 9),
            Err(RangeError::OffsetOutOfBounds { offset: 9, len: 3 })
        );
        let point = BoundaryPoint::new(orphan, 0);
        assert_eq!(compare_points(&doc, &point, &point), Err(RangeError::Detached));
    }

    #[test]
    fn text_is_clipped_to_boundaries() {
        let doc = doc();
        let ps = doc.elements_by_tag("p");
        let hello = doc.first_child(ps[0]).expect("text");
        let world = doc.last_child(ps[0]).expect("text");
        let mut range = DocRange::collapsed(BoundaryPoint::new(hello, 2));
        range.set_end(&doc, world, 3).expect("end");
        assert_eq!(range_text(&doc, &range), "llo big wo");

        let whole = DocRange::select_node(&doc, ps[0]).expect("select");
        assert_eq!(range_text(&doc, &whole), "Hello big world");
    }

    #[test]
    fn media_is_detected_inside_range() {
        let doc = doc();
        let ps = doc.elements_by_tag("p");
        let image_par = DocRange::select_node(&doc, ps[1]).expect("select");
        assert!(range_contains_media(&doc, &image_par));
        assert!(has_meaningful_content(&doc, &image_par));
        assert_eq!(range_text(&doc, &image_par), "");
        let text_par = DocRange::select_node(&doc, ps[0]).expect("select");
        assert!(!range_contains_media(&doc, &text_par));
    }

    #[test]
    fn intersection_follows_range_edges() {
        let doc = doc();
        let ps = doc.elements_by_tag("p");
        let range = DocRange::select_node(&doc, ps[1]).expect("select");
        assert!(intersects_node(&doc, &range, ps[1]));
        assert!(intersects_node(&doc, &range, doc.elements_by_tag("img")[0]));
        assert!(!intersects_node(&doc, &range, ps[0]));
        assert!(!intersects_node(&doc, &range, ps[2]));
        assert!(intersects_node(&doc, &range, doc.body()));
    }

    #[test]
    fn invisible_characters_are_not_meaningful() {
        assert!(!is_meaningful_text(" \t\n\u{a0}\u{3000}\u{200b}\u{feff}\u{2060}"));
        assert!(is_meaningful_text("\u{200b}x"));
    }
}
