//! Content block segmentation and block navigation.
//!
//! A document is split into ranges that each start at a block-level element
//! and run to the next one. Pure layout containers (a block that only wraps
//! other blocks) are transparent, and ranges without visible text or media
//! are dropped. The walk runs in bounded batches so a caller on a UI loop can
//! yield between them.

use core::cmp::Ordering;

use crate::config::SegmenterLimits;
use crate::dom::{DocumentTree, NodeKind};
use crate::error::RangeError;
use crate::range::{
    compare_points, has_meaningful_content, intersects_node, is_meaningful_text, range_text,
    BoundaryPoint, DocRange,
};

/// Elements that start a navigation block.
///
/// List and table wrappers are listed so they count as layout containers.
/// Table cells are not: a row reads as one block.
pub const BLOCK_TAGS: &[&str] = &[
    "article",
    "aside",
    "blockquote",
    "caption",
    "details",
    "div",
    "dl",
    "dt",
    "dd",
    "figure",
    "footer",
    "figcaption",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "tfoot",
    "thead",
    "tr",
    "ul",
];

/// Cancellation hook checked between batches.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Never-cancel token for default call paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Outcome of one [`ContentBlockBuilder::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStatus {
    /// More nodes remain; call `step` again.
    Pending,
    /// The walk finished.
    Complete,
    /// The walk stopped early (block cap or cancellation).
    Truncated,
}

fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// A block element that only wraps other blocks and has no text of its own.
fn is_layout_container<T: DocumentTree + ?Sized>(tree: &T, node: T::Node) -> bool {
    let mut has_block_child = false;
    let mut child = tree.first_child(node);
    while let Some(current) = child {
        match tree.kind(current) {
            NodeKind::Element => {
                if tree.tag_name(current).is_some_and(is_block_tag) {
                    has_block_child = true;
                }
            }
            NodeKind::Text => {
                if tree.text(current).is_some_and(is_meaningful_text) {
                    return false;
                }
            }
            NodeKind::Other => {}
        }
        child = tree.next_sibling(current);
    }
    has_block_child
}

/// Pre-order successor of `node` that stays inside `scope`.
fn next_within<T: DocumentTree + ?Sized>(tree: &T, node: T::Node, scope: T::Node) -> Option<T::Node> {
    if let Some(child) = tree.first_child(node) {
        return Some(child);
    }
    let mut current = node;
    loop {
        if current == scope {
            return None;
        }
        if let Some(sibling) = tree.next_sibling(current) {
            return Some(sibling);
        }
        current = tree.parent(current)?;
    }
}

fn range_before<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
) -> Result<DocRange<T::Node>, RangeError> {
    let parent = tree.parent(node).ok_or(RangeError::Detached)?;
    let mut range = DocRange::collapsed(BoundaryPoint::new(parent, 0));
    range.set_start_before(tree, node)?;
    Ok(range)
}

/// Incremental block builder.
///
/// Each [`step`](Self::step) examines at most `batch_size` elements, so the
/// caller decides where to yield.
pub struct ContentBlockBuilder<'a, T: DocumentTree + ?Sized> {
    tree: &'a T,
    limits: SegmenterLimits,
    body: T::Node,
    cursor: Option<T::Node>,
    open: Option<DocRange<T::Node>>,
    blocks: Vec<DocRange<T::Node>>,
    elements_seen: usize,
    status: BuildStatus,
}

impl<'a, T: DocumentTree + ?Sized> ContentBlockBuilder<'a, T> {
    /// Builder positioned at the start of `tree`'s body.
    pub fn new(tree: &'a T, limits: SegmenterLimits) -> Self {
        let body = tree.body();
        Self {
            tree,
            limits,
            body,
            cursor: tree.first_child(body),
            open: Some(DocRange::collapsed(BoundaryPoint::new(body, 0))),
            blocks: Vec::new(),
            elements_seen: 0,
            status: BuildStatus::Pending,
        }
    }

    /// Blocks collected so far.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    /// Process the next batch of elements.
    pub fn step(&mut self, cancel: &dyn CancelToken) -> BuildStatus {
        if self.status != BuildStatus::Pending {
            return self.status;
        }
        if cancel.is_cancelled() {
            log::debug!(
                "content block build cancelled after {} elements ({} blocks)",
                self.elements_seen,
                self.blocks.len()
            );
            self.status = BuildStatus::Truncated;
            return self.status;
        }
        let batch = self.limits.batch_size.max(1);
        let mut examined = 0usize;
        while examined < batch {
            let Some(node) = self.cursor else {
                self.close_at_body_end();
                self.status = BuildStatus::Complete;
                return self.status;
            };
            self.cursor = next_within(self.tree, node, self.body);
            if self.tree.kind(node) != NodeKind::Element {
                continue;
            }
            examined += 1;
            self.elements_seen += 1;
            let qualifies = self.tree.tag_name(node).is_some_and(is_block_tag)
                && !is_layout_container(self.tree, node);
            if !qualifies {
                continue;
            }
            self.close_before(node);
            if self.blocks.len() >= self.limits.max_blocks {
                log::warn!(
                    "content block cap ({}) reached after {} elements; returning partial blocks",
                    self.limits.max_blocks,
                    self.elements_seen
                );
                self.status = BuildStatus::Truncated;
                return self.status;
            }
            self.open = match range_before(self.tree, node) {
                Ok(range) => Some(range),
                Err(err) => {
                    log::debug!("cannot open block at {:?}: {}", node, err);
                    None
                }
            };
        }
        BuildStatus::Pending
    }

    fn close_before(&mut self, node: T::Node) {
        let Some(mut range) = self.open.take() else {
            return;
        };
        match range.set_end_before(self.tree, node) {
            Ok(()) => self.keep_if_meaningful(range),
            Err(err) => log::debug!("dropping block ending at {:?}: {}", node, err),
        }
    }

    fn close_at_body_end(&mut self) {
        let Some(mut range) = self.open.take() else {
            return;
        };
        match range.set_end_at_end(self.tree, self.body) {
            Ok(()) => self.keep_if_meaningful(range),
            Err(err) => log::debug!("dropping final block: {}", err),
        }
    }

    fn keep_if_meaningful(&mut self, range: DocRange<T::Node>) {
        if self.blocks.len() < self.limits.max_blocks && has_meaningful_content(self.tree, &range) {
            self.blocks.push(range);
        }
    }

    /// Finished (or partial) block sequence.
    pub fn finish(self) -> ContentBlocks<T::Node> {
        ContentBlocks {
            blocks: self.blocks,
            current: None,
            truncated: self.status == BuildStatus::Truncated,
        }
    }
}

/// Build all blocks synchronously.
pub fn build_content_blocks_blocking<T: DocumentTree + ?Sized>(
    tree: &T,
    limits: SegmenterLimits,
) -> ContentBlocks<T::Node> {
    let mut builder = ContentBlockBuilder::new(tree, limits);
    while builder.step(&NeverCancel) == BuildStatus::Pending {}
    builder.finish()
}

/// Build blocks, yielding to the tokio scheduler after every batch.
#[cfg(feature = "async")]
pub async fn build_content_blocks<T: DocumentTree + ?Sized>(
    tree: &T,
    batch_size: Option<usize>,
) -> ContentBlocks<T::Node> {
    let mut limits = SegmenterLimits::default();
    if let Some(batch_size) = batch_size {
        limits.batch_size = batch_size;
    }
    build_content_blocks_with_cancel(tree, limits, &NeverCancel).await
}

/// Build blocks, yielding after every batch and stopping once `cancel`
/// fires. A cancelled build returns the blocks found so far.
#[cfg(feature = "async")]
pub async fn build_content_blocks_with_cancel<T, C>(
    tree: &T,
    limits: SegmenterLimits,
    cancel: &C,
) -> ContentBlocks<T::Node>
where
    T: DocumentTree + ?Sized,
    C: CancelToken,
{
    let mut builder = ContentBlockBuilder::new(tree, limits);
    while builder.step(cancel) == BuildStatus::Pending {
        tokio::task::yield_now().await;
    }
    builder.finish()
}

/// Ordered block ranges plus a navigation cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentBlocks<N> {
    blocks: Vec<DocRange<N>>,
    current: Option<usize>,
    truncated: bool,
}

impl<N: Copy + Eq> ContentBlocks<N> {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Whether the build stopped early.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Cursor position; `None` until a navigation call lands somewhere.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&DocRange<N>> {
        self.blocks.get(self.current?)
    }

    pub fn get(&self, index: usize) -> Option<&DocRange<N>> {
        self.blocks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocRange<N>> {
        self.blocks.iter()
    }

    pub fn first(&mut self) -> Option<&DocRange<N>> {
        self.go_to(0)
    }

    pub fn last(&mut self) -> Option<&DocRange<N>> {
        let last = self.blocks.len().checked_sub(1)?;
        self.go_to(last)
    }

    /// Advance by one; stays put at the end.
    pub fn next(&mut self) -> Option<&DocRange<N>> {
        let target = self.current.map_or(0, |idx| idx + 1);
        self.go_to(target)
    }

    /// Step back by one; stays put at the start or when unpositioned.
    pub fn prev(&mut self) -> Option<&DocRange<N>> {
        let target = self.current?.checked_sub(1)?;
        self.go_to(target)
    }

    /// Jump to `index`; out of range leaves the cursor alone.
    pub fn go_to(&mut self, index: usize) -> Option<&DocRange<N>> {
        if index >= self.blocks.len() {
            return None;
        }
        self.current = Some(index);
        self.blocks.get(index)
    }

    /// First block touching `node`, else the first block.
    pub fn find_by_node<T>(&mut self, tree: &T, node: Option<N>) -> Option<&DocRange<N>>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let hit = node.and_then(|node| {
            self.blocks
                .iter()
                .position(|block| intersects_node(tree, block, node))
        });
        match hit {
            Some(idx) => self.go_to(idx),
            None => self.first(),
        }
    }

    /// Block fully containing `target`, else the block touching its start
    /// container, else the first block.
    pub fn find_by_range<T>(&mut self, tree: &T, target: &DocRange<N>) -> Option<&DocRange<N>>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let hit = (0..self.blocks.len()).find(|idx| contains_range(tree, &self.blocks[*idx], target));
        match hit {
            Some(idx) => self.go_to(idx),
            None => self.find_by_node(tree, Some(target.start.container)),
        }
    }

    /// [`find_by_range`](Self::find_by_range), yielding to the tokio
    /// scheduler every `batch_size` blocks.
    #[cfg(feature = "async")]
    pub async fn find_by_range_async<T>(
        &mut self,
        tree: &T,
        target: &DocRange<N>,
        batch_size: usize,
    ) -> Option<&DocRange<N>>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let batch = batch_size.max(1);
        let mut hit = None;
        for idx in 0..self.blocks.len() {
            if idx > 0 && idx % batch == 0 {
                tokio::task::yield_now().await;
            }
            if contains_range(tree, &self.blocks[idx], target) {
                hit = Some(idx);
                break;
            }
        }
        match hit {
            Some(idx) => self.go_to(idx),
            None => self.find_by_node(tree, Some(target.start.container)),
        }
    }

    /// Plain text of block `index`.
    pub fn text<T>(&self, tree: &T, index: usize) -> Option<String>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        self.blocks.get(index).map(|block| range_text(tree, block))
    }
}

fn contains_range<T: DocumentTree + ?Sized>(
    tree: &T,
    block: &DocRange<T::Node>,
    target: &DocRange<T::Node>,
) -> bool {
    let starts_before = compare_points(tree, &block.start, &target.start);
    let ends_after = compare_points(tree, &block.end, &target.end);
    match (starts_before, ends_after) {
        (Ok(start), Ok(end)) => start != Ordering::Greater && end != Ordering::Less,
        (Err(err), _) | (_, Err(err)) => {
            log::debug!("skipping block during range lookup: {}", err);
            false
        }
    }
}
