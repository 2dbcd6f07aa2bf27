mod common;

use std::cell::Cell;

use common::fixtures::{mixed_chapter, paragraphs};
use epub_restyle::range::{BoundaryPoint, DocRange};
use epub_restyle::{
    build_content_blocks, build_content_blocks_blocking, build_content_blocks_with_cancel,
    CancelToken, Document, DocumentTree, SegmenterLimits,
};

struct CancelAfter {
    checks: Cell<usize>,
    limit: usize,
}

impl CancelToken for CancelAfter {
    fn is_cancelled(&self) -> bool {
        let seen = self.checks.get() + 1;
        self.checks.set(seen);
        seen > self.limit
    }
}

#[tokio::test(flavor = "current_thread")]
async fn async_build_matches_blocking_build() {
    let doc = Document::parse(&mixed_chapter());
    let blocking = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    let cooperative = build_content_blocks(&doc, Some(2)).await;
    assert_eq!(blocking, cooperative);
}

#[tokio::test(flavor = "current_thread")]
async fn cancelled_build_keeps_partial_blocks() {
    let doc = Document::parse(&paragraphs(100));
    let cancel = CancelAfter {
        checks: Cell::new(0),
        limit: 2,
    };
    let limits = SegmenterLimits {
        batch_size: 10,
        ..SegmenterLimits::default()
    };
    let blocks = build_content_blocks_with_cancel(&doc, limits, &cancel).await;
    assert!(blocks.is_truncated());
    assert!(!blocks.is_empty());
    assert!(blocks.len() < 100);
}

#[tokio::test(flavor = "current_thread")]
async fn async_range_lookup_matches_blocking_lookup() {
    let doc = Document::parse(&paragraphs(40));
    let mut blocks = build_content_blocks(&doc, None).await;
    let target_p = doc.elements_by_tag("p")[33];
    let text = doc.first_child(target_p).expect("text");
    let mut selection = DocRange::collapsed(BoundaryPoint::new(text, 0));
    selection.set_end(&doc, text, 4).expect("end");
    blocks.find_by_range_async(&doc, &selection, 8).await;
    assert_eq!(blocks.current_index(), Some(33));

    let mut blocking = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    blocking.find_by_range(&doc, &selection);
    assert_eq!(blocking.current_index(), blocks.current_index());
}
