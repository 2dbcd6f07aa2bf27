mod common;

use common::budget_alloc::BudgetAlloc;
use common::fixtures::paragraphs;
use epub_restyle::{build_content_blocks_blocking, Document, SegmenterLimits};

// A 2000-paragraph chapter segments with well under 512KiB of extra heap.
// Block ranges are four words each; the walk itself should not allocate per node.
const SEGMENT_BUDGET_BYTES: usize = 512 * 1024;

#[global_allocator]
static ALLOC: BudgetAlloc = BudgetAlloc::new();

#[test]
fn segmentation_stays_under_heap_budget() {
    let doc = Document::parse(&paragraphs(2000));

    ALLOC.reset();
    let baseline = ALLOC.live_bytes();
    let blocks = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    let peak = ALLOC.peak_bytes().saturating_sub(baseline);

    assert_eq!(blocks.len(), 2000);
    assert!(
        peak <= SEGMENT_BUDGET_BYTES,
        "segmentation peak over budget: {} bytes ({:.1}KB), budget: {}KB",
        peak,
        peak as f64 / 1024.0,
        SEGMENT_BUDGET_BYTES / 1024
    );
}
