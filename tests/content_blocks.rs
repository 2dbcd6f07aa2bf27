mod common;

use common::fixtures::{mixed_chapter, paragraphs, xhtml};
use epub_restyle::range::{range_contains_media, BoundaryPoint, DocRange};
use epub_restyle::{
    build_content_blocks_blocking, BuildStatus, ContentBlockBuilder, ContentBlocks, Document,
    DocumentTree, NeverCancel, NodeId, SegmenterLimits,
};

fn texts(doc: &Document, blocks: &ContentBlocks<NodeId>) -> Vec<String> {
    (0..blocks.len())
        .filter_map(|idx| blocks.text(doc, idx))
        .map(|text| text.trim().to_string())
        .collect()
}

#[test]
fn blank_paragraphs_between_blocks_are_skipped() {
    let doc = Document::parse(&xhtml(
        "<p>First</p><p>   </p><p>&#160;</p><p>&#8203;</p><p><br/></p><p>Second</p>",
    ));
    let blocks = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    assert_eq!(texts(&doc, &blocks), vec!["First", "Second"]);
    assert!(!blocks.is_truncated());
}

#[test]
fn media_only_blocks_are_kept() {
    let doc = Document::parse(&xhtml(
        "<p>Intro</p><p><img src=\"plate.png\" alt=\"\"/></p><p>Outro</p>",
    ));
    let blocks = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    assert_eq!(blocks.len(), 3);
    let media = blocks.get(1).expect("media block");
    assert!(range_contains_media(&doc, media));
    assert_eq!(blocks.text(&doc, 1).map(|t| t.trim().to_string()), Some(String::new()));
}

#[test]
fn mixed_chapter_segments_in_document_order() {
    let doc = Document::parse(&mixed_chapter());
    let blocks = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    assert_eq!(
        texts(&doc, &blocks),
        vec![
            "Chapter One",
            "It was a dark and stormy night.",
            "The rain fell.",
            "",
            "first",
            "second",
            "Quoted words",
            "The end.",
        ]
    );
}

#[test]
fn block_count_is_capped() {
    let doc = Document::parse(&paragraphs(5200));
    let blocks = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    assert_eq!(blocks.len(), 5000);
    assert!(blocks.is_truncated());
    assert_eq!(blocks.text(&doc, 4999).as_deref(), Some("Paragraph 4999"));

    let exact = Document::parse(&paragraphs(5000));
    let blocks = build_content_blocks_blocking(&exact, SegmenterLimits::default());
    assert_eq!(blocks.len(), 5000);
    assert!(!blocks.is_truncated());
}

#[test]
fn custom_cap_applies() {
    let doc = Document::parse(&paragraphs(30));
    let limits = SegmenterLimits {
        batch_size: 4,
        max_blocks: 10,
    };
    let mut builder = ContentBlockBuilder::new(&doc, limits);
    let mut steps = 0;
    while builder.step(&NeverCancel) == BuildStatus::Pending {
        steps += 1;
    }
    assert!(steps >= 2);
    assert_eq!(builder.status(), BuildStatus::Truncated);
    assert_eq!(builder.block_count(), 10);
}

#[test]
fn navigation_stays_in_bounds() {
    let doc = Document::parse(&paragraphs(3));
    let mut blocks = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    assert!(blocks.current().is_none());
    assert!(blocks.first().is_some());
    assert!(blocks.prev().is_none());
    assert_eq!(blocks.current_index(), Some(0));
    assert!(blocks.next().is_some());
    assert!(blocks.next().is_some());
    assert!(blocks.next().is_none());
    assert_eq!(blocks.current_index(), Some(2));
    assert!(blocks.go_to(7).is_none());
    assert_eq!(blocks.current_index(), Some(2));
    assert!(blocks.go_to(1).is_some());
    assert_eq!(blocks.text(&doc, 1).as_deref(), Some("Paragraph 1"));
}

#[test]
fn empty_document_has_no_navigation_targets() {
    let doc = Document::parse(&xhtml("<div>\n  </div>"));
    let mut blocks = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    assert!(blocks.is_empty());
    assert!(blocks.first().is_none());
    assert!(blocks.last().is_none());
    assert!(blocks.next().is_none());
    assert_eq!(blocks.current_index(), None);
}

#[test]
fn locate_block_by_node_and_selection() {
    let doc = Document::parse(&mixed_chapter());
    let mut blocks = build_content_blocks_blocking(&doc, SegmenterLimits::default());
    let em = doc.elements_by_tag("em")[0];
    blocks.find_by_node(&doc, Some(em));
    assert_eq!(blocks.current_index(), Some(6));

    let words = doc.first_child(em).expect("em text");
    let mut selection = DocRange::collapsed(BoundaryPoint::new(words, 1));
    selection.set_end(&doc, words, 3).expect("end");
    blocks.first();
    blocks.find_by_range(&doc, &selection);
    assert_eq!(blocks.current_index(), Some(6));
}
