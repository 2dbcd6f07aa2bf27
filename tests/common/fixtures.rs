use std::fmt::Write;

/// Wrap body markup in a minimal XHTML document.
pub fn xhtml(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>t</title></head><body>{}</body></html>",
        body
    )
}

/// Document with `count` numbered paragraphs.
pub fn paragraphs(count: usize) -> String {
    let mut body = String::with_capacity(count * 24);
    for idx in 0..count {
        let _ = write!(body, "<p>Paragraph {}</p>", idx);
    }
    xhtml(&body)
}

/// Chapter mixing headings, nested containers, lists and media.
pub fn mixed_chapter() -> String {
    xhtml(concat!(
        "<section class=\"chapter\">",
        "<h1>Chapter One</h1>",
        "<div><p>It was a dark and stormy night.</p><p>The rain fell.</p></div>",
        "<figure><img src=\"map.png\" alt=\"\"/></figure>",
        "<ul><li>first</li><li>second</li></ul>",
        "<blockquote>Quoted <em>words</em></blockquote>",
        "<p>&#160;</p>",
        "<p>The end.</p>",
        "</section>",
    ))
}

/// Publisher stylesheet exercising every rewrite pass.
pub const PUBLISHER_CSS: &str = r#"
@charset "utf-8";
@font-face { font-family: "Book"; src: url(fonts/book.ttf); font-weight: normal; }
body { font-family: serif; color: #000000; }
h1 { text-align: center; text-indent: 0; font-size: 24px; }
p { font-size: 12pt; font-weight: normal; margin: 0 0 1em; }
.nowrap { white-space: nowrap; }
.break { page-break-after: always; }
.cover { duokan-bleed: lefttoprightbottom; width: 100vw; }
code { font-family: monospace; -webkit-user-select: none; }
@media (orientation: landscape) { p { font-size: small; } }
"#;
