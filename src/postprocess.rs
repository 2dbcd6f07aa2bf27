//! In-place fixes applied to a loaded content document before display.
//!
//! Every function here is idempotent: running it twice leaves the document
//! as running it once did.

use crate::config::ViewConfiguration;
use crate::dom::{is_inclusive_ancestor, next_in_order, Document, DocumentTree, NodeId, NodeKind};
use crate::theme::ThemeCode;
use crate::transform::format_number;

/// Id of the injected fixed-layout `<style>` element.
pub const FIXED_LAYOUT_STYLE_ID: &str = "fixed-layout-styles";

/// Class set on images that sit inline with text.
pub const TEXT_SIBLINGS_CLASS: &str = "has-text-siblings";

const ALIGNMENTS: &[&str] = &["left", "right", "center", "justify"];

/// Convert relative image sizes to pixels and tag inline images.
///
/// `width` attributes in `%` or `vw` (and `height` in `%` or `vh`) become
/// inline pixel sizes against the viewport; the attribute is removed.
pub fn apply_image_style(doc: &mut Document, viewport_width: f64, viewport_height: f64) {
    for img in doc.elements_by_tag("img") {
        resolve_relative_size(doc, img, "width", "vw", viewport_width);
        resolve_relative_size(doc, img, "height", "vh", viewport_height);

        let Some(parent) = doc.parent(img) else {
            continue;
        };
        if doc.kind(parent) != NodeKind::Element {
            continue;
        }
        let has_text_siblings = doc.children(parent).any(|child| {
            doc.text(child)
                .is_some_and(|text| !text.trim().is_empty())
        });
        if has_text_siblings {
            doc.add_class(img, TEXT_SIBLINGS_CLASS);
        }
    }
}

fn resolve_relative_size(doc: &mut Document, img: NodeId, attr: &str, unit: &str, viewport: f64) {
    let Some(raw) = doc.attribute(img, attr).map(str::trim) else {
        return;
    };
    let number = raw
        .strip_suffix('%')
        .or_else(|| raw.strip_suffix(unit))
        .and_then(|n| n.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite());
    let Some(percentage) = number else {
        return;
    };
    let px = format!("{}px", format_number(percentage / 100.0 * viewport));
    doc.set_style_property(img, attr, &px, false);
    doc.remove_attribute(img, attr);
}

/// Scale tables whose declared width exceeds the available width.
///
/// The declared width is the sum of the first row's cell widths, falling
/// back to the table's own width.
pub fn apply_table_style(doc: &mut Document) {
    for table in doc.elements_by_tag("table") {
        let mut total = first_row(doc, table)
            .map(|row| {
                doc.children(row)
                    .filter(|cell| matches!(doc.tag_name(*cell), Some("td" | "th")))
                    .filter_map(|cell| declared_width(doc, cell))
                    .sum::<f64>()
            })
            .unwrap_or(0.0);
        if total <= 0.0 {
            total = declared_width(doc, table).unwrap_or(0.0);
        }
        if total <= 0.0 {
            continue;
        }
        doc.set_style_property(table, "transform-origin", "left top", false);
        let scale = format!(
            "scale(calc(min(1, var(--available-width) / {})))",
            format_number(total)
        );
        doc.set_style_property(table, "transform", &scale, false);
    }
}

fn first_row(doc: &Document, table: NodeId) -> Option<NodeId> {
    let mut current = doc.first_child(table);
    while let Some(node) = current {
        if doc.tag_name(node) == Some("tr") {
            return Some(node);
        }
        if doc.tag_name(node) == Some("table") {
            current = doc.next_sibling(node);
            continue;
        }
        current = doc.first_child(node).or_else(|| {
            let mut climb = node;
            loop {
                if let Some(sibling) = doc.next_sibling(climb) {
                    return Some(sibling);
                }
                climb = doc.parent(climb).filter(|p| *p != table)?;
            }
        });
    }
    None
}

/// Pixel width from the `width` attribute or inline `width`.
fn declared_width(doc: &Document, node: NodeId) -> Option<f64> {
    let inline = doc.inline_style(node);
    let raw = doc
        .attribute(node, "width")
        .map(str::to_string)
        .or_else(|| inline.get("width").map(|decl| decl.value.clone()))?;
    let raw = raw.trim();
    let number = raw.strip_suffix("px").unwrap_or(raw).trim();
    number.parse::<f64>().ok().filter(|w| w.is_finite() && *w > 0.0)
}

/// Tag elements carrying a legacy `align` attribute or an inline
/// `text-align` with an `aligned-<value>` class.
pub fn apply_text_align_classes(doc: &mut Document) {
    let body = doc.body();
    let mut targets = Vec::new();
    let mut current = doc.first_child(body);
    while let Some(node) = current {
        if doc.kind(node) == NodeKind::Element {
            let align = doc
                .attribute(node, "align")
                .map(|a| a.trim().to_ascii_lowercase())
                .or_else(|| {
                    doc.inline_style(node)
                        .get("text-align")
                        .map(|decl| decl.value.trim().to_ascii_lowercase())
                });
            if let Some(align) = align.filter(|a| ALIGNMENTS.contains(&a.as_str())) {
                targets.push((node, align));
            }
        }
        current = next_in_order(doc, node).filter(|next| is_inclusive_ancestor(doc, body, *next));
    }
    for (node, align) in targets {
        doc.add_class(node, &format!("aligned-{}", align));
    }
}

/// Replace the injected fixed-layout theme stylesheet.
pub fn apply_fixed_layout_styles(doc: &mut Document, config: &ViewConfiguration, theme: &ThemeCode) {
    if let Some(existing) = doc.element_by_id(FIXED_LAYOUT_STYLE_ID) {
        if doc.tag_name(existing) == Some("style") {
            doc.detach(existing);
        }
    }
    let Some(head) = ensure_head(doc) else {
        return;
    };
    let style = doc.create_element("style");
    doc.set_attribute(style, "id", FIXED_LAYOUT_STYLE_ID);
    let css = fixed_layout_css(config, theme);
    let text = doc.create_text(&css);
    doc.append_child(style, text);
    doc.append_child(head, style);
}

fn ensure_head(doc: &mut Document) -> Option<NodeId> {
    if let Some(head) = doc.head() {
        return Some(head);
    }
    let html = doc.document_element()?;
    let head = doc.create_element("head");
    let first = doc.first_child(html);
    doc.insert_before(html, head, first);
    Some(head)
}

fn fixed_layout_css(config: &ViewConfiguration, theme: &ThemeCode) -> String {
    let dark = theme.is_dark_mode;
    let mut image_rules = String::new();
    if config.invert_img_color_in_dark && dark {
        image_rules.push_str("\n  filter: invert(100%);");
    } else if config.override_color {
        let blend = if !dark {
            "multiply"
        } else if theme.bg.eq_ignore_ascii_case("#000000") {
            "luminosity"
        } else {
            "overlay"
        };
        image_rules.push_str("\n  mix-blend-mode: ");
        image_rules.push_str(blend);
        image_rules.push(';');
    }
    format!(
        ":root {{\n  --theme-bg-color: {bg};\n  --theme-fg-color: {fg};\n  --theme-primary-color: {primary};\n  color-scheme: {scheme};\n}}\n\
         body {{\n  position: relative;\n  background-color: var(--theme-bg-color);\n}}\n\
         #canvas {{\n  display: inline-block;\n  width: fit-content;\n  height: fit-content;\n  background-color: var(--theme-bg-color);\n}}\n\
         img, canvas {{{image_rules}\n}}\n",
        bg = theme.bg,
        fg = theme.fg,
        primary = theme.primary,
        scheme = if dark { "dark" } else { "light" },
        image_rules = image_rules,
    )
}

fn class_target(doc: &Document) -> NodeId {
    doc.document_element().unwrap_or_else(|| doc.body())
}

/// Toggle `theme-dark` / `theme-light` on the document element.
pub fn apply_theme_mode_class(doc: &mut Document, is_dark: bool) {
    let target = class_target(doc);
    let (add, remove) = if is_dark {
        ("theme-dark", "theme-light")
    } else {
        ("theme-light", "theme-dark")
    };
    doc.remove_class(target, remove);
    doc.add_class(target, add);
}

/// Toggle `scroll-mode` on the document element.
pub fn apply_scroll_mode_class(doc: &mut Document, scrolled: bool) {
    let target = class_target(doc);
    if scrolled {
        doc.add_class(target, "scroll-mode");
    } else {
        doc.remove_class(target, "scroll-mode");
    }
}
