//! Rewrite pass over third-party CSS before it is injected into a reading
//! view.
//!
//! Publisher stylesheets assume a browser page, not a paginated reader: fixed
//! pixel font sizes, viewport units, black text on an assumed white page,
//! print bleed hints. Each pass below patches one of those assumptions. Every
//! pass only adds or rewrites declarations whose trigger it also removes, so
//! running the whole transform twice is the same as running it once.

use std::collections::BTreeMap;

use crate::config::DeviceClass;
use crate::css::{
    is_inline_style, parse_inline_style, parse_stylesheet, Declaration, DeclarationBlock,
    StyleRule,
};

/// Declaration appended to simulate a hard page break in continuous flow.
pub const PAGE_BREAK_MARGIN: &str = "calc(var(--available-height) * 1px)";

/// Lower readability bound wrapped around rewritten font sizes.
const MIN_FONT_SIZE_VAR: &str = "var(--min-font-size, 8px)";

/// Absolute-size keywords and their rem equivalents.
const NAMED_FONT_SIZES: &[(&str, &str)] = &[
    ("xx-small", "0.6rem"),
    ("x-small", "0.75rem"),
    ("small", "0.875rem"),
    ("medium", "1rem"),
    ("large", "1.2rem"),
    ("x-large", "1.5rem"),
    ("xx-large", "2rem"),
    ("xxx-large", "3rem"),
];

const USER_SELECT_PROPERTIES: &[&str] = &[
    "user-select",
    "-webkit-user-select",
    "-moz-user-select",
    "-ms-user-select",
    "-khtml-user-select",
];

const BLACK_LITERALS: &[&str] = &["black", "#000", "#000000", "rgb(0,0,0)"];

/// Page edge a bleed hint can extend past.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    const ALL: [Edge; 4] = [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left];

    fn keyword(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Left => "left",
        }
    }
}

/// CSS sanitizer parameterized by device class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StylesheetTransformer {
    device: DeviceClass,
}

impl StylesheetTransformer {
    /// Transformer for a device class.
    pub fn new(device: DeviceClass) -> Self {
        Self { device }
    }

    /// Device class in use.
    pub fn device(&self) -> DeviceClass {
        self.device
    }

    /// Rewrite `css` for a viewport of `viewport_width` x `viewport_height`
    /// CSS pixels.
    ///
    /// Text without any `{` is treated as an inline `style` attribute body and
    /// only receives the page-break shim and the value substitutions.
    pub fn transform(
        &self,
        css: &str,
        viewport_width: f64,
        viewport_height: f64,
        is_vertical: bool,
    ) -> String {
        let values = ValueContext {
            font_scale: self.device.font_scale(),
            viewport_width,
            viewport_height,
        };
        if is_inline_style(css) {
            let mut decls = parse_inline_style(css);
            simulate_page_break(&mut decls);
            substitute_values(&mut decls, &values);
            return decls.to_inline_css();
        }

        let mut sheet = parse_stylesheet(css);
        sheet.for_each_rule_mut(|rule| {
            harden_centered_alignment(&mut rule.declarations);
            clip_nowrap_overflow(&mut rule.declarations);
            simulate_page_break(&mut rule.declarations);
            if !is_vertical {
                apply_bleed(&mut rule.declarations, viewport_width, viewport_height);
            }
            unset_body_generic_font(rule);
        });
        sheet.for_each_property_block_mut(|decls| substitute_values(decls, &values));
        sheet.to_css()
    }
}

/// Rewrite third-party CSS with desktop font scaling.
pub fn transform_stylesheet(
    css: &str,
    viewport_width: f64,
    viewport_height: f64,
    is_vertical: bool,
) -> String {
    StylesheetTransformer::default().transform(css, viewport_width, viewport_height, is_vertical)
}

/// Per-fragment cache of transformed stylesheets.
///
/// Re-transforming is idempotent but wasteful; a fragment's CSS is rewritten
/// once per viewport and writing direction.
#[derive(Clone, Debug, Default)]
pub struct TransformCache {
    transformer: StylesheetTransformer,
    entries: BTreeMap<CacheKey, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct CacheKey {
    href: String,
    viewport_width: u64,
    viewport_height: u64,
    is_vertical: bool,
}

impl TransformCache {
    /// Empty cache using `transformer`.
    pub fn new(transformer: StylesheetTransformer) -> Self {
        Self {
            transformer,
            entries: BTreeMap::new(),
        }
    }

    /// Transformed text for fragment `href`, computing it on first use.
    pub fn get_or_transform(
        &mut self,
        href: &str,
        css: &str,
        viewport_width: f64,
        viewport_height: f64,
        is_vertical: bool,
    ) -> &str {
        let key = CacheKey {
            href: href.to_string(),
            viewport_width: viewport_width.to_bits(),
            viewport_height: viewport_height.to_bits(),
            is_vertical,
        };
        let transformer = self.transformer;
        self.entries.entry(key).or_insert_with(|| {
            log::debug!("transforming stylesheet for {}", href);
            transformer.transform(css, viewport_width, viewport_height, is_vertical)
        })
    }

    /// Drop every cached entry for fragment `href`.
    pub fn invalidate(&mut self, href: &str) {
        self.entries.retain(|key, _| key.href != href);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Centered headings with a zero indent lose to renderer defaults unless both
/// declarations win outright.
fn harden_centered_alignment(decls: &mut DeclarationBlock) {
    let centered = decls
        .get("text-align")
        .is_some_and(|decl| decl.value_is("center"));
    let zero_indent = decls
        .get("text-indent")
        .is_some_and(|decl| is_zero_length(&decl.value));
    if !(centered && zero_indent) {
        return;
    }
    for decl in decls.iter_mut() {
        if (decl.name == "text-align" && decl.value_is("center"))
            || (decl.name == "text-indent" && is_zero_length(&decl.value))
        {
            decl.important = true;
        }
    }
}

fn is_zero_length(value: &str) -> bool {
    let value = value.trim();
    let unit_start = value
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(unit_start);
    let Some(fraction) = number.strip_prefix('0') else {
        return false;
    };
    let zero_fraction = fraction.is_empty()
        || fraction
            .strip_prefix('.')
            .is_some_and(|zeros| !zeros.is_empty() && zeros.bytes().all(|b| b == b'0'));
    zero_fraction && matches!(unit.to_ascii_lowercase().as_str(), "" | "px" | "em" | "rem" | "%")
}

fn clip_nowrap_overflow(decls: &mut DeclarationBlock) {
    let nowrap = decls
        .get("white-space")
        .is_some_and(|decl| decl.value_is("nowrap"));
    if nowrap && !decls.contains("overflow") && !decls.contains("overflow-x") {
        decls.push(Declaration::new("overflow", "clip", true));
    }
}

fn simulate_page_break(decls: &mut DeclarationBlock) {
    let breaks = decls
        .get("page-break-after")
        .is_some_and(|decl| decl.value_is("always"));
    if breaks && !decls.contains("margin-bottom") {
        decls.push(Declaration::new("margin-bottom", PAGE_BREAK_MARGIN, false));
    }
}

fn bleed_edges(decls: &DeclarationBlock) -> [bool; 4] {
    let mut edges = [false; 4];
    let Some(hint) = decls.get("duokan-bleed") else {
        return edges;
    };
    let value = hint.value.to_ascii_lowercase();
    for (slot, edge) in edges.iter_mut().zip(Edge::ALL) {
        *slot = value.contains(edge.keyword());
    }
    edges
}

fn apply_bleed(decls: &mut DeclarationBlock, viewport_width: f64, viewport_height: f64) {
    let edges = bleed_edges(decls);
    if !edges.iter().any(|present| *present) {
        return;
    }
    for (present, edge) in edges.iter().zip(Edge::ALL) {
        let margin = format!("margin-{}", edge.keyword());
        if *present && !decls.contains(&margin) {
            decls.push(Declaration::new(
                margin,
                format!("calc(-1 * var(--page-margin-{}))", edge.keyword()),
                true,
            ));
        }
    }
    let [top, right, bottom, left] = edges;
    if left && right && !decls.contains("width") {
        let full = format!("{}px", format_number(viewport_width));
        decls.set("width", full.clone(), true);
        decls.set("max-width", full, true);
    }
    if top && bottom && !decls.contains("height") {
        let full = format!("{}px", format_number(viewport_height));
        decls.set("height", full.clone(), true);
        decls.set("max-height", full, true);
    }
    for (name, value) in [
        ("position", "relative"),
        ("overflow", "hidden"),
        ("display", "flow-root"),
    ] {
        if !decls.contains(name) {
            decls.push(Declaration::new(name, value, true));
        }
    }
}

/// A body forced to a bare generic family would defeat the reader's own
/// font cascade.
fn unset_body_generic_font(rule: &mut StyleRule) {
    if !rule.targets_type("body") {
        return;
    }
    for decl in rule.declarations.iter_mut() {
        if decl.name == "font-family" && (decl.value_is("serif") || decl.value_is("sans-serif")) {
            decl.value = "unset".to_string();
        }
    }
}

struct ValueContext {
    font_scale: f64,
    viewport_width: f64,
    viewport_height: f64,
}

fn substitute_values(decls: &mut DeclarationBlock, ctx: &ValueContext) {
    for decl in decls.iter_mut() {
        if let Some(converted) =
            convert_viewport_units(&decl.value, ctx.viewport_width, ctx.viewport_height)
        {
            decl.value = converted;
        }
        let name = decl.name.as_str();
        if name == "font-size" {
            if let Some(size) = rewrite_font_size(&decl.value, ctx.font_scale) {
                decl.value = size;
            }
        } else if USER_SELECT_PROPERTIES.contains(&name) {
            if decl.value_is("none") {
                decl.value = "unset".to_string();
            }
        } else if name == "font-family" {
            if let Some(rest) = strip_leading_monospace(&decl.value) {
                decl.value = format!("var(--monospace){}", rest);
            }
        } else if name == "font-weight" {
            if decl.value_is("normal") {
                decl.value = "var(--font-weight)".to_string();
            }
        } else if name == "color" && is_black_literal(&decl.value) {
            decl.value = "var(--theme-fg-color)".to_string();
        }
    }
}

fn rewrite_font_size(value: &str, font_scale: f64) -> Option<String> {
    let trimmed = value.trim();
    let lower = trimmed.to_ascii_lowercase();
    if let Some((_, rem)) = NAMED_FONT_SIZES.iter().find(|(name, _)| *name == lower) {
        return Some(clamp_font_size(rem));
    }
    let (number, unit) = split_number_prefix(&lower)?;
    let parsed: f64 = number.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    match unit {
        "px" => Some(clamp_font_size(&format!(
            "{}rem",
            format_number(parsed / font_scale / 16.0)
        ))),
        "pt" => Some(clamp_font_size(&format!(
            "{}rem",
            format_number(parsed / font_scale / 12.0)
        ))),
        "" => Some(clamp_font_size(&format!("{}px", number))),
        "rem" | "em" | "%" => Some(clamp_font_size(&format!("{}{}", number, unit))),
        _ => None,
    }
}

fn clamp_font_size(size: &str) -> String {
    format!("max({}, {})", size, MIN_FONT_SIZE_VAR)
}

/// Split `\d*\.?\d+` off the front of `value`, returning the number text and
/// whatever follows.
fn split_number_prefix(value: &str) -> Option<(&str, &str)> {
    let bytes = value.as_bytes();
    let end = scan_number(bytes, 0)?;
    Some((&value[..end], &value[end..]))
}

/// End of a `\d*\.?\d+` run starting at `start`.
fn scan_number(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let int_digits = idx - start;
    if idx + 1 < bytes.len() && bytes[idx] == b'.' && bytes[idx + 1].is_ascii_digit() {
        idx += 1;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        return Some(idx);
    }
    (int_digits > 0).then_some(idx)
}

/// Replace `<n>vw` / `<n>vh` with absolute pixels. Quoted strings and
/// `url()` arguments are left alone. `None` when nothing changed.
fn convert_viewport_units(value: &str, viewport_width: f64, viewport_height: f64) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    if !lower.contains("vw") && !lower.contains("vh") {
        return None;
    }
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len() + 8);
    let mut copied = 0usize;
    let mut changed = false;
    let mut idx = 0usize;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b == b'"' || b == b'\'' {
            idx = skip_quoted(bytes, idx);
            continue;
        }
        if lower.as_bytes()[idx..].starts_with(b"url(") {
            idx = bytes[idx..]
                .iter()
                .position(|&c| c == b')')
                .map_or(bytes.len(), |close| idx + close + 1);
            continue;
        }
        let starts_number = (b.is_ascii_digit() || b == b'.')
            && (idx == 0 || !is_word_byte(bytes[idx - 1]));
        if !starts_number {
            idx += 1;
            continue;
        }
        let Some(end) = scan_number(bytes, idx) else {
            idx += 1;
            continue;
        };
        let unit = lower.get(end..end + 2);
        let dimension = match unit {
            Some("vw") => Some(viewport_width),
            Some("vh") => Some(viewport_height),
            _ => None,
        };
        let unit_ends_word = bytes.get(end + 2).is_none_or(|&c| !is_word_byte(c));
        match (dimension, value[idx..end].parse::<f64>()) {
            (Some(dimension), Ok(number)) if unit_ends_word => {
                out.push_str(&value[copied..idx]);
                out.push_str(&format_number(number * dimension / 100.0));
                out.push_str("px");
                copied = end + 2;
                idx = end + 2;
                changed = true;
            }
            _ => idx = end,
        }
    }
    if !changed {
        return None;
    }
    out.push_str(&value[copied..]);
    Some(out)
}

fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b if b == quote => return idx + 1,
            _ => idx += 1,
        }
    }
    bytes.len()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'#'
}

fn strip_leading_monospace(value: &str) -> Option<&str> {
    let (first, rest) = match value.find(',') {
        Some(comma) => (&value[..comma], &value[comma..]),
        None => (value, ""),
    };
    let first = first.trim().trim_matches('"').trim_matches('\'');
    first.eq_ignore_ascii_case("monospace").then_some(rest)
}

fn is_black_literal(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .map(|ch| ch.to_ascii_lowercase())
        .collect();
    BLACK_LITERALS.contains(&compact.as_str())
}

/// Shortest round-trip decimal form, matching how browsers print numbers.
pub(crate) fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}
