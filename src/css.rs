//! Tolerant CSS rule-list parser and serializer.
//!
//! Third-party stylesheets are frequently broken: unbalanced braces, stray
//! semicolons, unterminated strings, HTML comment wrappers. The parser never
//! fails. It recovers the way browsers do (a block left open runs to the end of
//! input, a prelude with no block is dropped) and hands back an editable list
//! of rules whose declarations can be rewritten and serialized again.
//!
//! Comments are discarded. Serializing a parsed sheet and parsing the result
//! again yields the same structure, which is what makes rewrite passes
//! idempotent.

use core::fmt::{self, Write};
use smallvec::SmallVec;

/// Deepest at-rule nesting that is parsed structurally; anything deeper is
/// kept verbatim.
const MAX_NESTING: usize = 32;

/// At-rules whose block holds a nested rule list.
const NESTED_RULE_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "-moz-document",
    "layer",
    "container",
    "scope",
    "starting-style",
];

/// At-rules whose block holds declarations.
const DECLARATION_AT_RULES: &[&str] = &[
    "font-face",
    "page",
    "viewport",
    "-ms-viewport",
    "counter-style",
    "font-palette-values",
    "property",
];

/// Single `name: value [!important]` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Property name, ASCII-lowercased unless it is a custom property.
    pub name: String,
    /// Value text with the importance marker removed.
    pub value: String,
    /// Whether the declaration carried `!important`.
    pub important: bool,
}

impl Declaration {
    /// Build a declaration.
    pub fn new(name: impl Into<String>, value: impl Into<String>, important: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            important,
        }
    }

    /// Case-insensitive value comparison ignoring surrounding whitespace.
    pub fn value_is(&self, expected: &str) -> bool {
        self.value.trim().eq_ignore_ascii_case(expected)
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)?;
        if self.important {
            f.write_str(" !important")?;
        }
        Ok(())
    }
}

/// Ordered declaration list of one block or inline `style` attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclarationBlock {
    items: SmallVec<[Declaration; 4]>,
}

impl DeclarationBlock {
    /// Empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the block holds no declarations.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate declarations in source order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.items.iter()
    }

    /// Iterate declarations mutably in source order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Declaration> {
        self.items.iter_mut()
    }

    /// Last declaration for `name` (the one that wins the cascade).
    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.items
            .iter()
            .rev()
            .find(|decl| decl.name.eq_ignore_ascii_case(name))
    }

    /// Whether any declaration for `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether any declaration name satisfies `pred`.
    pub fn any_name(&self, pred: impl Fn(&str) -> bool) -> bool {
        self.items.iter().any(|decl| pred(&decl.name))
    }

    /// Append a declaration.
    pub fn push(&mut self, decl: Declaration) {
        self.items.push(decl);
    }

    /// Replace every declaration of `name` with a single one at the position
    /// of the first, or append when absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>, important: bool) {
        let value = value.into();
        let mut first = None;
        let mut idx = 0usize;
        self.items.retain(|decl| {
            let keep = if decl.name.eq_ignore_ascii_case(name) {
                if first.is_none() {
                    first = Some(idx);
                    true
                } else {
                    false
                }
            } else {
                true
            };
            idx += 1;
            keep
        });
        match first {
            Some(pos) => {
                let decl = &mut self.items[pos];
                decl.value = value;
                decl.important = important;
            }
            None => self.items.push(Declaration::new(name, value, important)),
        }
    }

    /// Remove every declaration of `name`.
    pub fn remove(&mut self, name: &str) {
        self.items.retain(|decl| !decl.name.eq_ignore_ascii_case(name));
    }

    /// Serialize as the body of an inline `style` attribute.
    pub fn to_inline_css(&self) -> String {
        let mut out = String::with_capacity(self.items.len() * 24);
        for (idx, decl) in self.items.iter().enumerate() {
            if idx > 0 {
                out.push_str("; ");
            }
            let _ = write!(out, "{}", decl);
        }
        out
    }
}

impl FromIterator<Declaration> for DeclarationBlock {
    fn from_iter<T: IntoIterator<Item = Declaration>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// `selector { declarations }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRule {
    /// Selector list text, trimmed.
    pub selector: String,
    /// Declarations in source order.
    pub declarations: DeclarationBlock,
}

impl StyleRule {
    /// Whether any selector in the list targets the `tag` type selector.
    pub fn targets_type(&self, tag: &str) -> bool {
        selector_targets_type(&self.selector, tag)
    }
}

/// Body of an at-rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AtRuleBody {
    /// Statement at-rule terminated by `;` (`@import`, `@charset`).
    Statement,
    /// Conditional group holding nested rules (`@media`, `@supports`).
    Rules(Vec<CssItem>),
    /// Descriptor block (`@font-face`, `@page`).
    Declarations(DeclarationBlock),
    /// Anything else (`@keyframes`), kept verbatim.
    Raw(String),
}

/// `@name prelude body`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtRule {
    /// Lowercased name without the `@`.
    pub name: String,
    /// Prelude text, trimmed.
    pub prelude: String,
    /// Parsed body.
    pub body: AtRuleBody,
}

/// Top-level or nested stylesheet item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CssItem {
    /// Qualified style rule.
    Rule(StyleRule),
    /// At-rule.
    AtRule(AtRule),
}

/// Parsed stylesheet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stylesheet {
    /// Items in source order.
    pub items: Vec<CssItem>,
}

impl Stylesheet {
    /// Number of top-level items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the sheet has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Visit every style rule, descending into conditional group rules.
    pub fn for_each_rule_mut<F: FnMut(&mut StyleRule)>(&mut self, mut f: F) {
        visit_rules_mut(&mut self.items, &mut f);
    }

    /// Visit every declaration block that holds ordinary properties: style
    /// rules and `@page` blocks, including those nested in group rules.
    pub fn for_each_property_block_mut<F: FnMut(&mut DeclarationBlock)>(&mut self, mut f: F) {
        visit_property_blocks_mut(&mut self.items, &mut f);
    }

    /// Serialize back to CSS text.
    pub fn to_css(&self) -> String {
        let mut out = String::with_capacity(self.items.len() * 64);
        write_items(&mut out, &self.items, 0);
        out
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

fn visit_rules_mut<F: FnMut(&mut StyleRule)>(items: &mut [CssItem], f: &mut F) {
    for item in items {
        match item {
            CssItem::Rule(rule) => f(rule),
            CssItem::AtRule(AtRule {
                body: AtRuleBody::Rules(nested),
                ..
            }) => visit_rules_mut(nested, f),
            CssItem::AtRule(_) => {}
        }
    }
}

fn visit_property_blocks_mut<F: FnMut(&mut DeclarationBlock)>(items: &mut [CssItem], f: &mut F) {
    for item in items {
        match item {
            CssItem::Rule(rule) => f(&mut rule.declarations),
            CssItem::AtRule(at) => match &mut at.body {
                AtRuleBody::Rules(nested) => visit_property_blocks_mut(nested, f),
                AtRuleBody::Declarations(decls) if at.name == "page" => f(decls),
                _ => {}
            },
        }
    }
}

fn write_items(out: &mut String, items: &[CssItem], indent: usize) {
    for item in items {
        push_indent(out, indent);
        match item {
            CssItem::Rule(rule) => {
                out.push_str(&rule.selector);
                write_declaration_block(out, &rule.declarations);
            }
            CssItem::AtRule(at) => {
                out.push('@');
                out.push_str(&at.name);
                if !at.prelude.is_empty() {
                    out.push(' ');
                    out.push_str(&at.prelude);
                }
                match &at.body {
                    AtRuleBody::Statement => out.push(';'),
                    AtRuleBody::Declarations(decls) => write_declaration_block(out, decls),
                    AtRuleBody::Raw(raw) => {
                        out.push_str(" {");
                        out.push_str(raw);
                        out.push('}');
                    }
                    AtRuleBody::Rules(nested) => {
                        out.push_str(" {\n");
                        write_items(out, nested, indent + 1);
                        push_indent(out, indent);
                        out.push('}');
                    }
                }
            }
        }
        out.push('\n');
    }
}

fn write_declaration_block(out: &mut String, decls: &DeclarationBlock) {
    out.push_str(" {");
    for decl in decls.iter() {
        let _ = write!(out, " {};", decl);
    }
    out.push_str(" }");
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

/// Parse stylesheet text. Never fails; unparseable fragments are dropped.
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    Stylesheet {
        items: parse_rule_list(css, 0, css.len(), 0),
    }
}

/// Parse the body of an inline `style` attribute.
pub fn parse_inline_style(style: &str) -> DeclarationBlock {
    parse_declarations(style)
}

/// Whether `css` is a bare declaration list rather than rule blocks.
///
/// A sheet holding only statements such as `@import` or `@charset` is not
/// inline, and braces inside strings or comments do not count as blocks.
pub fn is_inline_style(css: &str) -> bool {
    let bytes = css.as_bytes();
    let end = bytes.len();
    let mut pos = skip_ws_comments(bytes, 0, end);
    if bytes.get(pos) == Some(&b'@') {
        return false;
    }
    while pos < end {
        match bytes[pos] {
            b'{' => return false,
            b'\\' => pos += 2,
            b'"' | b'\'' => pos = skip_string(bytes, pos, end),
            b'/' if bytes.get(pos + 1) == Some(&b'*') => pos = skip_comment(bytes, pos, end),
            _ => pos += 1,
        }
    }
    true
}

fn parse_rule_list(src: &str, mut pos: usize, end: usize, depth: usize) -> Vec<CssItem> {
    let bytes = src.as_bytes();
    let mut items = Vec::with_capacity(8);
    loop {
        pos = skip_ws_comments(bytes, pos, end);
        if pos >= end {
            break;
        }
        if src[pos..end].starts_with("<!--") {
            pos += 4;
            continue;
        }
        if src[pos..end].starts_with("-->") {
            pos += 3;
            continue;
        }
        match bytes[pos] {
            b'}' | b';' => {
                pos += 1;
            }
            b'@' => {
                let (item, next) = parse_at_rule(src, pos, end, depth);
                if let Some(item) = item {
                    items.push(item);
                }
                pos = next;
            }
            _ => {
                let prelude_end = find_top_level(bytes, pos, end, b"{");
                if prelude_end >= end {
                    break;
                }
                let (content_end, next) = find_block_end(bytes, prelude_end + 1, end);
                let selector = strip_comments(&src[pos..prelude_end]);
                let selector = selector.trim();
                if !selector.is_empty() {
                    items.push(CssItem::Rule(StyleRule {
                        selector: selector.to_string(),
                        declarations: parse_declarations(&src[prelude_end + 1..content_end]),
                    }));
                }
                pos = next;
            }
        }
    }
    items
}

fn parse_at_rule(src: &str, start: usize, end: usize, depth: usize) -> (Option<CssItem>, usize) {
    let bytes = src.as_bytes();
    let mut pos = start + 1;
    while pos < end && is_ident_byte(bytes[pos]) {
        pos += 1;
    }
    let name = src[start + 1..pos].to_ascii_lowercase();
    let prelude_end = find_top_level(bytes, pos, end, b"{;}");
    let prelude = strip_comments(&src[pos..prelude_end]).trim().to_string();
    if name.is_empty() {
        let next = if prelude_end < end && bytes[prelude_end] == b'{' {
            find_block_end(bytes, prelude_end + 1, end).1
        } else {
            (prelude_end + 1).min(end)
        };
        return (None, next);
    }
    if prelude_end >= end || bytes[prelude_end] != b'{' {
        let next = if prelude_end < end && bytes[prelude_end] == b';' {
            prelude_end + 1
        } else {
            prelude_end
        };
        return (
            Some(CssItem::AtRule(AtRule {
                name,
                prelude,
                body: AtRuleBody::Statement,
            })),
            next,
        );
    }
    let (content_end, next) = find_block_end(bytes, prelude_end + 1, end);
    let content = &src[prelude_end + 1..content_end];
    let body = if NESTED_RULE_AT_RULES.contains(&name.as_str()) && depth < MAX_NESTING {
        AtRuleBody::Rules(parse_rule_list(src, prelude_end + 1, content_end, depth + 1))
    } else if DECLARATION_AT_RULES.contains(&name.as_str()) {
        AtRuleBody::Declarations(parse_declarations(content))
    } else {
        AtRuleBody::Raw(close_open_braces(&strip_comments(content)))
    };
    (Some(CssItem::AtRule(AtRule { name, prelude, body })), next)
}

fn parse_declarations(block: &str) -> DeclarationBlock {
    let bytes = block.as_bytes();
    let end = bytes.len();
    let mut decls = DeclarationBlock::new();
    let mut pos = 0usize;
    while pos < end {
        let stop = find_top_level(bytes, pos, end, b";");
        if let Some(decl) = parse_declaration(&block[pos..stop]) {
            decls.push(decl);
        }
        pos = stop + 1;
    }
    decls
}

fn parse_declaration(raw: &str) -> Option<Declaration> {
    let cleaned = strip_comments(raw);
    let text = cleaned.trim();
    if text.is_empty() {
        return None;
    }
    let colon = find_top_level(text.as_bytes(), 0, text.len(), b":");
    if colon >= text.len() {
        return None;
    }
    let name = text[..colon].trim();
    if name.is_empty() || name.bytes().any(|b| !is_ident_byte(b)) {
        return None;
    }
    let name = if name.starts_with("--") {
        name.to_string()
    } else {
        name.to_ascii_lowercase()
    };
    let (value, important) = split_important(text[colon + 1..].trim());
    if value.is_empty() && !name.starts_with("--") {
        return None;
    }
    if !is_well_formed_value(value) {
        return None;
    }
    Some(Declaration {
        name,
        value: value.to_string(),
        important,
    })
}

fn split_important(value: &str) -> (&str, bool) {
    let lower_tail = value.len().checked_sub("important".len()).and_then(|start| {
        value
            .get(start..)
            .filter(|tail| tail.eq_ignore_ascii_case("important"))
            .map(|_| start)
    });
    let Some(start) = lower_tail else {
        return (value, false);
    };
    let head = value[..start].trim_end();
    match head.strip_suffix('!') {
        Some(rest) => (rest.trim_end(), true),
        None => (value, false),
    }
}

/// Values must close every string and bracket they open so that the
/// serialized form splits back into the same declarations.
fn is_well_formed_value(value: &str) -> bool {
    let bytes = value.as_bytes();
    let end = bytes.len();
    let mut depth = 0isize;
    let mut pos = 0usize;
    while pos < end {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' | b'\'' => {
                let quote = bytes[pos];
                let close = skip_string(bytes, pos, end);
                if close > end || close == pos + 1 || bytes[close - 1] != quote {
                    return false;
                }
                pos = close;
            }
            b'{' | b'}' => return false,
            b'(' | b'[' => {
                depth += 1;
                pos += 1;
            }
            b')' | b']' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
                pos += 1;
            }
            _ => pos += 1,
        }
    }
    depth == 0
}

/// Append a `}` for every block left open inside verbatim at-rule content.
fn close_open_braces(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let end = bytes.len();
    let mut depth = 0usize;
    let mut pos = 0usize;
    while pos < end {
        match bytes[pos] {
            b'\\' => {
                pos += 2;
                continue;
            }
            b'"' | b'\'' => {
                pos = skip_string(bytes, pos, end);
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        pos += 1;
    }
    let mut out = String::with_capacity(raw.len() + depth);
    out.push_str(raw);
    for _ in 0..depth {
        out.push('}');
    }
    out
}

/// Whether any selector in a list has `tag` as the type of its subject,
/// the compound after the last combinator. `html > body.x` targets `body`,
/// `body p` does not.
pub fn selector_targets_type(selector: &str, tag: &str) -> bool {
    if tag.is_empty() {
        return false;
    }
    split_top_level(selector, b',').into_iter().any(|complex| {
        let subject = subject_compound(complex.trim());
        match subject.get(..tag.len()) {
            Some(head) if head.eq_ignore_ascii_case(tag) => subject
                .as_bytes()
                .get(tag.len())
                .is_none_or(|&b| matches!(b, b'.' | b'#' | b':' | b'[')),
            _ => false,
        }
    })
}

fn split_top_level(text: &str, separator: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let end = bytes.len();
    let mut parts = Vec::with_capacity(2);
    let mut start = 0usize;
    loop {
        let stop = find_top_level(bytes, start, end, &[separator]);
        parts.push(&text[start..stop]);
        if stop >= end {
            break;
        }
        start = stop + 1;
    }
    parts
}

/// Last compound selector of a complex selector.
fn subject_compound(complex: &str) -> &str {
    let bytes = complex.as_bytes();
    let end = bytes.len();
    let mut subject_start = 0usize;
    let mut depth = 0usize;
    let mut pos = 0usize;
    while pos < end {
        match bytes[pos] {
            b'\\' => {
                pos += 2;
                continue;
            }
            b'"' | b'\'' => {
                pos = skip_string(bytes, pos, end);
                continue;
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b if depth == 0 && (is_css_ws(b) || matches!(b, b'>' | b'+' | b'~')) => {
                subject_start = pos + 1;
            }
            _ => {}
        }
        pos += 1;
    }
    complex.get(subject_start.min(end)..).unwrap_or("")
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b >= 0x80
}

fn is_css_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0C)
}

fn skip_ws_comments(bytes: &[u8], mut pos: usize, end: usize) -> usize {
    while pos < end {
        if is_css_ws(bytes[pos]) {
            pos += 1;
        } else if bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'*') {
            pos = skip_comment(bytes, pos, end);
        } else {
            break;
        }
    }
    pos
}

fn skip_comment(bytes: &[u8], pos: usize, end: usize) -> usize {
    let mut idx = pos + 2;
    while idx + 1 < end {
        if bytes[idx] == b'*' && bytes[idx + 1] == b'/' {
            return idx + 2;
        }
        idx += 1;
    }
    end
}

fn skip_string(bytes: &[u8], pos: usize, end: usize) -> usize {
    let quote = bytes[pos];
    let mut idx = pos + 1;
    while idx < end {
        match bytes[idx] {
            b'\\' => idx += 2,
            b'\n' => return idx,
            b if b == quote => return idx + 1,
            _ => idx += 1,
        }
    }
    end
}

/// Position of the first byte in `stops` outside strings, comments and
/// bracketed groups, or `end`.
fn find_top_level(bytes: &[u8], mut pos: usize, end: usize, stops: &[u8]) -> usize {
    let mut depth = 0usize;
    while pos < end {
        let b = bytes[pos];
        if depth == 0 && stops.contains(&b) {
            return pos;
        }
        match b {
            b'\\' => {
                pos += 2;
                continue;
            }
            b'"' | b'\'' => {
                pos = skip_string(bytes, pos, end);
                continue;
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = skip_comment(bytes, pos, end);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        pos += 1;
    }
    end
}

/// `(content_end, next)` for a block whose `{` sits just before `pos`.
/// An unclosed block runs to `end`.
fn find_block_end(bytes: &[u8], mut pos: usize, end: usize) -> (usize, usize) {
    let mut depth = 1usize;
    while pos < end {
        match bytes[pos] {
            b'\\' => {
                pos += 2;
                continue;
            }
            b'"' | b'\'' => {
                pos = skip_string(bytes, pos, end);
                continue;
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = skip_comment(bytes, pos, end);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return (pos, pos + 1);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    (end, end)
}

fn strip_comments(text: &str) -> std::borrow::Cow<'_, str> {
    if !text.contains("/*") {
        return std::borrow::Cow::Borrowed(text);
    }
    let bytes = text.as_bytes();
    let end = bytes.len();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0usize;
    let mut copied = 0usize;
    while pos < end {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' | b'\'' => pos = skip_string(bytes, pos, end),
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                out.push_str(&text[copied..pos]);
                pos = skip_comment(bytes, pos, end);
                copied = pos;
            }
            _ => pos += 1,
        }
    }
    if copied < end {
        out.push_str(&text[copied.min(end)..]);
    }
    std::borrow::Cow::Owned(out)
}
