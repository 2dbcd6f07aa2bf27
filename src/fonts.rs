//! Font family stack resolution for the generated `--serif`, `--sans-serif`
//! and `--monospace` custom properties.

use crate::config::ViewConfiguration;

/// Latin serif families in preference order.
pub const SERIF_FONTS: &[&str] = &[
    "Bitter",
    "Literata",
    "Merriweather",
    "Vollkorn",
    "Georgia",
    "Times New Roman",
];

/// Latin sans-serif families in preference order.
pub const SANS_SERIF_FONTS: &[&str] = &["Roboto", "Noto Sans", "Open Sans", "Helvetica"];

/// Monospace families in preference order.
pub const MONOSPACE_FONTS: &[&str] = &["Fira Code", "Lucida Console", "Consolas", "Courier New"];

/// CJK serif (Song/Ming/Kai) families in preference order.
pub const CJK_SERIF_FONTS: &[&str] = &[
    "LXGW WenKai GB Screen",
    "LXGW WenKai TC",
    "GuanKiapTsingKhai-T",
    "Source Han Serif CN",
    "Huiwen-mincho",
    "KingHwa_OldSong",
];

/// CJK sans-serif (Hei/Gothic) families in preference order.
pub const CJK_SANS_SERIF_FONTS: &[&str] = &["Noto Sans SC", "Noto Sans TC"];

/// Serif families pushed to the very end of the serif stack.
pub const LAST_RESORT_SERIF_FONTS: &[&str] = &["Georgia", "Times New Roman"];

/// Cross-platform substitutes appended to every stack.
pub const FALLBACK_FONTS: &[&str] = &["PingFang SC", "Microsoft YaHei", "Noto Sans CJK SC"];

/// Generic script category of a stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontCategory {
    Serif,
    SansSerif,
    Monospace,
}

impl FontCategory {
    /// CSS generic family keyword closing the stack.
    pub fn generic_keyword(self) -> &'static str {
        match self {
            Self::Serif => "serif",
            Self::SansSerif => "sans-serif",
            Self::Monospace => "monospace",
        }
    }

    /// Custom property name carrying the stack.
    pub fn custom_property(self) -> &'static str {
        match self {
            Self::Serif => "--serif",
            Self::SansSerif => "--sans-serif",
            Self::Monospace => "--monospace",
        }
    }
}

/// Resolved family stacks for one configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontStacks {
    pub serif: Vec<String>,
    pub sans_serif: Vec<String>,
    pub monospace: Vec<String>,
}

impl FontStacks {
    /// Resolve all three stacks from the configured families.
    pub fn resolve(config: &ViewConfiguration) -> Self {
        let cjk = config.default_cjk_font.trim();
        Self {
            serif: cjk_aware_stack(
                config.serif_font.trim(),
                cjk,
                SERIF_FONTS,
                CJK_SERIF_FONTS,
                true,
            ),
            sans_serif: cjk_aware_stack(
                config.sans_serif_font.trim(),
                cjk,
                SANS_SERIF_FONTS,
                CJK_SANS_SERIF_FONTS,
                false,
            ),
            monospace: monospace_stack(config.monospace_font.trim()),
        }
    }

    /// Stack for one category.
    pub fn stack(&self, category: FontCategory) -> &[String] {
        match category {
            FontCategory::Serif => &self.serif,
            FontCategory::SansSerif => &self.sans_serif,
            FontCategory::Monospace => &self.monospace,
        }
    }

    /// `font-family` value for one category: quoted families then the
    /// generic keyword.
    pub fn css_value(&self, category: FontCategory) -> String {
        let mut out = String::with_capacity(256);
        for family in self.stack(category) {
            out.push_str(&quote_family(family));
            out.push_str(", ");
        }
        out.push_str(category.generic_keyword());
        out
    }
}

fn cjk_aware_stack(
    chosen: &str,
    cjk_default: &str,
    latin: &[&str],
    cjk: &[&str],
    defer_last_resort: bool,
) -> Vec<String> {
    let mut stack = Vec::with_capacity(latin.len() + cjk.len() + FALLBACK_FONTS.len() + 2);
    push_unique(&mut stack, chosen);
    if cjk_default != chosen {
        push_unique(&mut stack, cjk_default);
    }
    for family in latin {
        if defer_last_resort && LAST_RESORT_SERIF_FONTS.contains(family) {
            continue;
        }
        if *family != chosen && *family != cjk_default {
            push_unique(&mut stack, family);
        }
    }
    for family in cjk {
        if *family != chosen && *family != cjk_default {
            push_unique(&mut stack, family);
        }
    }
    if defer_last_resort {
        for family in LAST_RESORT_SERIF_FONTS {
            if latin.contains(family) && *family != cjk_default {
                push_unique(&mut stack, family);
            }
        }
    }
    for family in FALLBACK_FONTS {
        push_unique(&mut stack, family);
    }
    stack
}

fn monospace_stack(chosen: &str) -> Vec<String> {
    let mut stack = Vec::with_capacity(MONOSPACE_FONTS.len() + FALLBACK_FONTS.len() + 1);
    push_unique(&mut stack, chosen);
    for family in MONOSPACE_FONTS {
        push_unique(&mut stack, family);
    }
    for family in FALLBACK_FONTS {
        push_unique(&mut stack, family);
    }
    stack
}

fn push_unique(stack: &mut Vec<String>, family: &str) {
    if family.is_empty() || stack.iter().any(|placed| placed == family) {
        return;
    }
    stack.push(family.to_string());
}

/// Quote a family name for use in a `font-family` list.
pub fn quote_family(family: &str) -> String {
    let mut out = String::with_capacity(family.len() + 2);
    out.push('"');
    for ch in family.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(serif: &str, sans: &str, mono: &str, cjk: &str) -> ViewConfiguration {
        ViewConfiguration {
            serif_font: serif.to_string(),
            sans_serif_font: sans.to_string(),
            monospace_font: mono.to_string(),
            default_cjk_font: cjk.to_string(),
            ..ViewConfiguration::default()
        }
    }

    #[test]
    fn serif_stack_orders_chosen_cjk_latin_cjk_last_resort_fallback() {
        let stacks = FontStacks::resolve(&config(
            "Literata",
            "Roboto",
            "Consolas",
            "LXGW WenKai GB Screen",
        ));
        assert_eq!(
            stacks.serif,
            vec![
                "Literata",
                "LXGW WenKai GB Screen",
                "Bitter",
                "Merriweather",
                "Vollkorn",
                "LXGW WenKai TC",
                "GuanKiapTsingKhai-T",
                "Source Han Serif CN",
                "Huiwen-mincho",
                "KingHwa_OldSong",
                "Georgia",
                "Times New Roman",
                "PingFang SC",
                "Microsoft YaHei",
                "Noto Sans CJK SC",
            ]
        );
    }

    #[test]
    fn cjk_default_equal_to_chosen_is_not_repeated() {
        let stacks = FontStacks::resolve(&config("Noto Sans SC", "Noto Sans SC", "Consolas", "Noto Sans SC"));
        assert_eq!(stacks.sans_serif[0], "Noto Sans SC");
        assert_eq!(
            stacks.sans_serif.iter().filter(|f| *f == "Noto Sans SC").count(),
            1
        );
        assert_eq!(stacks.sans_serif[1], "Roboto");
    }

    #[test]
    fn last_resort_serif_is_skipped_when_it_is_the_cjk_default() {
        let stacks = FontStacks::resolve(&config("Bitter", "Roboto", "Consolas", "Georgia"));
        assert_eq!(stacks.serif[0], "Bitter");
        assert_eq!(stacks.serif[1], "Georgia");
        assert_eq!(stacks.serif.iter().filter(|f| *f == "Georgia").count(), 1);
        let tnr = stacks
            .serif
            .iter()
            .position(|f| f == "Times New Roman")
            .expect("times");
        let song = stacks
            .serif
            .iter()
            .position(|f| f == "KingHwa_OldSong")
            .expect("song");
        assert!(tnr > song);
    }

    #[test]
    fn chosen_last_resort_font_stays_unique() {
        let stacks = FontStacks::resolve(&config("Georgia", "Roboto", "Consolas", "LXGW WenKai TC"));
        assert_eq!(stacks.serif[0], "Georgia");
        assert_eq!(stacks.serif.iter().filter(|f| *f == "Georgia").count(), 1);
    }

    #[test]
    fn monospace_stack_ignores_cjk_default() {
        let stacks = FontStacks::resolve(&config("Bitter", "Roboto", "Fira Code", "Noto Sans SC"));
        assert_eq!(stacks.monospace[0], "Fira Code");
        assert!(!stacks.monospace.iter().any(|f| f == "Noto Sans SC"));
        assert_eq!(stacks.monospace.iter().filter(|f| *f == "Fira Code").count(), 1);
    }

    #[test]
    fn css_value_quotes_families_and_closes_with_generic() {
        let stacks = FontStacks::resolve(&ViewConfiguration::default());
        let value = stacks.css_value(FontCategory::Monospace);
        assert!(value.starts_with("\"Consolas\", \"Fira Code\""));
        assert!(value.ends_with(", monospace"));
        assert_eq!(quote_family("A \"B\""), "\"A \\\"B\\\"\"");
    }
}
