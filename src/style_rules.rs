//! Generated stylesheet injected into every content view.
//!
//! Output order matters: layout, fonts, colors, translation overlay, then the
//! raw user stylesheet so it can override everything above. The same
//! configuration and theme always produce byte-identical text.

use core::fmt::Write;

use crate::config::ViewConfiguration;
use crate::fonts::{FontCategory, FontStacks};
use crate::theme::ThemeCode;
use crate::transform::format_number;

/// Elements treated as running paragraphs for spacing rules.
const PARAGRAPH_SELECTOR: &str = "p, li, blockquote, dd";

/// Elements that keep the monospace stack even when the font is forced.
const MONOSPACE_ELEMENTS: &[&str] = &["pre", "code", "kbd", "samp", "tt"];

/// Build the full stylesheet for a content view.
pub fn build_stylesheet(config: &ViewConfiguration, theme: &ThemeCode) -> String {
    let mut out = String::with_capacity(8 * 1024);
    out.push_str(&layout_styles(config));
    out.push_str(&font_styles(config));
    out.push_str(&color_styles(config, theme));
    out.push_str(&translation_styles(config));
    if !config.user_stylesheet.trim().is_empty() {
        out.push_str(&config.user_stylesheet);
        if !config.user_stylesheet.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Round to three decimals and print without trailing zeros.
fn num(value: f64) -> String {
    format_number((value * 1000.0).round() / 1000.0)
}

fn important(flag: bool) -> &'static str {
    if flag {
        " !important"
    } else {
        ""
    }
}

/// Margins, spacing, alignment, writing mode and zoom.
pub fn layout_styles(config: &ViewConfiguration) -> String {
    let mut out = String::with_capacity(2048);
    let force = important(config.override_layout);
    let default_align = if config.full_justification {
        "justify"
    } else {
        "start"
    };

    out.push_str("@namespace epub \"http://www.idpf.org/2007/ops\";\n");
    let _ = writeln!(
        out,
        "html {{\n  --default-text-align: {};\n  --page-margin-top: {}px;\n  --page-margin-right: {}px;\n  --page-margin-bottom: {}px;\n  --page-margin-left: {}px;\n  hanging-punctuation: allow-end last;\n  orphans: 2;\n  widows: 2;\n}}",
        default_align,
        num(config.margin_top_px),
        num(config.margin_right_px),
        num(config.margin_bottom_px),
        num(config.margin_left_px),
    );
    for align in ["left", "right", "center", "justify"] {
        let _ = writeln!(out, "[align=\"{0}\"] {{ text-align: {0}; }}", align);
    }
    out.push_str(":is(hgroup, header) p { text-align: unset; hyphens: unset; }\n");
    out.push_str("pre { white-space: pre-wrap !important; tab-size: 2; }\n");

    out.push_str("html, body {\n");
    if let Some(mode) = config.writing_mode.as_css() {
        let _ = writeln!(out, "  writing-mode: {} !important;", mode);
    }
    out.push_str("  text-align: var(--default-text-align);\n  max-height: unset;\n}\n");
    let _ = writeln!(
        out,
        "body {{\n  overflow: unset;\n  zoom: {};\n}}",
        num(config.zoom_level / 100.0)
    );
    out.push_str("svg, img { height: auto; width: auto; background-color: transparent !important; }\n");

    let indent = if config.vertical {
        config.text_indent * 1.2
    } else {
        config.text_indent
    };
    let hyphens = if config.hyphenation { "auto" } else { "manual" };
    let _ = writeln!(
        out,
        "{sel} {{\n  line-height: {lh}{f};\n  word-spacing: {ws}px{f};\n  letter-spacing: {ls}px{f};\n  text-indent: {ti}em{f};",
        sel = PARAGRAPH_SELECTOR,
        lh = num(config.line_height),
        ws = num(config.word_spacing),
        ls = num(config.letter_spacing),
        ti = num(indent),
        f = force,
    );
    if config.full_justification {
        let _ = writeln!(out, "  text-align: justify{};", force);
    }
    let _ = writeln!(
        out,
        "  -webkit-hyphens: {h};\n  hyphens: {h};\n  -webkit-hyphenate-limit-before: 3;\n  -webkit-hyphenate-limit-after: 2;\n  -webkit-hyphenate-limit-lines: 2;\n}}",
        h = hyphens,
    );

    let (before, after) = if config.vertical {
        ("margin-right", "margin-left")
    } else {
        ("margin-top", "margin-bottom")
    };
    let margin = num(config.paragraph_margin);
    let _ = writeln!(
        out,
        "p {{\n  {before}: {m}em{f};\n  {after}: {m}em{f};\n}}",
        before = before,
        after = after,
        m = margin,
        f = force,
    );

    out.push_str(":lang(zh), :lang(ja), :lang(ko) { widows: 1; orphans: 1; }\n");
    out.push_str(
        "aside[epub|type~=\"footnote\"], aside[epub|type~=\"endnote\"], aside[epub|type~=\"note\"], aside[epub|type~=\"rearnote\"] { display: none; }\n",
    );
    out.push_str(".duokan-footnote-content, .duokan-footnote-item { display: none; }\n");
    out
}

/// Font stacks, weight, minimum size and the legacy `<font size>` ladder.
pub fn font_styles(config: &ViewConfiguration) -> String {
    let stacks = FontStacks::resolve(config);
    let mut out = String::with_capacity(2048);
    let force = important(config.override_font);
    let base = config.default_font_size;
    let min = config.min_font_size;

    let _ = writeln!(
        out,
        "html {{\n  {}: {};\n  {}: {};\n  {}: {};\n  --font-weight: {};\n  --min-font-size: {}px;\n}}",
        FontCategory::Serif.custom_property(),
        stacks.css_value(FontCategory::Serif),
        FontCategory::SansSerif.custom_property(),
        stacks.css_value(FontCategory::SansSerif),
        FontCategory::Monospace.custom_property(),
        stacks.css_value(FontCategory::Monospace),
        config.font_weight,
        num(min),
    );
    let _ = writeln!(
        out,
        "html, body {{\n  font-size: {}px !important;\n  font-weight: var(--font-weight);\n  -webkit-text-size-adjust: none;\n  text-size-adjust: none;\n}}",
        num(base)
    );

    let ladder = [
        min,
        min * 1.5,
        base,
        base * 1.2,
        base * 1.5,
        base * 2.0,
        base * 3.0,
    ];
    for (idx, size) in ladder.iter().enumerate() {
        let _ = writeln!(
            out,
            "font[size=\"{}\"] {{ font-size: {}px; }}",
            idx + 1,
            num(*size)
        );
    }
    out.push_str(
        "[style*=\"font-size: 16px\"], [style*=\"font-size:16px\"] { font-size: 1rem !important; }\n",
    );

    let body_font = config.default_font.custom_property();
    let _ = writeln!(out, "body {{ font-family: var({}){}; }}", body_font, force);
    if config.override_font {
        let mut selector = String::from("body *");
        for excluded in MONOSPACE_ELEMENTS.iter().chain(&[".monospace", ".code"]) {
            let _ = write!(selector, ":not({0}):not({0} *)", excluded);
        }
        let _ = writeln!(
            out,
            "{} {{ font-family: var({}) !important; }}",
            selector, body_font
        );
    }
    let _ = writeln!(
        out,
        "{}, .monospace {{ font-family: var(--monospace){}; }}",
        MONOSPACE_ELEMENTS.join(", "),
        force
    );
    out
}

/// Theme variables, link colors and color overrides.
pub fn color_styles(config: &ViewConfiguration, theme: &ThemeCode) -> String {
    let mut out = String::with_capacity(2048);
    let dark = theme.is_dark_mode;
    let force = important(config.override_color);
    let page_bg = if config.background_texture().is_some() {
        "transparent"
    } else {
        theme.bg.as_str()
    };

    let _ = writeln!(
        out,
        "html {{\n  --theme-bg-color: {};\n  --theme-fg-color: {};\n  --theme-primary-color: {};\n  color-scheme: {};\n}}",
        theme.bg,
        theme.fg,
        theme.primary,
        if dark { "dark" } else { "light" },
    );
    let _ = writeln!(
        out,
        "html, body {{\n  color: var(--theme-fg-color);\n  background-color: {}{};\n}}",
        page_bg, force
    );
    let _ = writeln!(
        out,
        "a:any-link {{ color: var(--theme-primary-color){}; text-decoration: none; }}",
        if dark || config.override_color {
            " !important"
        } else {
            ""
        }
    );
    out.push_str(
        "[style*=\"color: black\"], [style*=\"color:black\"], [style*=\"color: #000\"], [style*=\"color:#000\"], [style*=\"color: rgb(0, 0, 0)\"], [style*=\"color:rgb(0,0,0)\"] { color: var(--theme-fg-color) !important; }\n",
    );
    if dark {
        out.push_str(
            ".calibre, .calibre1, .calibre2, body.pbg, .mbppagebreak { color: unset; background-color: unset; }\n",
        );
        out.push_str("blockquote, table, th, td, hr { border-color: var(--theme-fg-color); }\n");
    }
    if config.override_color {
        out.push_str(
            "body *:not(a):not(a *) { color: var(--theme-fg-color) !important; background-color: transparent !important; border-color: var(--theme-fg-color) !important; }\n",
        );
    }
    if dark && config.invert_img_color_in_dark {
        out.push_str("img { filter: invert(100%); }\n");
    } else if !dark && config.override_color {
        out.push_str("img { mix-blend-mode: multiply; }\n");
    }
    if config.is_eink {
        out.push_str(
            "::selection { color: var(--theme-bg-color); background-color: var(--theme-fg-color); }\n",
        );
        out.push_str("* { text-shadow: none !important; box-shadow: none !important; }\n");
    }
    out
}

/// Display rules for inline translation overlays.
pub fn translation_styles(config: &ViewConfiguration) -> String {
    let mut out = String::with_capacity(512);
    out.push_str(".translation-target { display: block; margin-top: 0.5em; }\n");
    out.push_str(".translation-target.hidden { display: none !important; }\n");
    out.push_str(".translation-target-inline { display: inline; margin-top: 0; }\n");
    if !config.show_translation_source {
        out.push_str(
            ".translation-source:has(~ .translation-target:not(.hidden)) { display: none !important; }\n",
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefaultFont, WritingMode};

    #[test]
    fn sections_come_in_order_with_user_css_last() {
        let config = ViewConfiguration {
            user_stylesheet: "p { color: red }".to_string(),
            ..ViewConfiguration::default()
        };
        let css = build_stylesheet(&config, &ThemeCode::default());
        let layout = css.find("--default-text-align").expect("layout");
        let fonts = css.find("--serif:").expect("fonts");
        let colors = css.find("--theme-bg-color:").expect("colors");
        let translation = css.find(".translation-target").expect("translation");
        let user = css.find("p { color: red }").expect("user");
        assert!(layout < fonts && fonts < colors && colors < translation && translation < user);
        assert!(css.ends_with("p { color: red }\n"));
    }

    #[test]
    fn legacy_font_size_ladder() {
        let config = ViewConfiguration {
            default_font_size: 20.0,
            min_font_size: 10.0,
            ..ViewConfiguration::default()
        };
        let css = font_styles(&config);
        for (size, px) in [
            (1, "10px"),
            (2, "15px"),
            (3, "20px"),
            (4, "24px"),
            (5, "30px"),
            (6, "40px"),
            (7, "60px"),
        ] {
            let rule = format!("font[size=\"{}\"] {{ font-size: {}; }}", size, px);
            assert!(css.contains(&rule), "missing {}", rule);
        }
        assert!(css.contains("[style*=\"font-size: 16px\"], [style*=\"font-size:16px\"] { font-size: 1rem !important; }"));
    }

    #[test]
    fn override_font_forces_body_font_but_spares_code() {
        let config = ViewConfiguration {
            override_font: true,
            default_font: DefaultFont::SansSerif,
            ..ViewConfiguration::default()
        };
        let css = font_styles(&config);
        assert!(css.contains("body { font-family: var(--sans-serif) !important; }"));
        assert!(css.contains(
            "body *:not(pre):not(pre *):not(code):not(code *):not(kbd):not(kbd *):not(samp):not(samp *):not(tt):not(tt *):not(.monospace):not(.monospace *):not(.code):not(.code *) { font-family: var(--sans-serif) !important; }"
        ));
        assert!(css.contains("pre, code, kbd, samp, tt, .monospace { font-family: var(--monospace) !important; }"));

        let relaxed = font_styles(&ViewConfiguration::default());
        assert!(relaxed.contains("body { font-family: var(--serif); }"));
        assert!(!relaxed.contains("body *:not"));
    }

    #[test]
    fn forced_font_spares_descendants_of_code_blocks() {
        let config = ViewConfiguration {
            override_font: true,
            ..ViewConfiguration::default()
        };
        let css = font_styles(&config);
        let forced = css
            .lines()
            .find(|line| line.starts_with("body *"))
            .expect("forced font rule");
        for excluded in ["pre", "code", "kbd", "samp", "tt", ".monospace", ".code"] {
            assert!(forced.contains(&format!(":not({} *)", excluded)), "{}", excluded);
        }
    }

    #[test]
    fn layout_honors_override_and_vertical_text() {
        let config = ViewConfiguration {
            override_layout: true,
            vertical: true,
            writing_mode: WritingMode::VerticalRl,
            text_indent: 2.0,
            line_height: 1.8,
            ..ViewConfiguration::default()
        };
        let css = layout_styles(&config);
        assert!(css.contains("writing-mode: vertical-rl !important;"));
        assert!(css.contains("line-height: 1.8 !important;"));
        assert!(css.contains("text-indent: 2.4em !important;"));
        assert!(css.contains("margin-right: 1em !important;"));
        assert!(css.contains("--page-margin-top: 44px;"));
    }

    #[test]
    fn texture_makes_page_background_transparent() {
        let config = ViewConfiguration {
            background_texture_id: Some("paper".to_string()),
            ..ViewConfiguration::default()
        };
        let css = color_styles(&config, &ThemeCode::default());
        assert!(css.contains("background-color: transparent;"));
        let plain = color_styles(&ViewConfiguration::default(), &ThemeCode::default());
        assert!(plain.contains("background-color: #ffffff;"));
    }

    #[test]
    fn eink_and_translation_toggles() {
        let config = ViewConfiguration {
            is_eink: true,
            show_translation_source: false,
            ..ViewConfiguration::default()
        };
        assert!(color_styles(&config, &ThemeCode::default()).contains("::selection"));
        assert!(translation_styles(&config).contains(".translation-source"));
        assert!(!translation_styles(&ViewConfiguration::default()).contains(".translation-source"));
    }
}
