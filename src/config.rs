//! Immutable view configuration snapshot and platform signals.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorPhase};

/// Which generic family drives body text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultFont {
    /// Body text uses the `--serif` stack.
    #[default]
    #[serde(rename = "Serif", alias = "serif")]
    Serif,
    /// Body text uses the `--sans-serif` stack.
    #[serde(rename = "Sans-serif", alias = "sans-serif", alias = "SansSerif")]
    SansSerif,
}

impl DefaultFont {
    /// Custom property holding the effective body stack.
    pub fn custom_property(self) -> &'static str {
        match self {
            Self::Serif => "--serif",
            Self::SansSerif => "--sans-serif",
        }
    }
}

/// Requested document writing mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritingMode {
    /// Keep whatever the content declares.
    #[default]
    Auto,
    /// Horizontal lines, top to bottom.
    HorizontalTb,
    /// Vertical lines, right to left.
    VerticalRl,
    /// Vertical lines, left to right.
    VerticalLr,
}

impl WritingMode {
    /// CSS keyword, or `None` for [`WritingMode::Auto`].
    pub fn as_css(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::HorizontalTb => Some("horizontal-tb"),
            Self::VerticalRl => Some("vertical-rl"),
            Self::VerticalLr => Some("vertical-lr"),
        }
    }
}

/// Device class, used only to pick the font scale factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceClass {
    /// Phones and tablets; the OS already scales text up.
    Mobile,
    /// Everything else.
    #[default]
    Desktop,
}

impl DeviceClass {
    /// Divisor applied when converting hardcoded px/pt sizes to rem.
    pub fn font_scale(self) -> f64 {
        match self {
            Self::Mobile => 1.25,
            Self::Desktop => 1.0,
        }
    }
}

/// Full snapshot of the knobs that affect generated styles.
///
/// Replaced wholesale on any settings change; consumers always pass the
/// complete snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewConfiguration {
    pub serif_font: String,
    pub sans_serif_font: String,
    pub monospace_font: String,
    pub default_font: DefaultFont,
    #[serde(rename = "defaultCJKFont", alias = "defaultCjkFont")]
    pub default_cjk_font: String,
    /// Base font size in px.
    pub default_font_size: f64,
    /// Readability floor in px.
    pub min_font_size: f64,
    pub font_weight: u16,
    pub override_font: bool,
    pub override_color: bool,
    pub override_layout: bool,
    pub margin_top_px: f64,
    pub margin_right_px: f64,
    pub margin_bottom_px: f64,
    pub margin_left_px: f64,
    /// Paragraph spacing in em.
    pub paragraph_margin: f64,
    /// Unitless line height multiplier.
    pub line_height: f64,
    /// Word spacing in px.
    pub word_spacing: f64,
    /// Letter spacing in px.
    pub letter_spacing: f64,
    /// First-line indent in em.
    pub text_indent: f64,
    pub full_justification: bool,
    pub hyphenation: bool,
    /// Zoom in percent.
    pub zoom_level: f64,
    pub writing_mode: WritingMode,
    pub vertical: bool,
    pub is_eink: bool,
    pub invert_img_color_in_dark: bool,
    /// Background texture identifier; `None` or `"none"` disables it.
    pub background_texture_id: Option<String>,
    /// Show the original text next to translated text.
    pub show_translation_source: bool,
    /// Raw user CSS, appended last.
    pub user_stylesheet: String,
}

impl Default for ViewConfiguration {
    fn default() -> Self {
        Self {
            serif_font: "Bitter".to_string(),
            sans_serif_font: "Roboto".to_string(),
            monospace_font: "Consolas".to_string(),
            default_font: DefaultFont::Serif,
            default_cjk_font: "LXGW WenKai GB Screen".to_string(),
            default_font_size: 16.0,
            min_font_size: 8.0,
            font_weight: 400,
            override_font: false,
            override_color: false,
            override_layout: false,
            margin_top_px: 44.0,
            margin_right_px: 16.0,
            margin_bottom_px: 44.0,
            margin_left_px: 16.0,
            paragraph_margin: 1.0,
            line_height: 1.6,
            word_spacing: 0.0,
            letter_spacing: 0.0,
            text_indent: 0.0,
            full_justification: true,
            hyphenation: true,
            zoom_level: 100.0,
            writing_mode: WritingMode::Auto,
            vertical: false,
            is_eink: false,
            invert_img_color_in_dark: false,
            background_texture_id: None,
            show_translation_source: true,
            user_stylesheet: String::new(),
        }
    }
}

impl ViewConfiguration {
    /// Decode a snapshot handed over by the persistence layer.
    ///
    /// Missing keys take their defaults; unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|err| {
            EngineError::new(
                ErrorPhase::Config,
                "CONFIG_DECODE",
                format!("Failed to decode view configuration: {}", err),
            )
            .with_source("view configuration json")
            .with_value(format!("line {} column {}", err.line(), err.column()))
            .with_offset(line_column_offset(json, err.line(), err.column()))
        })
    }

    /// Active background texture id, ignoring the `"none"` sentinel.
    pub fn background_texture(&self) -> Option<&str> {
        self.background_texture_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("none"))
    }
}

fn line_column_offset(text: &str, line: usize, column: usize) -> usize {
    let mut offset = 0usize;
    for (idx, raw_line) in text.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            return offset + column.saturating_sub(1).min(raw_line.len());
        }
        offset += raw_line.len();
    }
    text.len()
}

/// Limits for content block segmentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmenterLimits {
    /// Element nodes processed between cooperative yields.
    pub batch_size: usize,
    /// Hard cap on collected blocks.
    pub max_blocks: usize,
}

impl Default for SegmenterLimits {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_blocks: 5000,
        }
    }
}
