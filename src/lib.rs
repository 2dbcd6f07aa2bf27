//! Styling and paragraph navigation engine for EPUB reading views.
//!
//! The crate turns an immutable [`ViewConfiguration`] and a resolved
//! [`ThemeCode`] into the stylesheet injected into every content document,
//! sanitizes publisher CSS so it cooperates with paginated layout, and splits
//! a loaded document into an ordered list of navigable content blocks.
//!
//! ```
//! use epub_restyle::{build_stylesheet, ThemeMode, ThemeResolver, ViewConfiguration};
//!
//! let mut themes = ThemeResolver::new();
//! let theme = themes.resolve("default", ThemeMode::Dark, false);
//! let css = build_stylesheet(&ViewConfiguration::default(), &theme);
//! assert!(css.contains("color-scheme: dark"));
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod config;
pub mod css;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod postprocess;
pub mod range;
pub mod segmenter;
pub mod style_rules;
pub mod theme;
pub mod transform;

pub use config::{DefaultFont, DeviceClass, SegmenterLimits, ViewConfiguration, WritingMode};
pub use css::{parse_stylesheet, Stylesheet};
pub use dom::{Document, DocumentTree, NodeId, NodeKind};
pub use error::{EngineError, EngineErrorContext, ErrorPhase, ParseThemeModeError, RangeError};
pub use fonts::{FontCategory, FontStacks};
pub use postprocess::{
    apply_fixed_layout_styles, apply_image_style, apply_scroll_mode_class, apply_table_style,
    apply_text_align_classes, apply_theme_mode_class,
};
pub use range::{BoundaryPoint, DocRange};
#[cfg(feature = "async")]
pub use segmenter::{build_content_blocks, build_content_blocks_with_cancel};
pub use segmenter::{
    build_content_blocks_blocking, BuildStatus, CancelToken, ContentBlockBuilder, ContentBlocks,
    NeverCancel,
};
pub use style_rules::build_stylesheet;
pub use theme::{
    CustomTheme, MixPaletteGenerator, Palette, PaletteGenerator, ThemeCode, ThemeColors,
    ThemeMode, ThemeResolver,
};
pub use transform::{transform_stylesheet, StylesheetTransformer, TransformCache};
