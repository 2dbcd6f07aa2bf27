//! Structured errors for the few fallible edges of the engine.
//!
//! The styling and navigation operations themselves never fail: hostile input
//! degrades to best-effort output. Errors only surface where a caller hands us
//! something it could have validated itself (a configuration snapshot, a
//! preference string) or where a boundary point cannot be placed.

use core::fmt;

/// Processing phase where an error originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Configuration snapshot decoding.
    Config,
    /// Theme preference handling.
    Theme,
    /// Document tree construction or mutation.
    Dom,
    /// Boundary point and range placement.
    Range,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Theme => "theme",
            Self::Dom => "dom",
            Self::Range => "range",
        };
        f.write_str(label)
    }
}

/// Optional context attached to an [`EngineError`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineErrorContext {
    /// Source description (config key, stylesheet href, preference name).
    pub source: Option<Box<str>>,
    /// Offending value, truncated by the caller if large.
    pub value: Option<Box<str>>,
    /// Byte offset into the source, when known.
    pub offset: Option<usize>,
}

/// Structured engine error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineError {
    /// Processing phase where this error originated.
    pub phase: ErrorPhase,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional additional context.
    pub context: Option<Box<EngineErrorContext>>,
}

impl EngineError {
    pub(crate) fn new(phase: ErrorPhase, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            phase,
            code,
            message: message.into().into_boxed_str(),
            context: None,
        }
    }

    pub(crate) fn with_source(mut self, source: impl Into<String>) -> Self {
        let ctx = self
            .context
            .get_or_insert_with(|| Box::new(EngineErrorContext::default()));
        ctx.source = Some(source.into().into_boxed_str());
        self
    }

    pub(crate) fn with_value(mut self, value: impl Into<String>) -> Self {
        let ctx = self
            .context
            .get_or_insert_with(|| Box::new(EngineErrorContext::default()));
        ctx.value = Some(value.into().into_boxed_str());
        self
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        let ctx = self
            .context
            .get_or_insert_with(|| Box::new(EngineErrorContext::default()));
        ctx.offset = Some(offset);
        self
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.phase, self.code, self.message)?;
        if let Some(ctx) = &self.context {
            if let Some(source) = ctx.source.as_deref() {
                write!(f, " [source={}]", source)?;
            }
            if let Some(value) = ctx.value.as_deref() {
                write!(f, " [value={}]", value)?;
            }
            if let Some(offset) = ctx.offset {
                write!(f, " [offset={}]", offset)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

/// Failure to place a boundary point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeError {
    /// The reference node is not attached to the document tree.
    Detached,
    /// The offset exceeds the container's length.
    OffsetOutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Container length (child count or character count).
        len: usize,
    },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => f.write_str("node is detached from the document"),
            Self::OffsetOutOfBounds { offset, len } => {
                write!(f, "offset {} exceeds container length {}", offset, len)
            }
        }
    }
}

impl std::error::Error for RangeError {}

impl From<RangeError> for EngineError {
    fn from(err: RangeError) -> Self {
        EngineError::new(ErrorPhase::Range, "RANGE_BOUNDARY", err.to_string())
    }
}

/// Unrecognized light/dark mode preference string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseThemeModeError {
    pub(crate) raw: Box<str>,
}

impl fmt::Display for ParseThemeModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown theme mode {:?} (expected light, dark or auto)",
            self.raw
        )
    }
}

impl std::error::Error for ParseThemeModeError {}

impl From<ParseThemeModeError> for EngineError {
    fn from(err: ParseThemeModeError) -> Self {
        EngineError::new(ErrorPhase::Theme, "THEME_MODE_INVALID", err.to_string())
            .with_value(err.raw.to_string())
    }
}
