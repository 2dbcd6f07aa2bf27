//! Theme palette resolution and light/dark mode decision.
//!
//! Resolution never fails: an unknown theme name falls back to the first
//! built-in theme, an unknown mode string falls back to [`ThemeMode::Auto`].

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseThemeModeError;

/// Light/dark preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    /// Follow the platform signal.
    #[default]
    Auto,
}

impl ThemeMode {
    /// Parse a stored preference, degrading to [`ThemeMode::Auto`].
    pub fn from_preference(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|err: ParseThemeModeError| {
            log::debug!("{}; using auto", err);
            Self::Auto
        })
    }

    /// Whether this preference resolves to dark given the platform signal.
    pub fn is_dark(self, system_dark: bool) -> bool {
        match self {
            Self::Dark => true,
            Self::Light => false,
            Self::Auto => system_dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = ParseThemeModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("light") {
            Ok(Self::Light)
        } else if trimmed.eq_ignore_ascii_case("dark") {
            Ok(Self::Dark)
        } else if trimmed.eq_ignore_ascii_case("auto") || trimmed.eq_ignore_ascii_case("system") {
            Ok(Self::Auto)
        } else {
            Err(ParseThemeModeError { raw: s.into() })
        }
    }
}

/// Seed colors a palette is expanded from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub bg: String,
    pub fg: String,
    pub primary: String,
}

impl ThemeColors {
    pub fn new(bg: impl Into<String>, fg: impl Into<String>, primary: impl Into<String>) -> Self {
        Self {
            bg: bg.into(),
            fg: fg.into(),
            primary: primary.into(),
        }
    }
}

/// Full set of UI tones for one mode of a theme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    #[serde(rename = "base-100")]
    pub base_100: String,
    #[serde(rename = "base-200")]
    pub base_200: String,
    #[serde(rename = "base-300")]
    pub base_300: String,
    #[serde(rename = "base-content")]
    pub base_content: String,
    pub neutral: String,
    #[serde(rename = "neutral-content")]
    pub neutral_content: String,
    pub primary: String,
    pub secondary: String,
    pub accent: String,
}

/// Expands seed colors into full palettes.
pub trait PaletteGenerator {
    fn light_palette(&self, seeds: &ThemeColors) -> Palette;
    fn dark_palette(&self, seeds: &ThemeColors) -> Palette;
}

/// Generator that derives secondary tones by blending seeds with black,
/// white and each other.
#[derive(Clone, Copy, Debug, Default)]
pub struct MixPaletteGenerator;

impl PaletteGenerator for MixPaletteGenerator {
    fn light_palette(&self, seeds: &ThemeColors) -> Palette {
        Palette {
            base_100: normalize_color(&seeds.bg),
            base_200: mix_colors(&seeds.bg, "#000000", 0.05),
            base_300: mix_colors(&seeds.bg, "#000000", 0.12),
            base_content: normalize_color(&seeds.fg),
            neutral: mix_colors(&seeds.bg, "#000000", 0.2),
            neutral_content: normalize_color(&seeds.fg),
            primary: normalize_color(&seeds.primary),
            secondary: mix_colors(&seeds.primary, "#ffffff", 0.2),
            accent: mix_colors(&seeds.primary, &seeds.fg, 0.3),
        }
    }

    fn dark_palette(&self, seeds: &ThemeColors) -> Palette {
        Palette {
            base_100: normalize_color(&seeds.bg),
            base_200: mix_colors(&seeds.bg, "#ffffff", 0.05),
            base_300: mix_colors(&seeds.bg, "#ffffff", 0.12),
            base_content: normalize_color(&seeds.fg),
            neutral: mix_colors(&seeds.bg, "#ffffff", 0.2),
            neutral_content: normalize_color(&seeds.fg),
            primary: normalize_color(&seeds.primary),
            secondary: mix_colors(&seeds.primary, "#000000", 0.2),
            accent: mix_colors(&seeds.primary, &seeds.fg, 0.3),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Rgb(u8, u8, u8);

impl Rgb {
    fn parse(raw: &str) -> Option<Self> {
        let hex = raw.trim().strip_prefix('#')?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (slot, idx) in out.iter_mut().zip(0..3) {
                    let nibble = channel(&hex[idx..idx + 1])?;
                    *slot = nibble * 17;
                }
                Some(Self(out[0], out[1], out[2]))
            }
            6 => Some(Self(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => None,
        }
    }

    fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

fn normalize_color(raw: &str) -> String {
    Rgb::parse(raw).map_or_else(|| raw.trim().to_string(), Rgb::to_hex)
}

/// Blend `amount` of `other` into `base`. Unparseable input is passed
/// through unchanged.
fn mix_colors(base: &str, other: &str, amount: f64) -> String {
    let (Some(a), Some(b)) = (Rgb::parse(base), Rgb::parse(other)) else {
        return base.trim().to_string();
    };
    let blend = |x: u8, y: u8| {
        let mixed = f64::from(x) * (1.0 - amount) + f64::from(y) * amount;
        mixed.round().clamp(0.0, 255.0) as u8
    };
    Rgb(blend(a.0, b.0), blend(a.1, b.1), blend(a.2, b.2)).to_hex()
}

/// Built-in theme seeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuiltinTheme {
    pub name: &'static str,
    light: (&'static str, &'static str, &'static str),
    dark: (&'static str, &'static str, &'static str),
}

impl BuiltinTheme {
    fn seeds(&self, dark: bool) -> ThemeColors {
        let (bg, fg, primary) = if dark { self.dark } else { self.light };
        ThemeColors::new(bg, fg, primary)
    }
}

/// Built-in themes; the first entry is the fallback.
pub const BUILTIN_THEMES: &[BuiltinTheme] = &[
    BuiltinTheme {
        name: "default",
        light: ("#ffffff", "#171717", "#0066cc"),
        dark: ("#222222", "#e0e0e0", "#77bbee"),
    },
    BuiltinTheme {
        name: "gray",
        light: ("#dbdbdb", "#241f31", "#0066cc"),
        dark: ("#333333", "#c6c6c6", "#88ccee"),
    },
    BuiltinTheme {
        name: "sepia",
        light: ("#f1e8d0", "#5b4636", "#008b8b"),
        dark: ("#5b4636", "#ffffff", "#48d1cc"),
    },
    BuiltinTheme {
        name: "grass",
        light: ("#d7dbbd", "#232c16", "#177b4d"),
        dark: ("#333627", "#d8deba", "#a6d608"),
    },
    BuiltinTheme {
        name: "cherry",
        light: ("#f0d1d5", "#4e1609", "#de3838"),
        dark: ("#462f32", "#f0d1d5", "#ff646e"),
    },
    BuiltinTheme {
        name: "sky",
        light: ("#cedef5", "#262d48", "#2d53e5"),
        dark: ("#2d3149", "#babee1", "#856dfa"),
    },
    BuiltinTheme {
        name: "solarized",
        light: ("#fdf6e3", "#586e75", "#268bd2"),
        dark: ("#002b36", "#93a1a1", "#268bd2"),
    },
    BuiltinTheme {
        name: "gruvbox",
        light: ("#fbf1c7", "#3c3836", "#076678"),
        dark: ("#282828", "#ebdbb2", "#83a598"),
    },
    BuiltinTheme {
        name: "nord",
        light: ("#eceff4", "#2e3440", "#5e81ac"),
        dark: ("#2e3440", "#d8dee9", "#88c0d0"),
    },
    BuiltinTheme {
        name: "contrast",
        light: ("#ffffff", "#000000", "#4361ee"),
        dark: ("#000000", "#ffffff", "#ffff00"),
    },
    BuiltinTheme {
        name: "sunset",
        light: ("#fff7f0", "#4b3b4e", "#e25822"),
        dark: ("#2b1d2e", "#f5e1da", "#ff8c69"),
    },
];

/// Look up a built-in theme by name.
pub fn builtin_theme(name: &str) -> Option<&'static BuiltinTheme> {
    BUILTIN_THEMES.iter().find(|theme| theme.name == name)
}

/// User-defined theme: seed colors per mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTheme {
    pub name: String,
    pub light: ThemeColors,
    pub dark: ThemeColors,
}

/// Resolved colors handed to the style builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThemeCode {
    pub bg: String,
    pub fg: String,
    pub primary: String,
    pub palette: Palette,
    pub is_dark_mode: bool,
}

impl ThemeCode {
    fn from_palette(palette: Palette, is_dark_mode: bool) -> Self {
        Self {
            bg: palette.base_100.clone(),
            fg: palette.base_content.clone(),
            primary: palette.primary.clone(),
            palette,
            is_dark_mode,
        }
    }
}

impl Default for ThemeCode {
    fn default() -> Self {
        let fallback = &BUILTIN_THEMES[0];
        ThemeCode::from_palette(
            MixPaletteGenerator.light_palette(&fallback.seeds(false)),
            false,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ResolveKey {
    name: String,
    mode: ThemeMode,
    system_dark: bool,
}

/// Resolves a theme preference into a [`ThemeCode`], caching the last
/// answer.
#[derive(Clone, Debug, Default)]
pub struct ThemeResolver<G = MixPaletteGenerator> {
    generator: G,
    custom_themes: Vec<CustomTheme>,
    cached: Option<(ResolveKey, ThemeCode)>,
}

impl ThemeResolver<MixPaletteGenerator> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<G: PaletteGenerator> ThemeResolver<G> {
    /// Resolver expanding custom themes with `generator`.
    pub fn with_generator(generator: G) -> Self {
        Self {
            generator,
            custom_themes: Vec::new(),
            cached: None,
        }
    }

    /// Replace the user-defined themes.
    pub fn set_custom_themes(&mut self, themes: Vec<CustomTheme>) {
        self.custom_themes = themes;
        self.cached = None;
    }

    /// Add or replace one user-defined theme.
    pub fn upsert_custom_theme(&mut self, theme: CustomTheme) {
        match self.custom_themes.iter_mut().find(|t| t.name == theme.name) {
            Some(slot) => *slot = theme,
            None => self.custom_themes.push(theme),
        }
        self.cached = None;
    }

    pub fn custom_themes(&self) -> &[CustomTheme] {
        &self.custom_themes
    }

    /// Resolve `name` under `mode`, consulting `system_dark` for
    /// [`ThemeMode::Auto`].
    ///
    /// Lookup order is built-in themes, then custom themes, then the first
    /// built-in theme.
    pub fn resolve(&mut self, name: &str, mode: ThemeMode, system_dark: bool) -> ThemeCode {
        let key = ResolveKey {
            name: name.to_string(),
            mode,
            system_dark,
        };
        if let Some((cached_key, code)) = &self.cached {
            if *cached_key == key {
                return code.clone();
            }
        }
        let code = self.resolve_uncached(name, mode.is_dark(system_dark));
        self.cached = Some((key, code.clone()));
        code
    }

    /// [`ThemeResolver::resolve`] taking the raw stored mode string.
    pub fn resolve_preference(&mut self, name: &str, mode: &str, system_dark: bool) -> ThemeCode {
        self.resolve(name, ThemeMode::from_preference(mode), system_dark)
    }

    fn resolve_uncached(&self, name: &str, is_dark: bool) -> ThemeCode {
        if let Some(theme) = builtin_theme(name) {
            return builtin_code(theme, is_dark);
        }
        if let Some(custom) = self.custom_themes.iter().find(|t| t.name == name) {
            let palette = if is_dark {
                self.generator.dark_palette(&custom.dark)
            } else {
                self.generator.light_palette(&custom.light)
            };
            return ThemeCode::from_palette(palette, is_dark);
        }
        log::debug!(
            "theme {:?} not found; falling back to {}",
            name,
            BUILTIN_THEMES[0].name
        );
        builtin_code(&BUILTIN_THEMES[0], is_dark)
    }
}

fn builtin_code(theme: &BuiltinTheme, is_dark: bool) -> ThemeCode {
    let seeds = theme.seeds(is_dark);
    let palette = if is_dark {
        MixPaletteGenerator.dark_palette(&seeds)
    } else {
        MixPaletteGenerator.light_palette(&seeds)
    };
    ThemeCode::from_palette(palette, is_dark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn dark_mode_decision() {
        assert!(ThemeMode::Dark.is_dark(false));
        assert!(!ThemeMode::Light.is_dark(true));
        assert!(ThemeMode::Auto.is_dark(true));
        assert!(!ThemeMode::Auto.is_dark(false));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Dark".parse::<ThemeMode>(), Ok(ThemeMode::Dark));
        assert_eq!(" light ".parse::<ThemeMode>(), Ok(ThemeMode::Light));
        let err = "dim".parse::<ThemeMode>().expect_err("unknown mode");
        assert!(err.to_string().contains("dim"));
        assert_eq!(ThemeMode::from_preference("dim"), ThemeMode::Auto);
    }

    #[test]
    fn builtin_theme_selects_mode_palette() {
        let mut resolver = ThemeResolver::new();
        let light = resolver.resolve("sepia", ThemeMode::Light, true);
        assert_eq!(light.bg, "#f1e8d0");
        assert_eq!(light.fg, "#5b4636");
        assert_eq!(light.primary, "#008b8b");
        assert!(!light.is_dark_mode);

        let dark = resolver.resolve("sepia", ThemeMode::Auto, true);
        assert_eq!(dark.bg, "#5b4636");
        assert!(dark.is_dark_mode);
    }

    #[test]
    fn unknown_theme_falls_back_to_first_builtin() {
        let mut resolver = ThemeResolver::new();
        let code = resolver.resolve("does-not-exist", ThemeMode::Light, false);
        let expected = resolver.resolve("default", ThemeMode::Light, false);
        assert_eq!(code, expected);
    }

    #[test]
    fn custom_theme_uses_injected_generator() {
        struct Counting(Cell<usize>);
        impl PaletteGenerator for Counting {
            fn light_palette(&self, seeds: &ThemeColors) -> Palette {
                self.0.set(self.0.get() + 1);
                MixPaletteGenerator.light_palette(seeds)
            }
            fn dark_palette(&self, seeds: &ThemeColors) -> Palette {
                self.0.set(self.0.get() + 1);
                MixPaletteGenerator.dark_palette(seeds)
            }
        }

        let mut resolver = ThemeResolver::with_generator(Counting(Cell::new(0)));
        resolver.upsert_custom_theme(CustomTheme {
            name: "mine".to_string(),
            light: ThemeColors::new("#FFF", "#123456", "#abcdef"),
            dark: ThemeColors::new("#101010", "#eeeeee", "#ff00ff"),
        });
        let code = resolver.resolve("mine", ThemeMode::Light, false);
        assert_eq!(code.bg, "#ffffff");
        assert_eq!(code.fg, "#123456");
        let again = resolver.resolve("mine", ThemeMode::Light, false);
        assert_eq!(code, again);
        assert_eq!(resolver.generator.0.get(), 1);

        let dark = resolver.resolve("mine", ThemeMode::Dark, false);
        assert_eq!(dark.primary, "#ff00ff");
        assert_eq!(resolver.generator.0.get(), 2);
    }

    #[test]
    fn builtin_names_shadow_custom_themes() {
        let mut resolver = ThemeResolver::new();
        resolver.upsert_custom_theme(CustomTheme {
            name: "nord".to_string(),
            light: ThemeColors::new("#000000", "#000000", "#000000"),
            dark: ThemeColors::new("#000000", "#000000", "#000000"),
        });
        assert_eq!(resolver.resolve("nord", ThemeMode::Light, false).bg, "#eceff4");
    }

    #[test]
    fn mixing_blends_channels_and_passes_through_garbage() {
        assert_eq!(mix_colors("#ffffff", "#000000", 0.5), "#808080");
        assert_eq!(mix_colors("#000", "#ffffff", 0.0), "#000000");
        assert_eq!(mix_colors("tomato", "#ffffff", 0.5), "tomato");
    }
}
