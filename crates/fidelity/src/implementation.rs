//! Tolerant textual scan of stylesheet and markup for colors and fonts.
//!
//! This is not a CSS parser: custom properties, cascade, and computed values
//! are invisible to it.

use indexmap::IndexSet;
use log::debug;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::design_tree::format_number;

static RGB_FUNCTION: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)rgba?\([^)]+\)"));
static HEX_LITERAL: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)#(?:[0-9a-f]{6}|[0-9a-f]{3})"));
static COLOR_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?:background-color|color|border-color|fill):\s*([^;]+);")
});
static FONT_SIZE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)font-size:\s*([^;]+);"));
static FONT_FAMILY: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)font-family:\s*([^;]+)"));

#[expect(clippy::expect_used, reason = "built-in patterns are literals exercised by the tests")]
fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("built-in pattern must compile")
}

/// A `font-size` declaration found in the implementation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FontSizeToken {
    /// Trimmed declaration value, e.g. `16px` or `var(--fs)`.
    pub value: String,
    /// Unit after a leading number, e.g. `px`; empty when the value does not
    /// start with a number.
    pub unit: String,
}

impl FontSizeToken {
    fn parse(value: &str) -> Self {
        let rest = value.trim_start_matches(|ch: char| ch.is_ascii_digit() || ch == '.');
        let unit = if rest.len() == value.len() {
            String::new()
        } else {
            rest.chars()
                .take_while(|ch| ch.is_ascii_alphabetic() || *ch == '%')
                .collect()
        };
        Self {
            value: value.to_owned(),
            unit,
        }
    }
}

/// `rgba(R, G, B, A)` for byte channels and a unit alpha, in comma or space
/// syntax. `None` for anything else (percent channels, decimals, `calc()`).
fn normalize_rgb(token: &str) -> Option<String> {
    let inner = token.split_once('(')?.1.strip_suffix(')')?;
    let parts: Vec<&str> = inner
        .split(|ch: char| ch == ',' || ch == '/' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    let (red, green, blue, alpha) = match parts.as_slice() {
        [red, green, blue] => (*red, *green, *blue, 1.0),
        [red, green, blue, alpha] => (*red, *green, *blue, alpha.parse::<f64>().ok()?),
        _ => return None,
    };
    if !(0.0..=1.0).contains(&alpha) {
        return None;
    }
    Some(format!(
        "rgba({}, {}, {}, {})",
        red.parse::<u8>().ok()?,
        green.parse::<u8>().ok()?,
        blue.parse::<u8>().ok()?,
        format_number(alpha)
    ))
}

/// Evidence scanned out of the implementation. Deduplicated; first-seen order
/// is kept only so reports are stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FoundAttributeSet {
    pub colors: IndexSet<String>,
    pub font_sizes: IndexSet<FontSizeToken>,
    pub font_families: IndexSet<String>,
}

impl FoundAttributeSet {
    /// Whether `value` (e.g. `16px`) appears verbatim among found font sizes.
    pub fn has_font_size(&self, value: &str) -> bool {
        self.font_sizes.iter().any(|token| token.value == value)
    }
}

/// Scan stylesheet text (plus optional markup) for colors and fonts.
pub fn extract_found(stylesheet: &str, markup: Option<&str>) -> FoundAttributeSet {
    let content = match markup {
        Some(markup) => format!("{stylesheet} {markup}"),
        None => format!("{stylesheet} "),
    };
    let mut found = FoundAttributeSet::default();

    for function in RGB_FUNCTION.find_iter(&content) {
        let raw = function.as_str().trim();
        found
            .colors
            .insert(normalize_rgb(raw).unwrap_or_else(|| raw.to_owned()));
    }

    for hex in HEX_LITERAL.find_iter(&content) {
        found.colors.insert(hex.as_str().to_lowercase());
    }

    for caps in COLOR_DECLARATION.captures_iter(&content) {
        if let Some(value) = caps.get(1) {
            found.colors.insert(value.as_str().trim().to_owned());
        }
    }

    for caps in FONT_SIZE.captures_iter(&content) {
        if let Some(value) = caps.get(1) {
            found
                .font_sizes
                .insert(FontSizeToken::parse(value.as_str().trim()));
        }
    }

    for caps in FONT_FAMILY.captures_iter(&content) {
        if let Some(family) = caps.get(1) {
            found.font_families.insert(family.as_str().trim().to_owned());
        }
    }

    debug!(
        "[FIDELITY] implementation scan: {} colors, {} font sizes, {} font families",
        found.colors.len(),
        found.font_sizes.len(),
        found.font_families.len()
    );
    found
}
