//! Turns discrepancies into concrete selector/property/value fix suggestions.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::design_tree::FontWeight;

/// Class name used when sanitizing leaves nothing behind.
pub const FALLBACK_CLASS_NAME: &str = "element";

/// Derive a CSS class name from a design element name.
///
/// Lower-case, replace anything outside `[a-z0-9-_]` with `-`, collapse runs of
/// `-`, trim `-` from both ends, and fall back to `element` when empty.
pub fn sanitize_class_name(name: &str) -> String {
    let mut class = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        let mapped = if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            ch
        } else {
            '-'
        };
        if mapped == '-' && class.ends_with('-') {
            continue;
        }
        class.push(mapped);
    }
    let trimmed = class.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_CLASS_NAME.to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Category of a fix; also the order in which fixes are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixKind {
    Color,
    Font,
    Layout,
}

impl fmt::Display for FixKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Color => "color",
            Self::Font => "font",
            Self::Layout => "layout",
        })
    }
}

/// A proposed declaration for one element.
///
/// Field aliases accept the older `type`/`element`/`expected`/`hex` naming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSuggestion {
    #[serde(alias = "type")]
    pub kind: FixKind,
    #[serde(alias = "element")]
    pub target_element_name: String,
    #[serde(default)]
    pub property: String,
    #[serde(alias = "expected")]
    pub expected_value: String,
    #[serde(default, alias = "hex", skip_serializing_if = "Option::is_none")]
    pub auxiliary_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
}

impl FixSuggestion {
    /// The property to write, inferring one from the kind when absent.
    pub fn effective_property(&self) -> &str {
        if !self.property.is_empty() {
            return &self.property;
        }
        match self.kind {
            FixKind::Color => "background-color",
            FixKind::Font => "font-size",
            FixKind::Layout => "width",
        }
    }

    /// `.{class}`
    pub fn selector(&self) -> String {
        format!(".{}", sanitize_class_name(&self.target_element_name))
    }

    /// A one-line CSS rule expressing the suggestion.
    pub fn css_rule(&self) -> String {
        let property = self.effective_property();
        let mut rule = format!("{} {{ {property}: {};", self.selector(), self.expected_value);
        if let Some(weight) = &self.font_weight {
            rule.push_str(&format!(" font-weight: {weight};"));
        }
        if let Some(hex) = &self.auxiliary_hex {
            rule.push_str(&format!(" /* {hex} */"));
        }
        rule.push_str(" }");
        rule
    }

    /// Human-readable description.
    pub fn description(&self) -> String {
        let what = match self.kind {
            FixKind::Color => "color",
            FixKind::Font => "font",
            FixKind::Layout => "dimension",
        };
        format!(
            "Add missing {what}: {} should have {}: {}",
            self.target_element_name,
            self.effective_property(),
            self.expected_value
        )
    }
}

/// Build suggestions: colors first, then fonts, each in expected order.
pub fn generate_suggestions(analysis: &Analysis) -> Vec<FixSuggestion> {
    let colors = analysis.missing_colors.iter().map(|color| FixSuggestion {
        kind: FixKind::Color,
        target_element_name: color.element.clone(),
        property: "background-color".to_owned(),
        expected_value: color.rgba.clone(),
        auxiliary_hex: Some(color.hex.clone()),
        font_weight: None,
    });
    let fonts = analysis.missing_fonts.iter().filter_map(|font| {
        let size = font.size.as_px()?;
        Some(FixSuggestion {
            kind: FixKind::Font,
            target_element_name: font.element.clone(),
            property: "font-size".to_owned(),
            expected_value: size,
            auxiliary_hex: None,
            font_weight: Some(font.weight.clone()),
        })
    });
    colors.chain(fonts).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::design_tree::extract_expected;
    use crate::implementation::extract_found;
    use core::error::Error;
    use serde_json::json;

    #[test]
    fn sanitizes_punctuation_and_spaces() {
        let class = sanitize_class_name("Hero / Title!!");
        assert_eq!(class, "hero-title");
        assert!(!class.starts_with('-') && !class.ends_with('-'));
        assert!(!class.contains("--"));
        assert!(
            class
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
        );
    }

    #[test]
    fn sanitize_edge_cases() {
        assert_eq!(sanitize_class_name("!!!"), "element");
        assert_eq!(sanitize_class_name(""), "element");
        assert_eq!(sanitize_class_name("Btn_Primary 2"), "btn_primary-2");
        assert_eq!(sanitize_class_name("--a---b--"), "a-b");
        assert_eq!(sanitize_class_name("Café Menu"), "caf-menu");
    }

    #[test]
    fn colors_then_fonts() {
        let doc = json!({
            "type": "FRAME",
            "name": "Card",
            "fills": [{"type": "SOLID", "color": {"r": 1, "g": 0, "b": 0}}],
            "children": [{
                "type": "TEXT",
                "name": "Heading",
                "style": {"fontFamily": "Inter", "fontSize": 32, "fontWeight": 600}
            }, {
                "type": "TEXT",
                "name": "Body",
                "style": {"fontFamily": "Inter"}
            }]
        });
        let expected = extract_expected(&doc, "card.json");
        let found = extract_found(".card { color: #333; }", None);
        let suggestions = generate_suggestions(&analyze(&expected, &found));

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].kind, FixKind::Color);
        assert_eq!(suggestions[0].expected_value, "rgba(255, 0, 0, 1)");
        assert_eq!(suggestions[0].auxiliary_hex.as_deref(), Some("#ff0000"));
        assert_eq!(suggestions[1].kind, FixKind::Font);
        assert_eq!(suggestions[1].expected_value, "32px");
        assert_eq!(
            suggestions[1].css_rule(),
            ".heading { font-size: 32px; font-weight: 600; }"
        );
    }

    #[test]
    fn accepts_legacy_field_names() -> Result<(), Box<dyn Error>> {
        let legacy = json!({
            "type": "color",
            "element": "Hero Banner",
            "expected": "rgba(0, 0, 0, 1)",
            "hex": "#000000"
        });
        let suggestion: FixSuggestion = serde_json::from_value(legacy)?;
        assert_eq!(suggestion.effective_property(), "background-color");
        assert_eq!(suggestion.selector(), ".hero-banner");
        Ok(())
    }
}
