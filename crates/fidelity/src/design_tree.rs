//! Design-tree model and the extractor that turns it into expected attributes.
//!
//! Documents arrive in one of three shapes (an id-keyed `nodes` map, a
//! `document` wrapper, or a bare node). Shape detection is a pure function over
//! the parsed JSON; an unrecognized shape yields a diagnostic, never an error.

use core::fmt;
use log::{debug, warn};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel used in reports when a text node has no font size.
pub const UNKNOWN_FONT_SIZE: &str = "unknown";

/// An RGB color with channels in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct UnitColor {
    #[serde(default, rename = "r")]
    pub red: f64,
    #[serde(default, rename = "g")]
    pub green: f64,
    #[serde(default, rename = "b")]
    pub blue: f64,
}

impl UnitColor {
    /// 8-bit channels via `round(channel * 255)`, clamped to the byte range.
    pub fn to_rgb8(self) -> (u8, u8, u8) {
        (
            unit_to_byte(self.red),
            unit_to_byte(self.green),
            unit_to_byte(self.blue),
        )
    }

    /// `rgba(R, G, B, A)` with `alpha` rendered the way JSON numbers print.
    pub fn to_rgba_string(self, alpha: f64) -> String {
        let (red, green, blue) = self.to_rgb8();
        format!("rgba({red}, {green}, {blue}, {})", format_number(alpha))
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex_string(self) -> String {
        let (red, green, blue) = self.to_rgb8();
        format!("#{red:02x}{green:02x}{blue:02x}")
    }
}

fn unit_to_byte(channel: f64) -> u8 {
    (channel * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Render a number the way a JSON serializer would (`1`, `0.5`, `16`).
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_owned();
    }
    format!("{value}")
}

/// One paint entry of a node's `fills`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Paint {
    #[serde(default, rename = "type")]
    pub paint_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub color: Option<UnitColor>,
    #[serde(default, deserialize_with = "lenient")]
    pub opacity: Option<f64>,
}

impl Paint {
    fn solid_color(&self) -> Option<UnitColor> {
        if self.paint_type.as_deref() == Some("SOLID") {
            self.color
        } else {
            None
        }
    }
}

/// Font weight as authored: numeric (`700`) or keyword (`"bold"`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    Numeric(f64),
    Keyword(String),
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::Numeric(400.0)
    }
}

impl fmt::Display for FontWeight {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(weight) => formatter.write_str(&format_number(*weight)),
            Self::Keyword(keyword) => formatter.write_str(keyword),
        }
    }
}

/// Text styling attached to a node.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(default, deserialize_with = "lenient")]
    pub font_family: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub font_weight: Option<FontWeight>,
    #[serde(default, deserialize_with = "lenient")]
    pub font_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub fills: Vec<Paint>,
}

/// Absolute bounding box of a node.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// A node of the design tree.
///
/// Every field is optional and tolerant of unexpected JSON types; a field that
/// does not fit its expected shape is treated as absent.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignNode {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub node_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub characters: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub fills: Vec<Paint>,
    #[serde(default, deserialize_with = "lenient")]
    pub style: Option<TextStyle>,
    #[serde(default, deserialize_with = "lenient")]
    pub absolute_bounding_box: Option<BoundingBox>,
    #[serde(default, deserialize_with = "lenient")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub children: Vec<DesignNode>,
}

impl DesignNode {
    fn label(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    fn text_label(&self) -> &str {
        self.label()
            .or_else(|| self.characters.as_deref().filter(|chars| !chars.is_empty()))
            .unwrap_or("text")
    }

    fn size(&self) -> Option<(f64, f64)> {
        if let Some(bbox) = self.absolute_bounding_box {
            return Some((bbox.width, bbox.height));
        }
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some((width, height)),
            _ => None,
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Which root the document exposes.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentShape<'doc> {
    /// `{ "nodes": { "<id>": { "document": {...} } } }`; the first id wins.
    IndexedNodes { node_id: &'doc str, root: &'doc Value },
    /// `{ "document": {...} }`
    SingleDocument(&'doc Value),
    /// A node with both `type` and `name`.
    BareNode(&'doc Value),
    /// None of the above.
    Unrecognized(String),
}

impl<'doc> DocumentShape<'doc> {
    /// Classify a parsed document.
    pub fn detect(document: &'doc Value) -> Self {
        if let Some(nodes) = document.get("nodes").filter(|nodes| is_truthy(nodes)) {
            let Some(entries) = nodes.as_object() else {
                return Self::Unrecognized("`nodes` is not an object".to_owned());
            };
            let Some((node_id, entry)) = entries.iter().next() else {
                return Self::Unrecognized("`nodes` has no entries".to_owned());
            };
            return match entry.get("document") {
                Some(root) if root.is_object() => Self::IndexedNodes {
                    node_id: node_id.as_str(),
                    root,
                },
                _ => Self::Unrecognized(format!("node `{node_id}` has no `document` subtree")),
            };
        }
        if let Some(root) = document.get("document").filter(|root| is_truthy(root)) {
            return Self::SingleDocument(root);
        }
        let has_type = document.get("type").is_some_and(is_truthy);
        let has_name = document.get("name").is_some_and(is_truthy);
        if has_type && has_name {
            return Self::BareNode(document);
        }
        Self::Unrecognized("expected `nodes`, `document`, or a node with `type` and `name`".to_owned())
    }

    /// The selected root, if any.
    pub fn root(&self) -> Option<&'doc Value> {
        match *self {
            Self::IndexedNodes { root, .. } | Self::SingleDocument(root) | Self::BareNode(root) => {
                Some(root)
            }
            Self::Unrecognized(_) => None,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|num| num != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Where an expected color came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorKind {
    Fill,
    Text,
}

/// A color the design expects to see.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSample {
    pub rgba: String,
    pub hex: String,
    pub element: String,
    #[serde(rename = "type")]
    pub kind: ColorKind,
    #[serde(default)]
    pub source: String,
}

/// A font size: either known, or the `"unknown"` sentinel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FontSize {
    Known(f64),
    Unknown,
}

impl FontSize {
    /// `"{size}px"` for known sizes.
    pub fn as_px(self) -> Option<String> {
        match self {
            Self::Known(size) => Some(format!("{}px", format_number(size))),
            Self::Unknown => None,
        }
    }
}

impl Serialize for FontSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Known(size) => serializer.serialize_f64(size),
            Self::Unknown => serializer.serialize_str(UNKNOWN_FONT_SIZE),
        }
    }
}

impl<'de> Deserialize<'de> for FontSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_f64().map_or(Self::Unknown, Self::Known))
    }
}

/// A text style the design expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontSample {
    pub family: String,
    pub weight: FontWeight,
    pub size: FontSize,
    pub element: String,
    pub source: String,
}

/// A node's rounded dimensions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSample {
    pub width: i64,
    pub height: i64,
    pub element: String,
    pub source: String,
}

/// Everything the design expects, in pre-order traversal order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExpectedAttributeSet {
    pub colors: Vec<ColorSample>,
    pub fonts: Vec<FontSample>,
    pub sizes: Vec<SizeSample>,
    /// Diagnostics raised during extraction (e.g. unknown document shape).
    pub warnings: Vec<String>,
}

/// Extract expected attributes from a parsed design document.
///
/// `source` labels every sample (usually the document's file name).
pub fn extract_expected(document: &Value, source: &str) -> ExpectedAttributeSet {
    let mut expected = ExpectedAttributeSet::default();
    let shape = DocumentShape::detect(document);
    let Some(root_value) = shape.root() else {
        if let DocumentShape::Unrecognized(reason) = &shape {
            warn!("[FIDELITY] unrecognized design document {source}: {reason}");
            expected
                .warnings
                .push(format!("Unrecognized design document shape in {source}: {reason}"));
        }
        return expected;
    };
    // DesignNode deserialization is lenient field by field, so this only fails
    // when the root is not an object at all.
    let Ok(root) = DesignNode::deserialize(root_value) else {
        warn!("[FIDELITY] design root in {source} is not a node object");
        expected
            .warnings
            .push(format!("Design root in {source} is not a node object"));
        return expected;
    };
    collect(&root, source, &mut expected);
    debug!(
        "[FIDELITY] {source}: {} colors, {} fonts, {} sizes expected",
        expected.colors.len(),
        expected.fonts.len(),
        expected.sizes.len()
    );
    expected
}

fn collect(node: &DesignNode, source: &str, out: &mut ExpectedAttributeSet) {
    for paint in &node.fills {
        if let Some(color) = paint.solid_color() {
            out.colors.push(ColorSample {
                rgba: color.to_rgba_string(paint.opacity.unwrap_or(1.0)),
                hex: color.to_hex_string(),
                element: node.label().unwrap_or("unnamed").to_owned(),
                kind: ColorKind::Fill,
                source: source.to_owned(),
            });
        }
    }

    if let Some(style) = &node.style {
        for paint in &style.fills {
            if let Some(color) = paint.solid_color() {
                out.colors.push(ColorSample {
                    rgba: color.to_rgba_string(paint.opacity.unwrap_or(1.0)),
                    hex: color.to_hex_string(),
                    element: node.text_label().to_owned(),
                    kind: ColorKind::Text,
                    source: source.to_owned(),
                });
            }
        }

        if let Some(family) = style.font_family.as_deref().filter(|family| !family.is_empty()) {
            out.fonts.push(FontSample {
                family: family.to_owned(),
                weight: style.font_weight.clone().unwrap_or_default(),
                size: style
                    .font_size
                    .filter(|size| *size != 0.0)
                    .map_or(FontSize::Unknown, FontSize::Known),
                element: node.text_label().to_owned(),
                source: source.to_owned(),
            });
        }
    }

    if let Some((width, height)) = node.size() {
        out.sizes.push(SizeSample {
            width: width.round() as i64,
            height: height.round() as i64,
            element: node.label().unwrap_or("unnamed").to_owned(),
            source: source.to_owned(),
        });
    }

    for child in &node.children {
        collect(child, source, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn red_converts_to_rgba_and_hex() {
        let red = UnitColor {
            red: 1.0,
            green: 0.0,
            blue: 0.0,
        };
        assert_eq!(red.to_rgba_string(1.0), "rgba(255, 0, 0, 1)");
        assert_eq!(red.to_hex_string(), "#ff0000");
    }

    #[test]
    fn fractional_channels_round_and_pad() {
        let color = UnitColor {
            red: 0.2,
            green: 0.02,
            blue: 0.5,
        };
        assert_eq!(color.to_hex_string(), "#330580");
        assert_eq!(color.to_rgba_string(0.5), "rgba(51, 5, 128, 0.5)");
    }

    #[test]
    fn detects_all_three_shapes() {
        let indexed = json!({"nodes": {"1:2": {"document": {"type": "FRAME", "name": "A"}}}});
        assert!(matches!(
            DocumentShape::detect(&indexed),
            DocumentShape::IndexedNodes { node_id: "1:2", .. }
        ));

        let single = json!({"document": {"type": "DOCUMENT", "name": "Doc"}});
        assert!(matches!(
            DocumentShape::detect(&single),
            DocumentShape::SingleDocument(_)
        ));

        let bare = json!({"type": "FRAME", "name": "Hero"});
        assert!(matches!(DocumentShape::detect(&bare), DocumentShape::BareNode(_)));

        let other = json!({"type": "FRAME"});
        assert!(matches!(
            DocumentShape::detect(&other),
            DocumentShape::Unrecognized(_)
        ));
    }

    #[test]
    fn unrecognized_shape_warns_and_extracts_nothing() {
        let expected = extract_expected(&json!({"foo": 1}), "weird.json");
        assert!(expected.colors.is_empty());
        assert!(expected.fonts.is_empty());
        assert_eq!(expected.warnings.len(), 1);
    }

    #[test]
    fn traversal_is_preorder_and_keeps_duplicates() {
        let doc = json!({
            "type": "FRAME",
            "name": "Root",
            "fills": [{"type": "SOLID", "color": {"r": 1, "g": 1, "b": 1}}],
            "children": [
                {
                    "type": "RECTANGLE",
                    "name": "First",
                    "fills": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0}}],
                    "children": [{
                        "type": "RECTANGLE",
                        "name": "Nested",
                        "fills": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0}}]
                    }]
                },
                {
                    "type": "RECTANGLE",
                    "name": "Second",
                    "fills": [
                        {"type": "GRADIENT_LINEAR"},
                        {"type": "SOLID", "color": {"r": 0, "g": 0, "b": 1}, "opacity": 0.5}
                    ]
                }
            ]
        });
        let expected = extract_expected(&doc, "tree.json");
        let elements: Vec<&str> = expected
            .colors
            .iter()
            .map(|color| color.element.as_str())
            .collect();
        assert_eq!(elements, ["Root", "First", "Nested", "Second"]);
        assert_eq!(expected.colors[3].rgba, "rgba(0, 0, 255, 0.5)");
        assert_eq!(expected.colors[1].hex, expected.colors[2].hex);
    }

    #[test]
    fn text_nodes_yield_text_colors_and_fonts() {
        let doc = json!({
            "document": {
                "type": "DOCUMENT",
                "name": "Doc",
                "children": [{
                    "type": "TEXT",
                    "name": "",
                    "characters": "Buy now",
                    "style": {
                        "fontFamily": "Inter",
                        "fontWeight": 700,
                        "fontSize": 16,
                        "fills": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0}}]
                    }
                }, {
                    "type": "TEXT",
                    "name": "Caption",
                    "style": {"fontFamily": "Inter"}
                }]
            }
        });
        let expected = extract_expected(&doc, "doc.json");
        assert_eq!(expected.colors.len(), 1);
        assert_eq!(expected.colors[0].kind, ColorKind::Text);
        assert_eq!(expected.colors[0].element, "Buy now");
        assert_eq!(expected.fonts.len(), 2);
        assert_eq!(expected.fonts[0].size.as_px().as_deref(), Some("16px"));
        assert_eq!(expected.fonts[0].weight.to_string(), "700");
        assert_eq!(expected.fonts[1].size, FontSize::Unknown);
        assert_eq!(expected.fonts[1].weight, FontWeight::Numeric(400.0));
    }

    #[test]
    fn sizes_come_from_bounding_box_or_dimensions() {
        let doc = json!({
            "type": "FRAME",
            "name": "Card",
            "absoluteBoundingBox": {"x": 0, "y": 0, "width": 120.4, "height": 80.6},
            "children": [{"type": "RECTANGLE", "name": "Chip", "width": 10.5, "height": 4}]
        });
        let expected = extract_expected(&doc, "card.json");
        assert_eq!(expected.sizes.len(), 2);
        assert_eq!((expected.sizes[0].width, expected.sizes[0].height), (120, 81));
        assert_eq!((expected.sizes[1].width, expected.sizes[1].height), (11, 4));
    }

    #[test]
    fn malformed_fields_are_ignored() {
        let doc = json!({
            "type": "FRAME",
            "name": "Odd",
            "fills": "mixed",
            "style": 12,
            "children": [null, {"type": "RECTANGLE", "name": "Ok",
                "fills": [{"type": "SOLID", "color": {"r": 0, "g": 1, "b": 0}}]}]
        });
        let expected = extract_expected(&doc, "odd.json");
        assert_eq!(expected.colors.len(), 1);
        assert_eq!(expected.colors[0].hex, "#00ff00");
    }
}
