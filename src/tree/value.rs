use serde_json::{Map, Value};

use crate::tree::element::FrameRect;

// ============================================================================
// Alias keys
// ============================================================================
//
// The introspection tool does not promise a schema, so every semantic field is
// looked up through an ordered list of keys. The first non-empty hit wins.

pub const ID_KEYS: &[&str] = &[
    "id",
    "identifier",
    "uid",
    "axPath",
    "path",
    "accessibilityIdentifier",
];

pub const ROLE_KEYS: &[&str] = &[
    "role",
    "type",
    "elementType",
    "axRole",
    "roleDescription",
    "AXRole",
    "wdType",
];

pub const LABEL_KEYS: &[&str] = &[
    "label",
    "name",
    "title",
    "placeholder",
    "accessibilityLabel",
    "axLabel",
    "AXLabel",
    "wdLabel",
];

pub const VALUE_KEYS: &[&str] = &[
    "value",
    "text",
    "axValue",
    "AXValue",
    "displayValue",
    "wdValue",
    "selectedText",
];

pub const ENABLED_KEYS: &[&str] = &["enabled", "isEnabled"];

pub const FOCUSED_KEYS: &[&str] = &["focused", "isFocused", "hasFocus", "AXFocused"];

const RECT_KEYS: &[&str] = &["frame", "bounds", "rect"];
const X_KEYS: &[&str] = &["x", "left", "originX"];
const Y_KEYS: &[&str] = &["y", "top", "originY"];
const W_KEYS: &[&str] = &["w", "width"];
const H_KEYS: &[&str] = &["h", "height"];

// ============================================================================
// Lookups
// ============================================================================

/// First non-empty scalar under any of `keys`, trimmed. Nested maps/arrays and
/// nulls are skipped.
pub fn first_string(map: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        let text = match map.get(*key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => continue,
        };
        if !text.is_empty() {
            return text;
        }
    }
    String::new()
}

/// First key holding a boolean (or a string that parses as one).
pub fn first_bool(map: &Map<String, Value>, keys: &[&str], fallback: bool) -> bool {
    for key in keys {
        match map.get(*key) {
            Some(Value::Bool(b)) => return *b,
            Some(Value::String(s)) => {
                if let Some(parsed) = parse_bool(s) {
                    return parsed;
                }
            }
            _ => {}
        }
    }
    fallback
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// First key holding a number (or a numeric string).
pub fn first_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match map.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(f) = n.as_f64() {
                    return Some(f);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(f) = s.trim().parse::<f64>() {
                    return Some(f);
                }
            }
            _ => {}
        }
    }
    None
}

/// Read `{x,y,w,h}` (with aliases) from a value that must be a map.
pub fn rect_from_value(value: &Value) -> Option<FrameRect> {
    let map = value.as_object()?;
    Some(FrameRect {
        x: first_number(map, X_KEYS)?,
        y: first_number(map, Y_KEYS)?,
        w: first_number(map, W_KEYS)?,
        h: first_number(map, H_KEYS)?,
    })
}

/// Resolve a node's rectangle from `frame`, `bounds`, `rect`, or the node itself.
pub fn find_rect(map: &Map<String, Value>) -> Option<FrameRect> {
    RECT_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(rect_from_value)
        .or_else(|| {
            Some(FrameRect {
                x: first_number(map, X_KEYS)?,
                y: first_number(map, Y_KEYS)?,
                w: first_number(map, W_KEYS)?,
                h: first_number(map, H_KEYS)?,
            })
        })
}
