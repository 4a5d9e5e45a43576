use serde::{Deserialize, Serialize};

const INTERACTIVE_ROLE_HINTS: &[&str] = &[
    "button",
    "textfield",
    "securetextfield",
    "switch",
    "slider",
    "cell",
    "link",
];

const TEXT_INPUT_ROLE_HINTS: &[&str] = &[
    "textfield",
    "securetextfield",
    "searchfield",
    "textarea",
    "textview",
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl FrameRect {
    pub fn center(&self) -> FramePoint {
        FramePoint {
            x: self.x + self.w / 2.0,
            y: self.y + self.h / 2.0,
        }
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    pub fn is_degenerate(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }
}

/// A point in screen points (not pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FramePoint {
    pub x: f64,
    pub y: f64,
}

impl FramePoint {
    pub fn distance(&self, other: &FramePoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One normalized, addressable control from a single snapshot.
///
/// Elements are rebuilt from scratch for every snapshot and compared by value;
/// `index` is only meaningful within the snapshot that produced it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub index: usize,
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nearby_label: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub focused: bool,
    pub visible: bool,
    pub offscreen: bool,
    pub frame: FrameRect,
    pub center: FramePoint,
    /// Pre-sort discovery rank in the raw tree.
    #[serde(skip)]
    pub order: usize,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Element {
    pub fn is_interactive(&self) -> bool {
        is_interactive_role(&self.role)
    }

    pub fn is_text_input(&self) -> bool {
        is_text_input_role(&self.role)
    }

    pub fn is_secure_text_input(&self) -> bool {
        is_secure_text_input_role(&self.role)
    }

    /// Lower-cased `label value nearbyLabel role`, used for substring matching.
    pub fn text(&self) -> String {
        [
            self.label.trim(),
            self.value.trim(),
            self.nearby_label.trim(),
            self.role.trim(),
        ]
        .join(" ")
        .to_lowercase()
    }

    /// What the field currently shows: its value, or its label when empty.
    pub fn observed_text(&self) -> String {
        let value = self.value.trim();
        if value.is_empty() {
            self.label.trim().to_string()
        } else {
            value.to_string()
        }
    }
}

pub fn is_interactive_role(role: &str) -> bool {
    role_matches(role, INTERACTIVE_ROLE_HINTS)
}

pub fn is_text_input_role(role: &str) -> bool {
    role_matches(role, TEXT_INPUT_ROLE_HINTS)
}

/// Masked fields never echo their content, so they cannot be verified.
pub fn is_secure_text_input_role(role: &str) -> bool {
    role.trim().to_lowercase().contains("securetextfield")
}

fn role_matches(role: &str, hints: &[&str]) -> bool {
    let r = role.trim().to_lowercase();
    !r.is_empty() && hints.iter().any(|hint| r.contains(hint))
}

/// All elements of one snapshot instant, in index order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSet {
    pub elements: Vec<Element>,
    /// Candidates that survived area/role/enabled filtering.
    pub all_count: usize,
    /// Filtered candidates with an interactive role.
    pub interactive_count: usize,
}

impl ElementSet {
    /// Enabled, visible, interactive elements: the count live checks reason about.
    pub fn visible_interactive_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| e.enabled && e.visible && e.is_interactive())
            .count()
    }

    pub fn focused_text_input(&self) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.enabled && e.focused && e.is_text_input())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
