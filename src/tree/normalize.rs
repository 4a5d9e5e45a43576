use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SimError;
use crate::tree::element::{Element, ElementSet, FrameRect, is_interactive_role};
use crate::tree::value::{
    ENABLED_KEYS, FOCUSED_KEYS, ID_KEYS, LABEL_KEYS, ROLE_KEYS, VALUE_KEYS, find_rect,
    first_bool, first_string,
};

/// Maximum center distance for an unlabeled element to borrow a neighbour's label.
pub const NEARBY_LABEL_RADIUS: f64 = 220.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    /// Top-to-bottom, then left-to-right, ties by id.
    #[default]
    Reading,
    /// Discovery order in the raw tree.
    Z,
    /// Lexicographic id.
    Stable,
}

impl FromStr for OrderMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reading" => Ok(OrderMode::Reading),
            "z" => Ok(OrderMode::Z),
            "stable" => Ok(OrderMode::Stable),
            _ => Err(SimError::usage("--order must be reading|z|stable")),
        }
    }
}

impl fmt::Display for OrderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderMode::Reading => "reading",
            OrderMode::Z => "z",
            OrderMode::Stable => "stable",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub order: OrderMode,
    /// Minimum frame area in pt².
    pub min_area: f64,
    /// Lower-cased roles to keep (empty keeps all).
    pub include_roles: HashSet<String>,
    /// Lower-cased roles to drop.
    pub exclude_roles: HashSet<String>,
    pub interactive_only: bool,
}

/// Parse a comma separated role list into a lower-cased set.
pub fn role_set(csv: &str) -> HashSet<String> {
    csv.split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect()
}

struct CandidateNode<'a> {
    path: String,
    order: usize,
    map: &'a Map<String, Value>,
}

/// Turn one raw snapshot into an ordered, indexed, visibility-classified set.
pub fn normalize(raw: &Value, opts: &NormalizeOptions) -> ElementSet {
    let mut nodes = Vec::with_capacity(64);
    let mut counter = 0;
    walk_candidates(raw, String::new(), &mut counter, &mut nodes);

    let mut elements = Vec::with_capacity(nodes.len());
    let mut all_count = 0;
    let mut interactive_count = 0;

    for node in &nodes {
        let Some(mut elem) = element_from_candidate(node) else {
            continue;
        };
        if elem.frame.area() < opts.min_area {
            continue;
        }
        let role_key = elem.role.trim().to_lowercase();
        if !opts.include_roles.is_empty() && !opts.include_roles.contains(&role_key) {
            continue;
        }
        if opts.exclude_roles.contains(&role_key) {
            continue;
        }
        if !elem.enabled {
            continue;
        }
        all_count += 1;
        let interactive = is_interactive_role(&elem.role);
        if interactive {
            interactive_count += 1;
        }
        if opts.interactive_only && !interactive {
            continue;
        }
        elem.order = node.order;
        elements.push(elem);
    }

    let screen = infer_screen_rect(raw, &elements);
    for elem in elements.iter_mut() {
        let (visible, offscreen) = classify_visibility(&elem.frame, screen.as_ref());
        elem.visible = visible;
        elem.offscreen = offscreen;
    }

    sort_elements(&mut elements, opts.order);
    for (i, elem) in elements.iter_mut().enumerate() {
        elem.index = i + 1;
    }
    add_nearby_labels(&mut elements);

    ElementSet {
        elements,
        all_count,
        interactive_count,
    }
}

fn walk_candidates<'a>(
    value: &'a Value,
    path: String,
    counter: &mut usize,
    out: &mut Vec<CandidateNode<'a>>,
) {
    match value {
        Value::Object(map) => {
            *counter += 1;
            out.push(CandidateNode {
                path: path.clone(),
                order: *counter,
                map,
            });
            for (key, child) in map {
                walk_candidates(child, format!("{}/{}", path, key), counter, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk_candidates(child, format!("{}/{}", path, i), counter, out);
            }
        }
        _ => {}
    }
}

fn element_from_candidate(node: &CandidateNode<'_>) -> Option<Element> {
    let frame = find_rect(node.map)?;
    if frame.is_degenerate() {
        return None;
    }

    let mut id = first_string(node.map, ID_KEYS);
    if id.is_empty() {
        id = format!("axpath:{}", node.path);
    }
    let role = first_string(node.map, ROLE_KEYS);
    let value = first_string(node.map, VALUE_KEYS);
    let mut label = first_string(node.map, LABEL_KEYS);
    if label.is_empty() && !value.is_empty() {
        label = value.clone();
    }

    Some(Element {
        index: 0,
        id,
        role,
        label,
        value,
        nearby_label: String::new(),
        enabled: first_bool(node.map, ENABLED_KEYS, true),
        focused: first_bool(node.map, FOCUSED_KEYS, false),
        visible: true,
        offscreen: false,
        center: frame.center(),
        frame,
        order: 0,
    })
}

/// The root's own rect, else the bounding box of all usable element frames.
/// `None` means "treat everything as fully visible".
pub fn infer_screen_rect(raw: &Value, elements: &[Element]) -> Option<FrameRect> {
    if let Some(rect) = raw.as_object().and_then(find_rect) {
        if !rect.is_degenerate() {
            return Some(rect);
        }
    }

    let mut frames = elements.iter().map(|e| e.frame).filter(|f| !f.is_degenerate());
    let first = frames.next()?;
    let (mut min_x, mut min_y) = (first.x, first.y);
    let (mut max_x, mut max_y) = (first.right(), first.bottom());
    for frame in frames {
        min_x = min_x.min(frame.x);
        min_y = min_y.min(frame.y);
        max_x = max_x.max(frame.right());
        max_y = max_y.max(frame.bottom());
    }
    if max_x <= min_x || max_y <= min_y {
        return None;
    }
    Some(FrameRect {
        x: min_x,
        y: min_y,
        w: max_x - min_x,
        h: max_y - min_y,
    })
}

/// Returns `(visible, offscreen)`.
pub fn classify_visibility(rect: &FrameRect, screen: Option<&FrameRect>) -> (bool, bool) {
    if rect.is_degenerate() {
        return (false, true);
    }
    let Some(screen) = screen.filter(|s| !s.is_degenerate()) else {
        return (true, false);
    };

    let inter_left = rect.x.max(screen.x);
    let inter_top = rect.y.max(screen.y);
    let inter_right = rect.right().min(screen.right());
    let inter_bottom = rect.bottom().min(screen.bottom());
    if inter_right <= inter_left || inter_bottom <= inter_top {
        return (false, true);
    }

    let offscreen = rect.x < screen.x
        || rect.y < screen.y
        || rect.right() > screen.right()
        || rect.bottom() > screen.bottom();
    (true, offscreen)
}

fn sort_elements(elements: &mut [Element], order: OrderMode) {
    match order {
        OrderMode::Reading => elements.sort_by(|a, b| {
            a.center
                .y
                .total_cmp(&b.center.y)
                .then(a.center.x.total_cmp(&b.center.x))
                .then_with(|| a.id.cmp(&b.id))
        }),
        OrderMode::Stable => elements.sort_by(|a, b| a.id.cmp(&b.id)),
        OrderMode::Z => elements.sort_by_key(|e| e.order),
    }
}

/// Give every unlabeled element the label of its closest visible, labeled
/// neighbour. Runs after indexing and never reorders.
fn add_nearby_labels(elements: &mut [Element]) {
    let nearby: Vec<Option<String>> = elements
        .iter()
        .enumerate()
        .map(|(i, elem)| {
            if !elem.label.trim().is_empty() {
                return None;
            }
            elements
                .iter()
                .enumerate()
                .filter(|(j, other)| {
                    *j != i && other.visible && !other.label.trim().is_empty()
                })
                .map(|(_, other)| (elem.center.distance(&other.center), other))
                .filter(|(distance, _)| *distance <= NEARBY_LABEL_RADIUS)
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, other)| other.label.clone())
        })
        .collect();

    for (elem, label) in elements.iter_mut().zip(nearby) {
        if let Some(label) = label {
            elem.nearby_label = label;
        }
    }
}
