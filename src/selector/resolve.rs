use crate::error::{Result, SimError};
use crate::selector::query::Selector;
use crate::tree::element::Element;

// ============================================================================
// Scoring weights
// ============================================================================

pub const SCORE_EXACT_LABEL: i32 = 90;
pub const SCORE_EXACT_VALUE: i32 = 75;
pub const SCORE_EXACT_NEARBY: i32 = 55;
pub const SCORE_CONTAINS: i32 = 45;
pub const SCORE_VISIBLE: i32 = 24;
pub const SCORE_ONSCREEN: i32 = 10;
pub const SCORE_INTERACTIVE: i32 = 15;
pub const SCORE_LABELED: i32 = 8;

/// Resolve one selector against one element set.
pub fn resolve(elements: &[Element], selector: &Selector) -> Result<Element> {
    match selector {
        Selector::Index(index) => elements
            .iter()
            .find(|e| e.index == *index)
            .cloned()
            .ok_or_else(|| SimError::ElementNotFound(format!("element index not found: {}", index))),
        Selector::Id(id) => elements
            .iter()
            .find(|e| e.id == *id)
            .cloned()
            .ok_or_else(|| SimError::ElementNotFound(format!("element id not found: {}", id))),
        Selector::Label(label) => pick_element_by_text(elements, Some(label), None),
        Selector::Contains(text) => pick_element_by_text(elements, None, Some(text)),
    }
}

/// Scored match over enabled elements. Highest score wins, ties go to the
/// lowest index.
pub fn pick_element_by_text(
    elements: &[Element],
    exact_label: Option<&str>,
    partial: Option<&str>,
) -> Result<Element> {
    let exact = exact_label.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
    let partial = partial.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());

    let best = elements
        .iter()
        .filter(|e| e.enabled)
        .filter_map(|e| score_element(e, exact.as_deref(), partial.as_deref()).map(|s| (s, e)))
        .max_by(|(sa, a), (sb, b)| sa.cmp(sb).then(b.index.cmp(&a.index)));

    match best {
        Some((_, elem)) => Ok(elem.clone()),
        None => Err(SimError::ElementNotFound(match (exact, partial) {
            (Some(label), _) => format!("element label not found: {}", label),
            (None, text) => format!("element text not found: {}", text.unwrap_or_default()),
        })),
    }
}

/// `None` when the element is not a candidate at all.
pub fn score_element(elem: &Element, exact: Option<&str>, partial: Option<&str>) -> Option<i32> {
    let mut score = 0;

    if let Some(exact) = exact {
        let mut hit = false;
        if elem.label.trim().to_lowercase() == exact {
            hit = true;
            score += SCORE_EXACT_LABEL;
        }
        if elem.value.trim().to_lowercase() == exact {
            hit = true;
            score += SCORE_EXACT_VALUE;
        }
        if elem.nearby_label.trim().to_lowercase() == exact {
            hit = true;
            score += SCORE_EXACT_NEARBY;
        }
        if !hit {
            return None;
        }
    }

    if let Some(partial) = partial {
        if !elem.text().contains(partial) {
            return None;
        }
        score += SCORE_CONTAINS;
    }

    if elem.visible {
        score += SCORE_VISIBLE;
    }
    if !elem.offscreen {
        score += SCORE_ONSCREEN;
    }
    if elem.is_interactive() {
        score += SCORE_INTERACTIVE;
    }
    if !elem.label.trim().is_empty() {
        score += SCORE_LABELED;
    }
    Some(score)
}
