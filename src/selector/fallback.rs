use crate::tree::element::Element;

/// Top chrome band (navigation bars, sheet headers) in points.
pub const CHROME_BAND_MAX_Y: f64 = 180.0;
/// Leading chrome column for back/close affordances.
pub const CHROME_LEADING_MAX_X: f64 = 120.0;
/// Rows closer than this are treated as the same toolbar row.
pub const ROW_TOLERANCE: f64 = 20.0;
/// Checkboxes and toggles are small.
pub const SMALL_CONTROL_MAX: f64 = 64.0;

const BACK_TOKENS: &[&str] = &["back", "close", "dismiss"];
const CHECK_TOKENS: &[&str] = &["check", "checkbox"];
const TRAILING_TOKENS: &[&str] = &["add", "done", "ok", "allow", "choose", "select"];
const LEADING_TOKENS: &[&str] = &["cancel", "close", "back", "dismiss"];

fn contains_any_token(s: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| s.contains(t))
}

fn normalized_query(query: &str) -> Option<String> {
    let q = query.trim().to_lowercase();
    (!q.is_empty()).then_some(q)
}

/// Guess an element from the query's intent: back/close/dismiss prefer the
/// top-leading chrome, check/checkbox prefer switches and small controls.
pub fn pick_intent_fallback(elements: &[Element], query: &str) -> Option<Element> {
    let query = normalized_query(query)?;
    let want_back = contains_any_token(&query, BACK_TOKENS);
    let want_check = contains_any_token(&query, CHECK_TOKENS);
    if !want_back && !want_check {
        return None;
    }

    elements
        .iter()
        .filter(|e| e.enabled && e.visible && e.is_interactive())
        .filter_map(|elem| {
            let mut score = 0;
            if elem.text().contains(&query) {
                score += 60;
            }
            if want_back {
                if elem.center.y <= CHROME_BAND_MAX_Y {
                    score += 25;
                }
                if elem.center.x <= CHROME_LEADING_MAX_X {
                    score += 20;
                }
            }
            if want_check {
                if elem.role.to_lowercase().contains("switch") {
                    score += 45;
                }
                if elem.frame.w <= SMALL_CONTROL_MAX && elem.frame.h <= SMALL_CONTROL_MAX {
                    score += 22;
                }
                let nearby = elem.nearby_label.to_lowercase();
                if !nearby.is_empty() && (nearby.contains(&query) || query.contains(&nearby)) {
                    score += 28;
                }
            }
            if elem.label.trim().is_empty() {
                score += 10;
            }
            (score > 0).then_some((score, elem))
        })
        .max_by(|(sa, a), (sb, b)| sa.cmp(sb).then(b.index.cmp(&a.index)))
        .map(|(_, elem)| elem.clone())
}

/// Map action verbs onto the system chrome: confirm-style verbs pick the
/// trailing control of the top bar, cancel-style verbs the leading one.
pub fn pick_system_fallback(elements: &[Element], query: &str) -> Option<Element> {
    let query = normalized_query(query)?;
    let trailing = contains_any_token(&query, TRAILING_TOKENS);
    let leading = contains_any_token(&query, LEADING_TOKENS);
    if !trailing && !leading {
        return None;
    }

    let mut best: Option<&Element> = None;
    for elem in elements {
        if !elem.enabled || !elem.visible || elem.frame.y > CHROME_BAND_MAX_Y {
            continue;
        }
        if !elem.is_interactive() && !elem.role.to_lowercase().contains("navigation") {
            continue;
        }
        let Some(current) = best else {
            best = Some(elem);
            continue;
        };
        if elem.center.y < current.center.y {
            best = Some(elem);
            continue;
        }
        if (elem.center.y - current.center.y).abs() <= ROW_TOLERANCE {
            if trailing && elem.center.x > current.center.x {
                best = Some(elem);
            }
            if leading && elem.center.x < current.center.x {
                best = Some(elem);
            }
        }
    }
    best.cloned()
}
