use std::fmt;

use tracing::{debug, warn};

use crate::device::Device;
use crate::error::{Result, SimError};
use crate::input::{Timing, pause};
use crate::tree::element::{Element, FramePoint};

/// A focused element may sit this far from the target's center and still
/// count as the target when the target has no id.
pub const FOCUS_TRUST_RADIUS: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    Idle,
    TapSent,
    Verifying,
    Trusted,
    Untrusted,
    Exhausted,
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FocusState::Idle => "idle",
            FocusState::TapSent => "tap-sent",
            FocusState::Verifying => "verifying",
            FocusState::Trusted => "trusted",
            FocusState::Untrusted => "untrusted",
            FocusState::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// A verified focus target and the point that was actually tapped.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusResult {
    pub element: Element,
    pub tap_point: FramePoint,
    pub attempts: u32,
}

/// Text fields are tapped near their leading edge so the caret lands inside
/// the text rather than on a trailing clear button.
pub fn focus_point(elem: &Element) -> FramePoint {
    if !elem.is_text_input() || elem.frame.w <= 0.0 {
        return elem.center;
    }
    let inset = (elem.frame.w * 0.2).clamp(8.0, 28.0);
    let mut x = elem.frame.x + inset;
    if x > elem.frame.right() - 8.0 {
        x = elem.center.x;
    }
    FramePoint {
        x,
        y: elem.center.y,
    }
}

/// The same element by id, else the text input nearest to its center.
pub fn find_best_verification_target<'a>(
    elements: &'a [Element],
    target: &Element,
) -> Option<&'a Element> {
    if !target.id.trim().is_empty() {
        if let Some(elem) = elements.iter().find(|e| e.id == target.id) {
            return Some(elem);
        }
    }
    elements
        .iter()
        .filter(|e| e.is_text_input())
        .map(|e| (e.center.distance(&target.center), e))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, e)| e)
}

/// When nothing reports focus the tap is trusted.
pub fn can_trust_focus(elements: &[Element], target: &Element) -> bool {
    let mut has_focused = false;
    for elem in elements.iter().filter(|e| e.focused) {
        has_focused = true;
        if target.id.trim().is_empty() {
            if elem.center.distance(&target.center) <= FOCUS_TRUST_RADIUS {
                return true;
            }
        } else if elem.id == target.id {
            return true;
        }
    }
    !has_focused
}

/// Tap-and-verify loop with a fixed attempt budget.
pub struct FocusController<'a, D: ?Sized> {
    device: &'a D,
    timing: &'a Timing,
}

impl<'a, D: Device + ?Sized> FocusController<'a, D> {
    pub fn new(device: &'a D, timing: &'a Timing) -> Self {
        FocusController { device, timing }
    }

    pub fn acquire(&self, original: &Element, retries: u32) -> Result<FocusResult> {
        let retries = retries.max(1);
        let mut target = original.clone();
        let mut point = focus_point(&target);
        let mut state = FocusState::Idle;
        let mut last_reason: Option<String> = None;
        let mut last_error: Option<SimError> = None;
        let mut last_interactive: Option<usize> = None;

        for attempt in 1..=retries {
            debug!(attempt, %state, x = point.x, y = point.y, id = %target.id, "focus tap");
            if let Err(e) = self.device.tap(point) {
                last_error = Some(e.recode("IDB_UI_FAILED", "focus tap failed"));
                continue;
            }
            state = FocusState::TapSent;
            pause(self.timing.focus_settle);

            let snapshot = match self.device.capture_elements() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };
            state = FocusState::Verifying;
            last_interactive = Some(snapshot.visible_interactive_count());
            debug!(attempt, %state, interactive = ?last_interactive, "checking focus");

            let Some(matched) = find_best_verification_target(&snapshot.elements, &target) else {
                last_reason = Some("target element not found after tap".into());
                state = FocusState::Untrusted;
                continue;
            };
            target = matched.clone();
            point = focus_point(&target);

            if can_trust_focus(&snapshot.elements, original) {
                state = FocusState::Trusted;
                debug!(attempt, %state, id = %target.id, "focus acquired");
                return Ok(FocusResult {
                    element: target,
                    tap_point: point,
                    attempts: attempt,
                });
            }
            state = FocusState::Untrusted;
            last_reason = Some("focus moved to different element".into());
            debug!(attempt, %state, "focus not trusted");
        }

        state = FocusState::Exhausted;
        warn!(attempts = retries, %state, id = %original.id, "focus retries exhausted");
        Err(SimError::FocusFailed {
            selector_id: original.id.trim().to_string(),
            attempts: retries,
            reason: last_reason,
            last_error: last_error.map(Box::new),
            interactive: last_interactive,
        })
    }
}
