use std::path::Path;

use tracing::{debug, info};

use crate::automation::outcome::{
    ButtonOutcome, ClearOutcome, Direction, ResolvedBy, SwipeOutcome, TapOutcome, TypeOutcome,
};
use crate::device::Device;
use crate::error::{Result, SimError};
use crate::frame::store::FrameSource;
use crate::input::Timing;
use crate::input::clear::{clear_focused_input, clear_point, estimate_clear_backspaces};
use crate::input::focus::{FocusController, FocusResult, focus_point};
use crate::input::text::{TextReconciler, prepare_typed_text, verify_typed_text};
use crate::selector::fallback::{pick_intent_fallback, pick_system_fallback};
use crate::selector::resolve::resolve;
use crate::selector::SelectorQuery;
use crate::sync::wait::{WaitCondition, WaitOutcome, wait_for_condition};
use crate::tree::element::{Element, FramePoint};

pub const DEFAULT_FOCUS_RETRIES: u32 = 2;
pub const DEFAULT_SWIPE_DISTANCE: f64 = 220.0;
/// Swipe origin when neither an element nor a saved transform is available.
pub const DEFAULT_SWIPE_ORIGIN: FramePoint = FramePoint { x: 196.0, y: 426.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    Pt,
    Px,
}

impl std::str::FromStr for Unit {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pt" => Ok(Unit::Pt),
            "px" => Ok(Unit::Px),
            _ => Err(SimError::usage("--unit must be pt|px")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TapTarget {
    Point { x: f64, y: f64, unit: Unit },
    Element(SelectorQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRequest {
    pub text: String,
    /// Focus this element first (`--into`).
    pub into: Option<SelectorQuery>,
    pub replace: bool,
    pub ascii: bool,
    pub paste: bool,
    pub verify: bool,
    pub focus_retries: u32,
}

impl TypeRequest {
    pub fn new(text: impl Into<String>) -> Self {
        TypeRequest {
            text: text.into(),
            into: None,
            replace: false,
            ascii: false,
            paste: false,
            verify: false,
            focus_retries: DEFAULT_FOCUS_RETRIES,
        }
    }

    pub fn into_element(mut self, query: SelectorQuery) -> Self {
        self.into = Some(query);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(SimError::usage("text is required"));
        }
        if self.replace && self.into.is_none() {
            return Err(SimError::usage("--replace requires --into"));
        }
        if let Some(query) = &self.into {
            if query.count() != 1 {
                return Err(SimError::usage(
                    "--into requires exactly one selector: --index|--id|--label|--contains",
                ));
            }
        }
        if self.focus_retries == 0 {
            return Err(SimError::usage("--focus-retries must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub element: Element,
    pub by: ResolvedBy,
}

/// The action surface: every call takes a fresh look at the device and
/// carries no state into the next call.
pub struct Automation<'a, D: ?Sized> {
    device: &'a D,
    frames: &'a dyn FrameSource,
    timing: Timing,
}

impl<D: ?Sized> Clone for Automation<'_, D> {
    fn clone(&self) -> Self {
        Automation {
            device: self.device,
            frames: self.frames,
            timing: self.timing.clone(),
        }
    }
}

impl<'a, D: Device + ?Sized> Automation<'a, D> {
    pub fn new(device: &'a D, frames: &'a dyn FrameSource) -> Self {
        Automation {
            device,
            frames,
            timing: Timing::default(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn device(&self) -> &'a D {
        self.device
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Saved frame, then a live snapshot, then the intent and system
    /// fallbacks. The saved frame must load when it was asked for
    /// explicitly or the selector is an index/id.
    pub fn resolve_element(&self, query: &SelectorQuery, from: Option<&Path>) -> Result<Resolution> {
        let selector = query.selector()?;

        let saved = if from.is_some() || selector.is_direct() {
            self.frames.load_frame(from)?.elements
        } else {
            self.frames
                .load_frame(from)
                .map(|f| f.elements)
                .unwrap_or_default()
        };
        let first_err = match resolve(&saved, &selector) {
            Ok(element) => {
                return Ok(Resolution {
                    element,
                    by: ResolvedBy::Frame,
                });
            }
            Err(e) => e,
        };

        let Ok(snapshot) = self.device.capture_elements() else {
            return Err(first_err);
        };
        let live_err = match resolve(&snapshot.elements, &selector) {
            Ok(element) => {
                debug!(kind = selector.kind(), id = %element.id, "resolved by live scan");
                return Ok(Resolution {
                    element,
                    by: ResolvedBy::LiveScan,
                });
            }
            Err(e) => e,
        };

        if let Some(text) = selector.text() {
            if let Some(element) = pick_intent_fallback(&snapshot.elements, text) {
                info!(query = text, id = %element.id, "resolved by intent fallback");
                return Ok(Resolution {
                    element,
                    by: ResolvedBy::IntentFallback,
                });
            }
            if let Some(element) = pick_system_fallback(&snapshot.elements, text) {
                info!(query = text, id = %element.id, "resolved by system fallback");
                return Ok(Resolution {
                    element,
                    by: ResolvedBy::SystemFallback,
                });
            }
        }
        Err(live_err)
    }

    pub fn focus(&self, element: &Element, retries: u32) -> Result<FocusResult> {
        FocusController::new(self.device, &self.timing).acquire(element, retries)
    }

    pub fn tap(&self, target: &TapTarget, from: Option<&Path>) -> Result<TapOutcome> {
        let (point, by, resolved_by, selector, element_id) = match target {
            TapTarget::Point { x, y, unit } => {
                let point = match unit {
                    Unit::Pt => FramePoint { x: *x, y: *y },
                    Unit::Px => {
                        let frame = self.frames.load_frame(from)?;
                        frame
                            .transform
                            .px_to_pt(*x, *y)
                            .ok_or_else(|| SimError::CoordTransform("invalid transform scale".into()))?
                    }
                };
                (point, "coord".to_string(), None, None, None)
            }
            TapTarget::Element(query) => {
                let selector = query.selector()?;
                let resolution = self.resolve_element(query, from)?;
                let point = if resolution.element.is_text_input() {
                    focus_point(&resolution.element)
                } else {
                    resolution.element.center
                };
                (
                    point,
                    selector.kind().to_string(),
                    Some(resolution.by),
                    Some(query.clone()),
                    Some(resolution.element.id),
                )
            }
        };

        self.device
            .tap(point)
            .map_err(|e| e.recode("IDB_UI_FAILED", "tap failed"))?;
        Ok(TapOutcome {
            by,
            resolved_by,
            selector,
            element_id,
            target_pt: point,
        })
    }

    pub fn type_text(&self, req: &TypeRequest, from: Option<&Path>) -> Result<TypeOutcome> {
        req.validate()?;
        let prepared = prepare_typed_text(&req.text, req.ascii, req.paste)?;

        let mut focused: Option<Element> = None;
        let mut backspaces = None;
        if let Some(query) = &req.into {
            let resolution = self.resolve_element(query, from)?;
            let focus = self.focus(&resolution.element, req.focus_retries)?;
            if req.replace {
                let point = clear_point(&focus.element);
                self.device
                    .tap(point)
                    .map_err(|e| e.recode("IDB_UI_FAILED", "focus tap failed before replace"))?;
                let count = estimate_clear_backspaces(&focus.element);
                clear_focused_input(self.device, count)?;
                backspaces = Some(count);
            }
            focused = Some(focus.element);
        }

        TextReconciler::new(self.device, &self.timing).submit(&prepared.text, focused.as_ref())?;

        let verify = if req.verify {
            Some(verify_typed_text(self.device, &prepared.text, focused.as_ref())?)
        } else {
            None
        };
        Ok(TypeOutcome {
            text: prepared.text,
            input_mode: prepared.mode,
            element_id: focused.map(|e| e.id),
            replace: req.replace,
            backspaces,
            verified: verify.is_some(),
            verify,
        })
    }

    /// `min_backspaces` is a floor; the estimate from the current value may
    /// raise it.
    pub fn clear(
        &self,
        query: &SelectorQuery,
        from: Option<&Path>,
        min_backspaces: Option<usize>,
    ) -> Result<ClearOutcome> {
        query.selector()?;
        if min_backspaces == Some(0) {
            return Err(SimError::usage("--max-backspaces must be > 0"));
        }
        let resolution = self.resolve_element(query, from)?;
        let element = resolution.element;
        self.focus(&element, DEFAULT_FOCUS_RETRIES)?;

        self.device
            .tap(clear_point(&element))
            .map_err(|e| e.recode("IDB_UI_FAILED", "focus tap failed before clear"))?;
        let count = estimate_clear_backspaces(&element).max(min_backspaces.unwrap_or(0));
        clear_focused_input(self.device, count)?;

        Ok(ClearOutcome {
            backspaces: count,
            selector: query.clone(),
            element_id: element.id,
        })
    }

    /// Starts at the selected element, else the saved screen center, else a
    /// fixed default origin. Only index/id selectors are accepted. A flow step
    /// without a positive distance swipes the default 220pt.
    pub fn swipe(
        &self,
        direction: Direction,
        query: Option<&SelectorQuery>,
        from: Option<&Path>,
        distance: f64,
    ) -> Result<SwipeOutcome> {
        let distance = if distance > 0.0 { distance } else { DEFAULT_SWIPE_DISTANCE };

        let start = match query.filter(|q| !q.is_empty()) {
            Some(query) => {
                if !query.selector()?.is_direct() {
                    return Err(SimError::usage("swipe accepts only --index|--id"));
                }
                self.resolve_element(query, from)?.element.center
            }
            None => self
                .frames
                .load_frame(from)
                .ok()
                .and_then(|f| f.transform.screen_center())
                .unwrap_or(DEFAULT_SWIPE_ORIGIN),
        };
        let end = direction.apply(start, distance);

        self.device
            .swipe(start, end)
            .map_err(|e| e.recode("IDB_UI_FAILED", "swipe failed"))?;
        Ok(SwipeOutcome {
            direction,
            from_pt: start,
            to_pt: end,
        })
    }

    /// No argument checks here: unset parts of the condition hold trivially.
    /// `ui wait` validates its flags before it gets this far.
    pub fn wait(&self, cond: &WaitCondition) -> Result<WaitOutcome> {
        wait_for_condition(self.device, cond)
    }

    pub fn button(&self, name: &str) -> Result<ButtonOutcome> {
        let button = name.trim().to_uppercase();
        if button.is_empty() {
            return Err(SimError::usage("usage: simagent ui button HOME|LOCK|SIRI"));
        }
        self.device
            .button(&button)
            .map_err(|e| e.recode("IDB_UI_FAILED", "button failed"))?;
        Ok(ButtonOutcome { button })
    }
}
