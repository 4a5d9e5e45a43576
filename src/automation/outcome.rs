use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::input::text::{InputMode, TypeVerification};
use crate::selector::SelectorQuery;
use crate::sync::wait::WaitOutcome;
use crate::tree::element::FramePoint;

/// How a selector was finally satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvedBy {
    /// Saved frame (`--from` or the last frame).
    Frame,
    LiveScan,
    IntentFallback,
    SystemFallback,
}

impl ResolvedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedBy::Frame => "frame",
            ResolvedBy::LiveScan => "live-scan",
            ResolvedBy::IntentFallback => "intent-fallback",
            ResolvedBy::SystemFallback => "system-fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ResolvedBy::IntentFallback | ResolvedBy::SystemFallback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// End point of a swipe of `distance` points starting at `from`.
    pub fn apply(&self, from: FramePoint, distance: f64) -> FramePoint {
        let mut to = from;
        match self {
            Direction::Up => to.y -= distance,
            Direction::Down => to.y += distance,
            Direction::Left => to.x -= distance,
            Direction::Right => to.x += distance,
        }
        to
    }
}

impl FromStr for Direction {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(SimError::usage("direction must be up|down|left|right")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TapOutcome {
    /// `coord`, or the selector kind (`index`, `id`, `label`, `contains`).
    pub by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<ResolvedBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    pub target_pt: FramePoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeOutcome {
    pub text: String,
    pub input_mode: InputMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub replace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backspaces: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<TypeVerification>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearOutcome {
    pub backspaces: usize,
    pub selector: SelectorQuery,
    pub element_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeOutcome {
    pub direction: Direction,
    pub from_pt: FramePoint,
    pub to_pt: FramePoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonOutcome {
    pub button: String,
}

/// Result of one action, tagged with its action name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ActionOutcome {
    Tap(TapOutcome),
    Type(TypeOutcome),
    Clear(ClearOutcome),
    Swipe(SwipeOutcome),
    Wait(WaitOutcome),
    Button(ButtonOutcome),
}

impl ActionOutcome {
    pub fn action(&self) -> &'static str {
        match self {
            ActionOutcome::Tap(_) => "tap",
            ActionOutcome::Type(_) => "type",
            ActionOutcome::Clear(_) => "clear",
            ActionOutcome::Swipe(_) => "swipe",
            ActionOutcome::Wait(_) => "wait",
            ActionOutcome::Button(_) => "button",
        }
    }

    /// Human one-liner for non-JSON output.
    pub fn summary(&self) -> String {
        match self {
            ActionOutcome::Tap(t) => format!("tap {:.2} {:.2}", t.target_pt.x, t.target_pt.y),
            ActionOutcome::Type(t) => format!("typed: {}", t.text),
            ActionOutcome::Clear(c) => format!("cleared ({} backspaces)", c.backspaces),
            ActionOutcome::Swipe(s) => format!("swipe {}", s.direction),
            ActionOutcome::Wait(w) => format!("wait ok ({} attempts)", w.attempts),
            ActionOutcome::Button(b) => format!("button {}", b.button),
        }
    }
}
