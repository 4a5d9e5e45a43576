use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::automation::actions::{DEFAULT_FOCUS_RETRIES, TapTarget, TypeRequest, Unit};
use crate::automation::outcome::Direction;
use crate::error::{Result, SimError};
use crate::selector::SelectorQuery;
use crate::sync::wait::{DEFAULT_WAIT_INTERVAL, DEFAULT_WAIT_TIMEOUT, WaitCondition};

/// A declarative flow: an ordered list of steps, loaded from JSON or YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowFile {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

/// One step as written in a flow file. Field names follow the file format;
/// [`FlowStep::to_action`] turns it into a checked [`FlowAction`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowStep {
    pub name: String,
    pub action: String,
    pub selectors: FlowSelectors,

    pub text: String,
    /// Unset means "focus the selector if exactly one is given".
    pub into: Option<bool>,
    pub verify: bool,
    pub replace: bool,
    pub ascii: bool,
    pub paste: bool,

    pub direction: String,
    pub distance: f64,

    pub unit: String,
    pub x: Option<f64>,
    pub y: Option<f64>,

    pub has_text: String,
    pub interactive_min: Option<i64>,
    pub timeout: String,
    pub interval: String,
    /// Overrides the top-level wait fields when set.
    pub wait: FlowWait,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSelectors {
    /// Negative values are treated as unset.
    pub index: Option<i64>,
    pub id: String,
    pub label: String,
    pub contains: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowWait {
    pub has_text: String,
    pub interactive_min: Option<i64>,
    pub timeout: String,
    pub interval: String,
}

/// A validated flow step.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowAction {
    Tap(TapTarget),
    Type(TypeRequest),
    Clear(SelectorQuery),
    Swipe {
        direction: Direction,
        query: Option<SelectorQuery>,
        distance: f64,
    },
    Wait(WaitCondition),
}

impl FlowAction {
    pub fn name(&self) -> &'static str {
        match self {
            FlowAction::Tap(_) => "tap",
            FlowAction::Type(_) => "type",
            FlowAction::Clear(_) => "clear",
            FlowAction::Swipe { .. } => "swipe",
            FlowAction::Wait(_) => "wait",
        }
    }
}

fn trimmed(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl FlowSelectors {
    pub fn query(&self) -> SelectorQuery {
        SelectorQuery {
            index: self.index.and_then(|i| usize::try_from(i).ok()),
            id: trimmed(&self.id),
            label: trimmed(&self.label),
            contains: trimmed(&self.contains),
        }
    }
}

impl FlowFile {
    /// `.yaml`/`.yml` files are YAML, everything else JSON.
    pub fn load(path: &Path) -> Result<FlowFile> {
        let body = fs::read_to_string(path).map_err(|e| SimError::io("failed to read flow file", e))?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml {
            FlowFile::from_yaml(&body)
        } else {
            FlowFile::from_json(&body)
        }
    }

    pub fn from_json(body: &str) -> Result<FlowFile> {
        serde_json::from_str(body).map_err(|e| SimError::io("failed to parse flow file json", e))
    }

    pub fn from_yaml(body: &str) -> Result<FlowFile> {
        serde_yaml::from_str(body).map_err(|e| SimError::io("failed to parse flow file yaml", e))
    }
}

impl FlowStep {
    pub fn action_name(&self) -> String {
        self.action.trim().to_lowercase()
    }

    pub fn to_action(&self) -> Result<FlowAction> {
        let action = self.action_name();
        match action.as_str() {
            "tap" => self.tap_action(),
            "type" => self.type_action(),
            "clear" => {
                let query = self.selectors.query();
                if query.count() != 1 {
                    return Err(SimError::usage("flow clear requires exactly one selector"));
                }
                Ok(FlowAction::Clear(query))
            }
            "swipe" => self.swipe_action(),
            "wait" => self.wait_action(),
            _ => Err(SimError::usage(format!("unsupported flow action: {}", action))),
        }
    }

    fn tap_action(&self) -> Result<FlowAction> {
        if let (Some(x), Some(y)) = (self.x, self.y) {
            let unit = match self.unit.trim() {
                "" => Unit::Pt,
                other => other.parse()?,
            };
            return Ok(FlowAction::Tap(TapTarget::Point { x, y, unit }));
        }
        let query = self.selectors.query();
        if query.count() != 1 {
            return Err(SimError::usage("flow tap requires x/y or exactly one selector"));
        }
        Ok(FlowAction::Tap(TapTarget::Element(query)))
    }

    fn type_action(&self) -> Result<FlowAction> {
        let Some(text) = trimmed(&self.text) else {
            return Err(SimError::usage("flow type requires text"));
        };
        let query = self.selectors.query();
        let into = self.into.unwrap_or(query.count() == 1);
        if into && query.count() != 1 {
            return Err(SimError::usage("flow type --into requires exactly one selector"));
        }
        Ok(FlowAction::Type(TypeRequest {
            text,
            into: into.then_some(query),
            replace: into && self.replace,
            ascii: self.ascii,
            paste: self.paste,
            verify: self.verify,
            focus_retries: DEFAULT_FOCUS_RETRIES,
        }))
    }

    fn swipe_action(&self) -> Result<FlowAction> {
        let direction = match self.direction.trim() {
            "" => Direction::Up,
            other => other
                .parse()
                .map_err(|_| SimError::usage("flow swipe direction must be up|down|left|right"))?,
        };
        // Only index/id address a swipe origin.
        let selectors = self.selectors.query();
        let query = SelectorQuery {
            index: selectors.index,
            id: selectors.id,
            ..Default::default()
        };
        Ok(FlowAction::Swipe {
            direction,
            query: (query.count() == 1).then_some(query),
            distance: self.distance,
        })
    }

    fn wait_action(&self) -> Result<FlowAction> {
        let has_text = trimmed(&self.wait.has_text).or_else(|| trimmed(&self.has_text));
        let interactive_min = self
            .wait
            .interactive_min
            .or(self.interactive_min)
            .and_then(|n| usize::try_from(n).ok());
        let timeout_raw = trimmed(&self.wait.timeout).or_else(|| trimmed(&self.timeout));
        let interval_raw = trimmed(&self.wait.interval).or_else(|| trimmed(&self.interval));

        let timeout = parse_flow_duration(timeout_raw.as_deref(), DEFAULT_WAIT_TIMEOUT)
            .map_err(|raw| SimError::usage(format!("invalid flow wait timeout: {}", raw)))?;
        let interval = parse_flow_duration(interval_raw.as_deref(), DEFAULT_WAIT_INTERVAL)
            .map_err(|raw| SimError::usage(format!("invalid flow wait interval: {}", raw)))?;

        Ok(FlowAction::Wait(WaitCondition {
            has_text,
            interactive_min,
            timeout,
            interval,
        }))
    }
}

fn parse_flow_duration(raw: Option<&str>, default: Duration) -> std::result::Result<Duration, String> {
    match raw {
        None => Ok(default),
        Some(raw) => humantime::parse_duration(raw).map_err(|_| raw.to_string()),
    }
}
