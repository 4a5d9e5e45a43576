use serde::Serialize;

use crate::automation::outcome::ActionOutcome;
use crate::error::SimError;
use crate::tree::element::FramePoint;

/// One JSONL line per executed action or flow step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    /// Line number within this invocation's trace, set when written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    pub action: String,

    /// `ok` or the failure code.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tap_point: Option<FramePoint>,
}

impl TraceEvent {
    pub fn now(action: impl Into<String>) -> Self {
        Self {
            seq: None,
            timestamp: chrono::Local::now().to_rfc3339(),
            step: None,
            action: action.into(),
            outcome: "ok".to_string(),
            message: None,
            by: None,
            element_id: None,
            tap_point: None,
        }
    }

    pub fn with_outcome(mut self, outcome: &ActionOutcome) -> Self {
        self.outcome = "ok".to_string();
        match outcome {
            ActionOutcome::Tap(t) => {
                self.by = Some(match t.resolved_by {
                    Some(resolved) => format!("{}:{}", t.by, resolved.as_str()),
                    None => t.by.clone(),
                });
                self.element_id = t.element_id.clone();
                self.tap_point = Some(t.target_pt);
            }
            ActionOutcome::Type(t) => self.element_id = t.element_id.clone(),
            ActionOutcome::Clear(c) => self.element_id = Some(c.element_id.clone()),
            _ => {}
        }
        self
    }

    pub fn with_error(mut self, err: &SimError) -> Self {
        self.outcome = err.code().to_string();
        self.message = Some(err.to_string());
        self
    }
}
