use serde::Serialize;

use crate::automation::outcome::ActionOutcome;

/// Result of one completed flow step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    #[serde(flatten)]
    pub result: ActionOutcome,
    pub step: usize,
    pub name: String,
}

/// Tracks the position and completed steps of a running flow.
#[derive(Debug, Clone)]
pub struct FlowContext {
    /// Current step (1-based, as reported to the caller)
    pub current_step: usize,

    pub results: Vec<StepRecord>,
}

impl FlowContext {
    pub fn new(resume_from: usize) -> Self {
        FlowContext {
            current_step: resume_from,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &str, result: ActionOutcome) {
        self.results.push(StepRecord {
            result,
            step: self.current_step,
            name: name.trim().to_string(),
        });
    }

    pub fn advance(&mut self) {
        self.current_step += 1;
    }

    pub fn completed(&self) -> usize {
        self.results.len()
    }
}
