use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::automation::actions::Automation;
use crate::automation::outcome::ActionOutcome;
use crate::device::Device;
use crate::error::{Result, SimError};
use crate::flow::context::{FlowContext, StepRecord};
use crate::flow::flow_model::{FlowAction, FlowFile, FlowStep};
use crate::frame::capture::timestamped_dir;
use crate::frame::store::write_json_file;
use crate::trace::TraceLogger;

/// Result of a completed flow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowReport {
    pub action: &'static str,
    pub name: String,
    pub file: String,
    pub resume_from: usize,
    pub steps: Vec<StepRecord>,
}

/// Executes flow steps one after another through [`Automation`]. The first
/// failing step stops the run.
pub struct FlowRunner<'a, D: ?Sized> {
    automation: Automation<'a, D>,
    trace: Option<&'a TraceLogger>,
    artifact_dir: Option<PathBuf>,
}

impl<'a, D: Device + ?Sized> FlowRunner<'a, D> {
    pub fn new(automation: Automation<'a, D>) -> Self {
        FlowRunner {
            automation,
            trace: None,
            artifact_dir: None,
        }
    }

    pub fn with_trace(mut self, trace: &'a TraceLogger) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Failure artifacts go to `<dir>/step-NN` instead of a timestamped
    /// directory under the system temp dir.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn run(&self, flow: &FlowFile, file: &str, resume_from: usize) -> Result<FlowReport> {
        if resume_from == 0 {
            return Err(SimError::usage("--resume-from must be >= 1"));
        }
        if flow.steps.is_empty() {
            return Err(SimError::usage("flow file must include at least one step"));
        }
        if resume_from > flow.steps.len() {
            return Err(SimError::usage("--resume-from exceeds number of steps"));
        }

        let mut ctx = FlowContext::new(resume_from);
        for step in &flow.steps[resume_from - 1..] {
            info!(step = ctx.current_step, action = %step.action_name(), name = %step.name.trim(), "flow step");
            let result = self.execute_step(step);
            if let Some(trace) = self.trace {
                trace.record(&step.action_name(), Some(ctx.current_step), &result);
            }
            match result {
                Ok(outcome) => ctx.record(&step.name, outcome),
                Err(e) => {
                    warn!(step = ctx.current_step, code = e.code(), error = %e, "flow step failed");
                    let artifacts = capture_failure_artifacts(self.automation.device(), &self.failure_dir(ctx.current_step));
                    return Err(SimError::FlowStepFailed {
                        step: ctx.current_step,
                        name: step.name.trim().to_string(),
                        action: step.action.trim().to_string(),
                        source: Box::new(e),
                        artifacts,
                    });
                }
            }
            ctx.advance();
        }

        info!(steps = ctx.completed(), "flow completed");
        Ok(FlowReport {
            action: "flow-run",
            name: flow.name.clone(),
            file: file.to_string(),
            resume_from,
            steps: ctx.results,
        })
    }

    /// Execute a single step.
    fn execute_step(&self, step: &FlowStep) -> Result<ActionOutcome> {
        let automation = &self.automation;
        match step.to_action()? {
            FlowAction::Tap(target) => automation.tap(&target, None).map(ActionOutcome::Tap),
            FlowAction::Type(req) => automation.type_text(&req, None).map(ActionOutcome::Type),
            FlowAction::Clear(query) => automation.clear(&query, None, None).map(ActionOutcome::Clear),
            FlowAction::Swipe {
                direction,
                query,
                distance,
            } => automation
                .swipe(direction, query.as_ref(), None, distance)
                .map(ActionOutcome::Swipe),
            FlowAction::Wait(cond) => automation.wait(&cond).map(ActionOutcome::Wait),
        }
    }

    fn failure_dir(&self, step: usize) -> PathBuf {
        match &self.artifact_dir {
            Some(dir) => dir.join(format!("step-{:02}", step)),
            None => {
                let mut dir: OsString = timestamped_dir("flow-failure-").into_os_string();
                dir.push(format!("-step-{:02}", step));
                PathBuf::from(dir)
            }
        }
    }
}

/// Screenshot and raw UI tree for a failed step. Never fails; whatever could
/// be captured is listed in the returned object.
pub fn capture_failure_artifacts<D: Device + ?Sized>(device: &D, out_dir: &Path) -> Value {
    let mut out = Map::new();
    out.insert("outDir".into(), json!(out_dir.to_string_lossy()));
    if let Err(e) = fs::create_dir_all(out_dir) {
        out.insert("error".into(), json!(e.to_string()));
        return Value::Object(out);
    }

    let screenshot = out_dir.join("screen.png");
    if device.screenshot(&screenshot).is_ok() {
        out.insert("screenshot".into(), json!(screenshot.to_string_lossy()));
    }

    if let Ok(raw) = device.capture_raw() {
        let raw_path = out_dir.join("ui.raw.json");
        if write_json_file(&raw_path, &raw).is_ok() {
            out.insert("uiRaw".into(), json!(raw_path.to_string_lossy()));
        }
    }
    Value::Object(out)
}
