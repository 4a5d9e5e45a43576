use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Every failure the automation engine can report.
///
/// Each variant carries a stable code (see [`SimError::code`]), a human message
/// (its `Display`), and structured details (see [`SimError::details`]) rich
/// enough to diagnose a failure without re-running it.
#[derive(Debug, Clone, Error)]
pub enum SimError {
    /// Caller contract violation. Never retried.
    #[error("{0}")]
    Usage(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0}")]
    ElementNotFound(String),

    #[error("failed to verify focus target after retries")]
    FocusFailed {
        selector_id: String,
        attempts: u32,
        reason: Option<String>,
        last_error: Option<Box<SimError>>,
        interactive: Option<usize>,
    },

    #[error("text became empty after ASCII normalization")]
    AsciiEmpty,

    #[error("{message}")]
    TypeIncomplete {
        message: String,
        intended: String,
        observed: String,
        missing: Option<String>,
        attempt: Option<u32>,
        element_id: Option<String>,
    },

    #[error("{message}")]
    TypeVerifyFailed { message: String, details: Map<String, Value> },

    #[error("ui tree changed during stable sampling")]
    FrameUnstable {
        hashes: Vec<String>,
        samples: usize,
        interval: Duration,
    },

    #[error("wait condition not met before timeout")]
    WaitTimeout {
        attempts: u32,
        elapsed_ms: u128,
        interactive: usize,
        interactive_min: Option<usize>,
        has_text: Option<String>,
        last_matches: Vec<String>,
        last_error: Option<Box<SimError>>,
    },

    #[error("flow step {step} failed")]
    FlowStepFailed {
        step: usize,
        name: String,
        action: String,
        source: Box<SimError>,
        artifacts: Value,
    },

    /// A transport failure re-coded at a known call site, e.g. a failed
    /// `idb ui tap` becomes `IDB_UI_FAILED`.
    #[error("{message}")]
    Recoded {
        code: &'static str,
        message: String,
        cause: Box<SimError>,
    },

    /// A lower-level error (io, json, parse) wrapped with a domain code.
    #[error("{message}")]
    Wrapped {
        code: &'static str,
        message: String,
        cause: Option<String>,
    },

    #[error("command timed out: {command}")]
    Timeout { command: String, stderr: String },

    #[error("command failed: {program}")]
    CommandFailed {
        program: String,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("idb is not installed or not in PATH")]
    IdbNotFound,

    #[error("no booted simulator found")]
    NoBootedDevice,

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("default target is not set")]
    NoDefaultTarget,

    #[error("no last frame found; run `simagent frame` first")]
    NoLastFrame,

    #[error("{0}")]
    CoordTransform(String),
}

impl SimError {
    pub fn usage(message: impl Into<String>) -> Self {
        SimError::Usage(message.into())
    }

    pub fn io(message: impl Into<String>, cause: impl ToString) -> Self {
        SimError::wrap("IO_ERROR", message, cause)
    }

    pub fn wrap(code: &'static str, message: impl Into<String>, cause: impl ToString) -> Self {
        SimError::Wrapped {
            code,
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    /// Re-code a failure for the call site that observed it. The original code
    /// and message survive in the details as `causeCode`/`causeMessage`.
    pub fn recode(self, code: &'static str, message: impl Into<String>) -> Self {
        if self.code() == code {
            return self;
        }
        SimError::Recoded {
            code,
            message: message.into(),
            cause: Box::new(self),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SimError::Usage(_) => "USAGE",
            SimError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            SimError::ElementNotFound(_) => "ELEMENT_NOT_FOUND",
            SimError::FocusFailed { .. } => "TYPE_FOCUS_FAILED",
            SimError::AsciiEmpty => "TYPE_ASCII_EMPTY",
            SimError::TypeIncomplete { .. } => "TYPE_INCOMPLETE",
            SimError::TypeVerifyFailed { .. } => "TYPE_VERIFY_FAILED",
            SimError::FrameUnstable { .. } => "FRAME_UNSTABLE",
            SimError::WaitTimeout { .. } => "WAIT_TIMEOUT",
            SimError::FlowStepFailed { .. } => "FLOW_STEP_FAILED",
            SimError::Recoded { code, .. } => code,
            SimError::Wrapped { code, .. } => code,
            SimError::Timeout { .. } => "TIMEOUT",
            SimError::CommandFailed { .. } => "COMMAND_FAILED",
            SimError::CommandNotFound(_) => "COMMAND_NOT_FOUND",
            SimError::IdbNotFound => "IDB_NOT_FOUND",
            SimError::NoBootedDevice => "NO_BOOTED_DEVICE",
            SimError::TargetNotFound(_) => "TARGET_NOT_FOUND",
            SimError::NoDefaultTarget => "NO_DEFAULT_TARGET",
            SimError::NoLastFrame => "NO_LAST_FRAME",
            SimError::CoordTransform(_) => "COORD_TRANSFORM_FAILED",
        }
    }

    pub fn details(&self) -> Map<String, Value> {
        let mut out = Map::new();
        match self {
            SimError::FocusFailed {
                selector_id,
                attempts,
                reason,
                last_error,
                interactive,
            } => {
                out.insert("selectorId".into(), json!(selector_id));
                out.insert("attempts".into(), json!(attempts));
                if let Some(reason) = reason {
                    out.insert("reason".into(), json!(reason));
                }
                if let Some(err) = last_error {
                    out.insert("lastError".into(), err.render());
                }
                if let Some(count) = interactive {
                    out.insert("interactive".into(), json!(count));
                }
            }
            SimError::TypeIncomplete {
                intended,
                observed,
                missing,
                attempt,
                element_id,
                ..
            } => {
                out.insert("intended".into(), json!(intended));
                out.insert("observed".into(), json!(observed));
                if let Some(missing) = missing {
                    out.insert("missing".into(), json!(missing));
                }
                if let Some(attempt) = attempt {
                    out.insert("attempt".into(), json!(attempt));
                }
                if let Some(id) = element_id {
                    out.insert("elementId".into(), json!(id));
                }
            }
            SimError::TypeVerifyFailed { details, .. } => {
                out.extend(details.clone());
            }
            SimError::FrameUnstable {
                hashes,
                samples,
                interval,
            } => {
                out.insert("hashes".into(), json!(hashes));
                out.insert("samples".into(), json!(samples));
                out.insert(
                    "interval".into(),
                    json!(humantime::format_duration(*interval).to_string()),
                );
            }
            SimError::WaitTimeout {
                attempts,
                elapsed_ms,
                interactive,
                interactive_min,
                has_text,
                last_matches,
                last_error,
            } => {
                out.insert("attempts".into(), json!(attempts));
                out.insert("elapsedMs".into(), json!(elapsed_ms));
                out.insert("interactive".into(), json!(interactive));
                out.insert("interactiveMin".into(), json!(interactive_min));
                if let Some(text) = has_text {
                    out.insert("hasText".into(), json!(text));
                    out.insert("lastMatches".into(), json!(last_matches));
                }
                if let Some(err) = last_error {
                    out.insert("lastError".into(), err.render());
                }
            }
            SimError::FlowStepFailed {
                step,
                name,
                action,
                source,
                artifacts,
            } => {
                out.insert("step".into(), json!(step));
                out.insert("name".into(), json!(name));
                out.insert("action".into(), json!(action));
                out.insert("resumeFrom".into(), json!(step));
                out.insert("error".into(), source.render());
                out.insert("artifacts".into(), artifacts.clone());
            }
            SimError::Recoded { cause, .. } => {
                out.extend(cause.details());
                out.insert("causeCode".into(), json!(cause.code()));
                out.insert("causeMessage".into(), json!(cause.to_string()));
            }
            SimError::Wrapped { cause, .. } => {
                if let Some(cause) = cause {
                    out.insert("cause".into(), json!(cause));
                }
            }
            SimError::Timeout { stderr, .. } => {
                out.insert("stderr".into(), json!(stderr));
            }
            SimError::CommandFailed {
                stdout,
                stderr,
                exit_code,
                ..
            } => {
                out.insert("stderr".into(), json!(stderr));
                out.insert("stdout".into(), json!(stdout));
                out.insert("exitCode".into(), json!(exit_code));
            }
            _ => {}
        }
        out
    }

    /// `{code, message, details?}`
    pub fn render(&self) -> Value {
        serde_json::to_value(self.body()).unwrap_or_else(|_| json!({ "code": self.code() }))
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: self.body(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

/// Failure rendering shared by every command: `{ok: false, error: {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorBody,
}
