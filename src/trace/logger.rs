use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::automation::outcome::ActionOutcome;
use crate::error::Result;
use crate::trace::trace::TraceEvent;

#[derive(Debug)]
struct TraceSink {
    file: File,
    written: u64,
}

/// Appends one numbered JSON line per action to `--trace <path>`.
///
/// Trace output never affects the action being traced: failures to open,
/// serialize or write only warn. A logger whose file could not be opened stays
/// disabled for the rest of the invocation.
#[derive(Debug, Default)]
pub struct TraceLogger {
    path: PathBuf,
    sink: Option<Mutex<TraceSink>>,
}

impl TraceLogger {
    pub fn new(path: &Path) -> Self {
        let sink = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Mutex::new(TraceSink { file, written: 0 })),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open trace file, tracing disabled");
                None
            }
        };
        Self {
            path: path.to_path_buf(),
            sink,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Lines appended by this logger so far.
    pub fn written(&self) -> u64 {
        self.sink
            .as_ref()
            .and_then(|s| s.lock().ok().map(|s| s.written))
            .unwrap_or(0)
    }

    /// Trace the result of one action, optionally as a numbered flow step.
    pub fn record(&self, action: &str, step: Option<usize>, result: &Result<ActionOutcome>) {
        if !self.is_enabled() {
            return;
        }
        let mut event = match result {
            Ok(outcome) => TraceEvent::now(outcome.action()).with_outcome(outcome),
            Err(e) => TraceEvent::now(action).with_error(e),
        };
        event.step = step;
        self.log(event);
    }

    /// Stamp `event` with the next sequence number and append it.
    pub fn log(&self, mut event: TraceEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut sink = match sink.lock() {
            Ok(sink) => sink,
            Err(e) => {
                warn!(error = %e, "trace logger lock poisoned");
                return;
            }
        };

        event.seq = Some(sink.written + 1);
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(action = %event.action, error = %e, "failed to serialize trace event");
                return;
            }
        };
        match writeln!(sink.file, "{}", line) {
            Ok(()) => sink.written += 1,
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to write trace event"),
        }
    }
}
