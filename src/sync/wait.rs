use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::device::SnapshotProvider;
use crate::error::{Result, SimError};
use crate::tree::element::Element;

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(700);
pub const MAX_TEXT_SAMPLES: usize = 3;
/// Floor for the poll interval so a zero interval from a flow file never spins.
pub const MIN_WAIT_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct WaitCondition {
    pub has_text: Option<String>,
    pub interactive_min: Option<usize>,
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitCondition {
    fn default() -> Self {
        WaitCondition {
            has_text: None,
            interactive_min: None,
            timeout: DEFAULT_WAIT_TIMEOUT,
            interval: DEFAULT_WAIT_INTERVAL,
        }
    }
}

impl WaitCondition {
    /// Flag checks for `ui wait`. Flow steps skip these.
    pub fn validate(&self) -> Result<()> {
        if self.needle().is_none() && self.interactive_min.is_none() {
            return Err(SimError::usage(
                "ui wait requires --has-text and/or --interactive-min",
            ));
        }
        if self.timeout.is_zero() {
            return Err(SimError::usage("--timeout must be > 0"));
        }
        if self.interval.is_zero() {
            return Err(SimError::usage("--interval must be > 0"));
        }
        Ok(())
    }

    fn needle(&self) -> Option<String> {
        self.has_text
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitOutcome {
    pub attempts: u32,
    pub elapsed_ms: u128,
    pub interactive: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<String>>,
}

/// Up to three `label value` samples of enabled elements containing `needle`.
pub fn matching_text_samples(elements: &[Element], needle: &str) -> Vec<String> {
    if needle.is_empty() {
        return Vec::new();
    }
    elements
        .iter()
        .filter(|e| e.enabled && e.text().contains(needle))
        .map(|e| format!("{} {}", e.label, e.value).trim().to_string())
        .take(MAX_TEXT_SAMPLES)
        .collect()
}

/// Poll fresh snapshots until the condition holds or the timeout passes.
/// Snapshot failures are remembered and reported, never fatal on their own.
pub fn wait_for_condition<D: SnapshotProvider + ?Sized>(
    device: &D,
    cond: &WaitCondition,
) -> Result<WaitOutcome> {
    let started = Instant::now();
    let needle = cond.needle();
    let mut attempts = 0;
    let mut last_interactive = 0;
    let mut last_matches = Vec::new();
    let mut last_error: Option<SimError>;

    loop {
        attempts += 1;
        match device.capture_elements() {
            Err(e) => {
                debug!(attempts, code = e.code(), "wait poll failed");
                last_error = Some(e);
            }
            Ok(snapshot) => {
                last_error = None;
                last_interactive = snapshot.visible_interactive_count();
                let matches = needle
                    .as_deref()
                    .map(|n| matching_text_samples(&snapshot.elements, n))
                    .unwrap_or_default();
                let interactive_ok = cond.interactive_min.is_none_or(|min| last_interactive >= min);
                let text_ok = needle.is_none() || !matches.is_empty();
                debug!(attempts, interactive = last_interactive, matches = matches.len(), "wait poll");
                if interactive_ok && text_ok {
                    let has_text = needle.is_some().then(|| cond.has_text.clone()).flatten();
                    return Ok(WaitOutcome {
                        attempts,
                        elapsed_ms: started.elapsed().as_millis(),
                        interactive: last_interactive,
                        matches: has_text.as_ref().map(|_| matches),
                        has_text,
                    });
                }
                last_matches = matches;
            }
        }

        if started.elapsed() >= cond.timeout {
            return Err(SimError::WaitTimeout {
                attempts,
                elapsed_ms: started.elapsed().as_millis(),
                interactive: last_interactive,
                interactive_min: cond.interactive_min,
                has_text: needle.is_some().then(|| cond.has_text.clone()).flatten(),
                last_matches,
                last_error: last_error.map(Box::new),
            });
        }
        thread::sleep(cond.interval.max(MIN_WAIT_INTERVAL));
    }
}
