use std::path::Path;

use serde_json::{Value, json};

use crate::error::{Result, SimError};
use crate::tree::element::{ElementSet, FramePoint};
use crate::tree::normalize::{NormalizeOptions, normalize};

/// Source of raw accessibility snapshots.
pub trait SnapshotProvider {
    /// Unparsed snapshot text as the introspection tool printed it.
    fn describe_ui(&self) -> Result<String>;

    /// Parsed snapshot. A transport failure is reported as `IDB_UI_FAILED`.
    fn capture_raw(&self) -> Result<Value> {
        let out = self
            .describe_ui()
            .map_err(|e| e.recode("IDB_UI_FAILED", "failed to capture ui tree"))?;
        serde_json::from_str(&out)
            .map_err(|e| SimError::wrap("IDB_UI_FAILED", "failed to parse ui tree json", e))
    }

    /// Like [`capture_raw`](Self::capture_raw), but keeps unparseable output
    /// as `{"raw": <text>}` instead of failing.
    fn capture_raw_lenient(&self) -> Result<Value> {
        let out = self
            .describe_ui()
            .map_err(|e| e.recode("IDB_UI_FAILED", "failed to capture ui tree"))?;
        Ok(serde_json::from_str(&out).unwrap_or_else(|_| json!({ "raw": out })))
    }

    /// Fresh element set in reading order, interactive and non-interactive.
    fn capture_elements(&self) -> Result<ElementSet> {
        let raw = self.capture_raw()?;
        Ok(normalize(&raw, &NormalizeOptions::default()))
    }
}

/// Touch and keystroke injection. Errors are raw transport failures; call
/// sites re-code them.
pub trait Injector {
    fn tap(&self, point: FramePoint) -> Result<()>;
    fn type_text(&self, text: &str) -> Result<()>;
    fn swipe(&self, from: FramePoint, to: FramePoint) -> Result<()>;
    fn key(&self, code: &str) -> Result<()>;
    fn key_sequence(&self, codes: &[&str]) -> Result<()>;
    fn button(&self, name: &str) -> Result<()>;
}

pub trait ScreenCapturer {
    fn screenshot(&self, path: &Path) -> Result<()>;
}

/// Everything an automation needs from one simulator.
pub trait Device: SnapshotProvider + Injector + ScreenCapturer {}

impl<T: SnapshotProvider + Injector + ScreenCapturer> Device for T {}
