use std::path::Path;

use crate::device::command::{CommandOutput, CommandRunner, coord_arg};
use crate::device::ports::{Injector, ScreenCapturer, SnapshotProvider};
use crate::device::target::Simctl;
use crate::error::{Result, SimError};
use crate::tree::element::FramePoint;

pub const DEFAULT_IDB: &str = "idb";

/// Fail early with `IDB_NOT_FOUND` when idb cannot be located.
pub fn ensure_idb(idb: &str) -> Result<()> {
    which::which(idb).map(|_| ()).map_err(|_| SimError::IdbNotFound)
}

/// One booted simulator driven through idb (ui) and simctl (screenshots).
#[derive(Debug, Clone)]
pub struct IdbDevice {
    runner: CommandRunner,
    idb: String,
    udid: String,
    simctl: Simctl,
}

impl IdbDevice {
    pub fn new(runner: CommandRunner, idb: impl Into<String>, udid: impl Into<String>, simctl: Simctl) -> Self {
        IdbDevice {
            runner,
            idb: idb.into(),
            udid: udid.into(),
            simctl,
        }
    }

    pub fn udid(&self) -> &str {
        &self.udid
    }

    fn run_ui<S: AsRef<str>>(&self, args: &[S]) -> Result<CommandOutput> {
        let mut full: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        full.push("--udid".into());
        full.push(self.udid.clone());
        self.runner.run(&self.idb, &full)
    }
}

impl SnapshotProvider for IdbDevice {
    fn describe_ui(&self) -> Result<String> {
        Ok(self.run_ui(&["ui", "describe-all", "--json"])?.stdout)
    }
}

impl Injector for IdbDevice {
    fn tap(&self, point: FramePoint) -> Result<()> {
        self.run_ui(&["ui", "tap", &coord_arg(point.x), &coord_arg(point.y)])?;
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.run_ui(&["ui", "text", text])?;
        Ok(())
    }

    fn swipe(&self, from: FramePoint, to: FramePoint) -> Result<()> {
        self.run_ui(&[
            "ui",
            "swipe",
            &coord_arg(from.x),
            &coord_arg(from.y),
            &coord_arg(to.x),
            &coord_arg(to.y),
        ])?;
        Ok(())
    }

    fn key(&self, code: &str) -> Result<()> {
        self.run_ui(&["ui", "key", code])?;
        Ok(())
    }

    fn key_sequence(&self, codes: &[&str]) -> Result<()> {
        let mut args = Vec::with_capacity(codes.len() + 2);
        args.push("ui");
        args.push("key-sequence");
        args.extend_from_slice(codes);
        self.run_ui(&args)?;
        Ok(())
    }

    fn button(&self, name: &str) -> Result<()> {
        self.run_ui(&["ui", "button", name])?;
        Ok(())
    }
}

impl ScreenCapturer for IdbDevice {
    fn screenshot(&self, path: &Path) -> Result<()> {
        self.simctl.screenshot(&self.udid, path)
    }
}
