use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::command::{CommandOutput, CommandRunner};
use crate::error::{Result, SimError};

/// One simulator as reported by `simctl list devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTarget {
    pub name: String,
    pub udid: String,
    pub runtime: String,
    pub state: String,
    pub available: bool,
}

impl SimTarget {
    pub fn is_booted(&self) -> bool {
        self.state.eq_ignore_ascii_case("booted")
    }
}

/// The subset of [`SimTarget`] persisted as the default target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTarget {
    pub name: String,
    pub udid: String,
    pub runtime: String,
    pub state: String,
}

impl From<&SimTarget> for SavedTarget {
    fn from(t: &SimTarget) -> Self {
        SavedTarget {
            name: t.name.clone(),
            udid: t.udid.clone(),
            runtime: t.runtime.clone(),
            state: t.state.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceListPayload {
    #[serde(default)]
    devices: BTreeMap<String, Vec<DeviceEntry>>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    udid: String,
    #[serde(default)]
    state: String,
    #[serde(default, rename = "isAvailable")]
    is_available: bool,
    #[serde(default)]
    available: bool,
}

/// Parse `simctl list devices --json`. Booted devices sort first, then by
/// runtime, name and udid.
pub fn parse_device_list(json: &str) -> Result<Vec<SimTarget>> {
    let payload: DeviceListPayload = serde_json::from_str(json)
        .map_err(|e| SimError::wrap("SIMCTL_FAILED", "invalid simctl devices json", e))?;

    let mut list: Vec<SimTarget> = payload
        .devices
        .into_iter()
        .flat_map(|(runtime, devices)| {
            devices.into_iter().map(move |d| SimTarget {
                name: d.name,
                udid: d.udid,
                runtime: runtime.clone(),
                state: d.state,
                available: d.is_available || d.available,
            })
        })
        .collect();

    list.sort_by(|a, b| {
        b.is_booted()
            .cmp(&a.is_booted())
            .then_with(|| a.runtime.cmp(&b.runtime))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.udid.cmp(&b.udid))
    });
    Ok(list)
}

/// Pick a target: an explicit spec, else the saved default, else `booted`.
pub fn select_target(
    targets: &[SimTarget],
    spec: Option<&str>,
    default_udid: Option<&str>,
) -> Result<SimTarget> {
    let spec = spec
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or(default_udid.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or("booted");

    if spec == "booted" {
        return targets
            .iter()
            .find(|t| t.is_booted())
            .cloned()
            .ok_or(SimError::NoBootedDevice);
    }

    targets
        .iter()
        .find(|t| t.udid.eq_ignore_ascii_case(spec))
        .cloned()
        .ok_or_else(|| SimError::TargetNotFound(spec.to_string()))
}

/// `xcrun simctl` wrapper for device discovery, screenshots and app lifecycle.
#[derive(Debug, Clone)]
pub struct Simctl {
    runner: CommandRunner,
    xcrun: String,
}

impl Simctl {
    pub fn new(runner: CommandRunner, xcrun: impl Into<String>) -> Self {
        Simctl {
            runner,
            xcrun: xcrun.into(),
        }
    }

    pub fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<CommandOutput> {
        let mut full = vec!["simctl".to_string()];
        full.extend(args.iter().map(|a| a.as_ref().to_string()));
        self.runner.run(&self.xcrun, &full)
    }

    pub fn list_targets(&self) -> Result<Vec<SimTarget>> {
        let out = self
            .run(&["list", "devices", "--json"])
            .map_err(|e| e.recode("SIMCTL_FAILED", "failed to list simulators"))?;
        let targets = parse_device_list(&out.stdout)?;
        debug!(count = targets.len(), "listed simulators");
        Ok(targets)
    }

    pub fn resolve_target(&self, spec: Option<&str>, default_udid: Option<&str>) -> Result<SimTarget> {
        let targets = self.list_targets()?;
        select_target(&targets, spec, default_udid)
    }

    pub fn screenshot(&self, udid: &str, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.run(&["io", udid, "screenshot", path.as_ref()])?;
        Ok(())
    }

    pub fn open_url(&self, udid: &str, url: &str) -> Result<()> {
        self.run(&["openurl", udid, url])
            .map_err(|e| e.recode("SIMCTL_FAILED", "openurl failed"))?;
        Ok(())
    }

    pub fn launch(&self, udid: &str, bundle_id: &str, app_args: &[String]) -> Result<()> {
        let mut args = vec!["launch".to_string(), udid.to_string(), bundle_id.to_string()];
        args.extend(app_args.iter().cloned());
        self.run(&args)
            .map_err(|e| e.recode("SIMCTL_FAILED", "launch failed"))?;
        Ok(())
    }

    pub fn terminate(&self, udid: &str, bundle_id: &str) -> Result<()> {
        self.run(&["terminate", udid, bundle_id])
            .map_err(|e| e.recode("SIMCTL_FAILED", "terminate failed"))?;
        Ok(())
    }

    pub fn list_apps(&self, udid: &str) -> Result<String> {
        let out = self
            .run(&["listapps", udid])
            .map_err(|e| e.recode("SIMCTL_FAILED", "list apps failed"))?;
        Ok(out.stdout)
    }
}
