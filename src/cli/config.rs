use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::automation::actions::DEFAULT_FOCUS_RETRIES;
use crate::device::command::DEFAULT_COMMAND_TIMEOUT;
use crate::device::idb::DEFAULT_IDB;
use crate::error::SimError;
use crate::input::Timing;
use crate::selector::SelectorQuery;
use crate::sync::stability::{DEFAULT_STABLE_INTERVAL, DEFAULT_STABLE_SAMPLES};
use crate::sync::wait::{DEFAULT_WAIT_INTERVAL, DEFAULT_WAIT_TIMEOUT};

pub const DEFAULT_CONFIG_FILE: &str = "simagent.yaml";
pub const DEFAULT_XCRUN: &str = "xcrun";

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| format!("invalid duration {:?}: {}", s, e))
}

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "simagent",
    version,
    about = "Deterministic UI automation for iOS simulators"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Simulator to drive: `booted` or a UDID (default: saved target, else booted)
    #[arg(long, global = true)]
    pub target: Option<String>,

    /// Timeout for each simctl/idb call
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Print results as JSON envelopes
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: simagent.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Append one JSON line per executed action to this file
    #[arg(long, global = true)]
    pub trace: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List simulators and manage the default target
    Target {
        #[command(subcommand)]
        command: TargetCommand,
    },

    /// Capture a screenshot and normalized UI tree
    Frame(FrameArgs),

    /// Drive the simulator UI
    Ui {
        #[command(subcommand)]
        command: UiCommand,
    },

    /// App lifecycle
    App {
        #[command(subcommand)]
        command: AppCommand,
    },

    /// Pass arguments straight to simctl or idb
    Raw {
        #[command(subcommand)]
        command: RawCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// List available simulators
    List,
    /// Save the default target
    Set {
        /// `booted` or a UDID
        spec: String,
    },
    /// Show the saved default target
    Show,
}

#[derive(Args, Debug, Clone)]
pub struct FrameArgs {
    /// Output directory (default: $TMPDIR/simagent/<timestamp>)
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub screenshot: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub ui: bool,

    /// Screenshot format: png or jpg
    #[arg(long, default_value = "png")]
    pub format: String,

    /// Element order: reading, z or stable
    #[arg(long, default_value = "reading")]
    pub order: String,

    /// Minimum element area in pt²
    #[arg(long, default_value_t = 0.0)]
    pub min_area: f64,

    /// Comma separated roles to keep
    #[arg(long)]
    pub include_roles: Option<String>,

    /// Comma separated roles to drop
    #[arg(long)]
    pub exclude_roles: Option<String>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub interactive_only: bool,

    /// Sample the UI tree until consecutive snapshots agree
    #[arg(long)]
    pub stable: bool,

    #[arg(long)]
    pub stable_samples: Option<usize>,

    #[arg(long, value_parser = parse_duration)]
    pub stable_interval: Option<Duration>,
}

/// `--index|--id|--label|--contains`
#[derive(Args, Debug, Clone, Default)]
pub struct SelectorArgs {
    #[arg(long)]
    pub index: Option<usize>,
    #[arg(long)]
    pub id: Option<String>,
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long)]
    pub contains: Option<String>,
}

impl SelectorArgs {
    pub fn query(&self) -> SelectorQuery {
        SelectorQuery {
            index: self.index,
            id: self.id.clone(),
            label: self.label.clone(),
            contains: self.contains.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum UiCommand {
    /// Tap a point or an element
    Tap {
        #[arg(allow_negative_numbers = true)]
        x: Option<f64>,
        #[arg(allow_negative_numbers = true)]
        y: Option<f64>,

        /// Coordinate unit: pt or px
        #[arg(long, default_value = "pt")]
        unit: String,

        #[command(flatten)]
        selector: SelectorArgs,

        /// Resolve selectors against this elements.json instead of the last frame
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Type text, optionally into an element
    Type {
        #[arg(long)]
        text: Option<String>,

        /// Text given as positional words
        words: Vec<String>,

        /// Focus the selected element first
        #[arg(long)]
        into: bool,

        #[command(flatten)]
        selector: SelectorArgs,

        /// Clear the element before typing (requires --into)
        #[arg(long)]
        replace: bool,

        /// Drop non-ASCII characters
        #[arg(long)]
        ascii: bool,

        #[arg(long)]
        paste: bool,

        /// Re-read the UI tree and confirm the text landed
        #[arg(long)]
        verify: bool,

        #[arg(long)]
        focus_retries: Option<u32>,

        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Clear a text input
    Clear {
        #[command(flatten)]
        selector: SelectorArgs,

        /// Minimum number of backspaces to send
        #[arg(long)]
        max_backspaces: Option<usize>,

        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Swipe from an element or the screen center
    Swipe {
        /// up, down, left or right
        direction: String,

        #[arg(long)]
        index: Option<usize>,

        #[arg(long)]
        id: Option<String>,

        #[arg(long, default_value_t = 220.0)]
        distance: f64,

        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Poll the UI tree until a condition holds
    Wait {
        #[arg(long)]
        has_text: Option<String>,

        #[arg(long)]
        interactive_min: Option<usize>,

        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        #[arg(long, value_parser = parse_duration)]
        interval: Option<Duration>,
    },

    /// Press a hardware button
    Button {
        /// HOME, LOCK or SIRI
        name: String,
    },

    /// Run flow files
    Flow {
        #[command(subcommand)]
        command: FlowCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum FlowCommand {
    /// Execute a flow file step by step
    Run {
        #[arg(long)]
        file: PathBuf,

        /// 1-based step to start from
        #[arg(long, default_value_t = 1)]
        resume_from: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Open a URL on the simulator
    Openurl { url: String },
    /// Launch an app
    Launch {
        #[arg(long)]
        bundle_id: String,
        /// Arguments passed to the app
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Terminate an app
    Terminate {
        #[arg(long)]
        bundle_id: String,
    },
    /// List installed apps
    List,
}

#[derive(Subcommand, Debug)]
pub enum RawCommand {
    /// `xcrun simctl <args>`
    Simctl {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// `idb <args>`
    Idb {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `simagent.yaml`. Durations are humantime
/// strings such as `250ms` or `20s`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub timeout: Option<String>,
    pub focus_retries: Option<u32>,
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub stable: StableConfig,
    pub idb_path: Option<String>,
    pub xcrun_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitConfig {
    pub timeout: Option<String>,
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StableConfig {
    pub samples: Option<usize>,
    pub interval: Option<String>,
}

// ============================================================================
// Config File Loading
// ============================================================================

/// Read the YAML config. `Ok(None)` when the file does not exist.
pub fn read_config(path: &str) -> crate::error::Result<Option<AppConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SimError::wrap("IO_ERROR", format!("failed to read config: {}", path), e)),
    };
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|e| SimError::wrap("IO_ERROR", format!("invalid config file: {}", path), e))
}

/// Like [`read_config`], but an unreadable or malformed file only warns and
/// yields defaults.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    match read_config(config_path) {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            let cause = e.details().get("cause").cloned().unwrap_or_default();
            warn!(path = config_path, error = %e, %cause, "ignoring malformed config");
            AppConfig::default()
        }
    }
}

// ============================================================================
// Settings (CLI > config file > built-in defaults)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub timeout: Duration,
    pub focus_retries: u32,
    pub timing: Timing,
    pub wait_timeout: Duration,
    pub wait_interval: Duration,
    pub stable_samples: usize,
    pub stable_interval: Duration,
    pub idb: String,
    pub xcrun: String,
}

fn config_duration(raw: Option<&str>) -> Option<Duration> {
    raw.and_then(|s| humantime::parse_duration(s.trim()).ok())
}

/// Merge global CLI flags with the config file. Unparseable config values
/// fall back to the built-in defaults.
pub fn build_settings(cli: &Cli, config: &AppConfig) -> Settings {
    let mut timing = Timing::default();
    if let Some(size) = config.chunk_size.filter(|n| *n > 0) {
        timing = timing.with_chunk_size(size);
    }

    Settings {
        timeout: cli
            .timeout
            .or_else(|| config_duration(config.timeout.as_deref()))
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
        focus_retries: config
            .focus_retries
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_FOCUS_RETRIES),
        timing,
        wait_timeout: config_duration(config.wait.timeout.as_deref()).unwrap_or(DEFAULT_WAIT_TIMEOUT),
        wait_interval: config_duration(config.wait.interval.as_deref()).unwrap_or(DEFAULT_WAIT_INTERVAL),
        stable_samples: config.stable.samples.unwrap_or(DEFAULT_STABLE_SAMPLES),
        stable_interval: config_duration(config.stable.interval.as_deref())
            .unwrap_or(DEFAULT_STABLE_INTERVAL),
        idb: config
            .idb_path
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IDB.to_string()),
        xcrun: config
            .xcrun_path
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_XCRUN.to_string()),
    }
}
