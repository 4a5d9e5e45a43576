use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::target::SavedTarget;
use crate::error::{Result, SimError};
use crate::tree::element::Element;
use crate::tree::transform::Transform;

/// Overrides the state directory (`~/.config/simagent`).
pub const CONFIG_DIR_ENV: &str = "SIMAGENT_CONFIG_DIR";

const CONFIG_FILE: &str = "config.json";
const LAST_FRAME_FILE: &str = "last_frame.json";

/// Persisted defaults. Only the default target lives here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target: Option<SavedTarget>,
}

/// Pointer to the most recent `frame` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastFrame {
    pub out_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<SavedTarget>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    pub created_at: String,
    pub elements: String,
    pub transform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// A saved element set with its transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedFrame {
    pub elements: Vec<Element>,
    pub transform: Transform,
}

/// File-backed state shared between invocations.
#[derive(Debug, Clone)]
pub struct FrameStore {
    dir: PathBuf,
}

impl FrameStore {
    /// `$SIMAGENT_CONFIG_DIR`, else `~/.config/simagent`.
    pub fn open_default() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or_else(|| {
                    SimError::wrap("IO_ERROR", "failed to resolve home directory", "no home directory")
                })?
                .join(".config")
                .join("simagent"),
        };
        FrameStore::at(dir)
    }

    pub fn at(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SimError::io("failed to create config directory", e))?;
        Ok(FrameStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn last_frame_path(&self) -> PathBuf {
        self.dir.join(LAST_FRAME_FILE)
    }

    /// A missing file is an empty config.
    pub fn load_config(&self) -> Result<Config> {
        match fs::read_to_string(self.config_path()) {
            Ok(s) => serde_json::from_str(&s).map_err(|e| SimError::io("failed to parse config", e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(SimError::io("failed to read config", e)),
        }
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        write_json_file(&self.config_path(), config)
    }

    pub fn default_udid(&self) -> Option<String> {
        self.load_config()
            .ok()
            .and_then(|c| c.default_target)
            .map(|t| t.udid)
            .filter(|udid| !udid.is_empty())
    }

    pub fn save_last_frame(&self, frame: &LastFrame) -> Result<()> {
        write_json_file(&self.last_frame_path(), frame)
    }

    pub fn load_last_frame(&self) -> Result<LastFrame> {
        let s = fs::read_to_string(self.last_frame_path()).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SimError::NoLastFrame
            } else {
                SimError::io("failed to read last_frame", e)
            }
        })?;
        serde_json::from_str(&s).map_err(|e| SimError::io("failed to parse last_frame", e))
    }

    /// Elements from `from` (with a sibling `transform.json`), else from the
    /// last frame. The transform is best-effort and defaults when missing.
    pub fn read_frame(&self, from: Option<&Path>) -> Result<LoadedFrame> {
        let (elements_path, transform_path) = match from {
            Some(path) => (
                path.to_path_buf(),
                path.parent()
                    .unwrap_or_else(|| Path::new(""))
                    .join("transform.json"),
            ),
            None => {
                let last = self.load_last_frame()?;
                (PathBuf::from(last.elements), PathBuf::from(last.transform))
            }
        };

        let raw = fs::read_to_string(&elements_path)
            .map_err(|e| SimError::io("failed to read elements json", e))?;
        let elements: Vec<Element> = serde_json::from_str(&raw)
            .map_err(|e| SimError::io("failed to parse elements json", e))?;

        let transform = fs::read_to_string(&transform_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        debug!(path = %elements_path.display(), count = elements.len(), "loaded saved frame");
        Ok(LoadedFrame {
            elements,
            transform,
        })
    }
}

/// Pretty-printed JSON, `IO_ERROR` on failure.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value).map_err(|e| SimError::io("failed to encode json", e))?;
    fs::write(path, body).map_err(|e| SimError::io("failed to write json file", e))
}

/// Where selector resolution looks for a previously captured frame.
pub trait FrameSource {
    fn load_frame(&self, from: Option<&Path>) -> Result<LoadedFrame>;
}

impl FrameSource for FrameStore {
    fn load_frame(&self, from: Option<&Path>) -> Result<LoadedFrame> {
        self.read_frame(from)
    }
}

/// An in-memory frame, returned regardless of `from`.
impl FrameSource for LoadedFrame {
    fn load_frame(&self, _from: Option<&Path>) -> Result<LoadedFrame> {
        Ok(self.clone())
    }
}

/// No saved frame at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrame;

impl FrameSource for NoFrame {
    fn load_frame(&self, _from: Option<&Path>) -> Result<LoadedFrame> {
        Err(SimError::NoLastFrame)
    }
}
