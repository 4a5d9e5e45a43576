use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::device::Device;
use crate::device::target::{SavedTarget, SimTarget};
use crate::error::{Result, SimError};
use crate::frame::store::{FrameStore, LastFrame, write_json_file};
use crate::sync::stability::{DEFAULT_STABLE_INTERVAL, DEFAULT_STABLE_SAMPLES, StabilitySampler};
use crate::tree::element::ElementSet;
use crate::tree::normalize::NormalizeOptions;
use crate::tree::transform::{PixelSize, derive_transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "png" => Ok(ImageFormat::Png),
            "jpg" => Ok(ImageFormat::Jpg),
            _ => Err(SimError::usage("--format must be png|jpg")),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone)]
pub struct FrameOptions {
    /// Defaults to `$TMPDIR/simagent/<timestamp>`.
    pub out_dir: Option<PathBuf>,
    pub screenshot: bool,
    pub ui: bool,
    pub format: ImageFormat,
    pub stable: bool,
    pub stable_samples: usize,
    pub stable_interval: Duration,
    pub normalize: NormalizeOptions,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            out_dir: None,
            screenshot: true,
            ui: true,
            format: ImageFormat::Png,
            stable: false,
            stable_samples: DEFAULT_STABLE_SAMPLES,
            stable_interval: DEFAULT_STABLE_INTERVAL,
            normalize: NormalizeOptions {
                interactive_only: true,
                ..NormalizeOptions::default()
            },
        }
    }
}

impl FrameOptions {
    pub fn validate(&self) -> Result<()> {
        if self.stable && !self.ui {
            return Err(SimError::usage("--stable requires --ui"));
        }
        if self.stable_samples < 2 {
            return Err(SimError::usage("--stable-samples must be >= 2"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameArtifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameCounts {
    pub all: usize,
    pub interactive: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResult {
    pub target: SimTarget,
    pub out_dir: String,
    pub artifacts: FrameArtifacts,
    pub counts: FrameCounts,
    #[serde(skip)]
    pub element_count: usize,
}

/// `$TMPDIR/simagent/<prefix><local timestamp>`.
pub fn timestamped_dir(prefix: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S");
    std::env::temp_dir()
        .join("simagent")
        .join(format!("{}{}", prefix, stamp))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Capture a screenshot and/or UI tree into an output directory and record
/// it as the last frame.
pub fn capture_frame<D: Device + ?Sized>(
    device: &D,
    target: &SimTarget,
    opts: &FrameOptions,
    store: &FrameStore,
) -> Result<FrameResult> {
    opts.validate()?;
    let out_dir = opts.out_dir.clone().unwrap_or_else(|| timestamped_dir(""));
    fs::create_dir_all(&out_dir).map_err(|e| SimError::io("failed to create output directory", e))?;

    let mut artifacts = FrameArtifacts::default();
    let mut paths: BTreeMap<String, String> = BTreeMap::new();
    let path_string = |p: &Path| p.to_string_lossy().into_owned();

    let screenshot_path = out_dir.join(format!("screen.{}", opts.format));
    let ui_raw_path = out_dir.join("ui.raw.json");
    let elements_path = out_dir.join("elements.json");
    let transform_path = out_dir.join("transform.json");

    let mut screenshot_size = None;
    if opts.screenshot {
        device
            .screenshot(&screenshot_path)
            .map_err(|e| e.recode("SIMCTL_FAILED", "failed to capture screenshot"))?;
        screenshot_size = image::image_dimensions(&screenshot_path)
            .ok()
            .map(|(w, h)| PixelSize { w, h });
        paths.insert("screenshot".into(), path_string(&screenshot_path));
        artifacts.screenshot = file_name(&screenshot_path);
    }

    let mut raw = Value::Null;
    let mut set = ElementSet::default();
    if opts.ui {
        let sampler = StabilitySampler::new(device, &opts.normalize, opts.stable_samples, opts.stable_interval);
        if opts.stable {
            let samples = sampler.sample()?;
            for (i, sample) in samples.iter().enumerate() {
                let sample_path = out_dir.join(format!("ui.sample-{:02}.raw.json", i + 1));
                if write_json_file(&sample_path, &sample.raw).is_ok() {
                    paths.insert(format!("uiSample{:02}", i + 1), path_string(&sample_path));
                }
            }
            if let Some(last) = samples.into_iter().last() {
                raw = last.raw;
                set = last.elements;
            }
        } else {
            match sampler.sample_once() {
                Ok(sample) => {
                    raw = sample.raw;
                    set = sample.elements;
                }
                Err(e) => {
                    warn!(code = e.code(), error = %e, "ui snapshot failed, frame continues without elements");
                    raw = json!({ "error": e.render() });
                }
            }
        }
        write_json_file(&ui_raw_path, &raw)?;
        paths.insert("uiRaw".into(), path_string(&ui_raw_path));
        artifacts.ui_raw = file_name(&ui_raw_path);
    }

    let transform = derive_transform(&raw, &set.elements, screenshot_size);
    write_json_file(&transform_path, &transform)?;
    paths.insert("transform".into(), path_string(&transform_path));
    artifacts.transform = file_name(&transform_path);

    write_json_file(&elements_path, &set.elements)?;
    paths.insert("elements".into(), path_string(&elements_path));
    artifacts.elements = file_name(&elements_path);

    let last = LastFrame {
        out_dir: path_string(&out_dir),
        target: Some(SavedTarget::from(target)),
        screenshot: paths.get("screenshot").cloned(),
        artifacts: paths,
        created_at: chrono::Local::now().to_rfc3339(),
        elements: path_string(&elements_path),
        transform: path_string(&transform_path),
    };
    store.save_last_frame(&last)?;
    info!(out_dir = %last.out_dir, elements = set.len(), "frame captured");

    Ok(FrameResult {
        target: target.clone(),
        out_dir: last.out_dir,
        artifacts,
        counts: FrameCounts {
            all: set.all_count,
            interactive: set.interactive_count,
        },
        element_count: set.len(),
    })
}
