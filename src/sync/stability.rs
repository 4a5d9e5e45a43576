use std::fmt::Write as _;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::device::SnapshotProvider;
use crate::error::{Result, SimError};
use crate::input::pause;
use crate::tree::element::{Element, ElementSet};
use crate::tree::normalize::{NormalizeOptions, normalize};

pub const DEFAULT_STABLE_SAMPLES: usize = 3;
pub const DEFAULT_STABLE_INTERVAL: Duration = Duration::from_millis(250);

/// One snapshot and its normalized form.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSample {
    pub raw: Value,
    pub elements: ElementSet,
    pub hash: String,
}

/// Fingerprint of everything a user could observe about the element set.
pub fn hash_element_set(elements: &[Element]) -> String {
    use sha1::{Digest, Sha1};

    let mut line = String::new();
    let mut hasher = Sha1::new();
    for elem in elements {
        line.clear();
        let _ = writeln!(
            line,
            "{}|{}|{}|{}|{:.1}|{:.1}|{:.1}|{:.1}|{}|{}|{}",
            elem.id,
            elem.role.trim().to_lowercase(),
            elem.label.trim(),
            elem.value.trim(),
            elem.frame.x,
            elem.frame.y,
            elem.frame.w,
            elem.frame.h,
            elem.enabled,
            elem.visible,
            elem.offscreen,
        );
        hasher.update(line.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn all_strings_equal(values: &[String]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Takes N samples at a fixed interval and accepts them only if every hash
/// matches.
pub struct StabilitySampler<'a, D: ?Sized> {
    device: &'a D,
    opts: &'a NormalizeOptions,
    samples: usize,
    interval: Duration,
}

impl<'a, D: SnapshotProvider + ?Sized> StabilitySampler<'a, D> {
    pub fn new(device: &'a D, opts: &'a NormalizeOptions, samples: usize, interval: Duration) -> Self {
        StabilitySampler {
            device,
            opts,
            samples,
            interval,
        }
    }

    pub fn sample_once(&self) -> Result<UiSample> {
        let raw = self.device.capture_raw_lenient()?;
        let elements = normalize(&raw, self.opts);
        let hash = hash_element_set(&elements.elements);
        Ok(UiSample {
            raw,
            elements,
            hash,
        })
    }

    pub fn sample(&self) -> Result<Vec<UiSample>> {
        if self.samples < 2 {
            return Err(SimError::usage("--stable-samples must be >= 2"));
        }
        let mut out = Vec::with_capacity(self.samples);
        for i in 0..self.samples {
            let sample = self.sample_once()?;
            debug!(sample = i + 1, hash = %sample.hash, elements = sample.elements.len(), "stability sample");
            out.push(sample);
            if i + 1 < self.samples {
                pause(self.interval);
            }
        }

        let hashes: Vec<String> = out.iter().map(|s| s.hash.clone()).collect();
        if !all_strings_equal(&hashes) {
            warn!(?hashes, "ui tree changed during stable sampling");
            return Err(SimError::FrameUnstable {
                hashes,
                samples: self.samples,
                interval: self.interval,
            });
        }
        Ok(out)
    }
}
