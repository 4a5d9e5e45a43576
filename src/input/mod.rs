pub mod clear;
pub mod focus;
pub mod text;

use std::thread;
use std::time::Duration;

pub const FOCUS_SETTLE: Duration = Duration::from_millis(120);
pub const RECONCILE_SETTLE: Duration = Duration::from_millis(90);
pub const CHUNK_DELAY: Duration = Duration::from_millis(60);
pub const DEFAULT_CHUNK_SIZE: usize = 4;
pub const RECONCILE_ROUNDS: u32 = 4;

/// Delays and bounds shared by the focus and text engines.
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    /// After a focus tap, before re-snapshotting.
    pub focus_settle: Duration,
    /// Before each reconciliation snapshot.
    pub reconcile_settle: Duration,
    /// Between chunks, only when more than one chunk is sent.
    pub chunk_delay: Duration,
    /// Characters per injector text call.
    pub chunk_size: usize,
    pub reconcile_rounds: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            focus_settle: FOCUS_SETTLE,
            reconcile_settle: RECONCILE_SETTLE,
            chunk_delay: CHUNK_DELAY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            reconcile_rounds: RECONCILE_ROUNDS,
        }
    }
}

impl Timing {
    /// Same bounds, no sleeping.
    pub fn instant() -> Self {
        Timing {
            focus_settle: Duration::ZERO,
            reconcile_settle: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            ..Timing::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

pub(crate) fn pause(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}
