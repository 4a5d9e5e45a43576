//! Deterministic UI automation for iOS simulators.
//!
//! Raw accessibility snapshots from idb are normalized into indexed
//! [`tree::element::Element`]s that selectors resolve against. Typing
//! verifies focus first and reconciles the result against what the field
//! shows. Flows run step by step and can resume from any step.

pub mod automation;
pub mod cli;
pub mod device;
pub mod error;
pub mod flow;
pub mod frame;
pub mod input;
pub mod selector;
pub mod sync;
pub mod trace;
pub mod tree;

pub use error::{Result, SimError};
