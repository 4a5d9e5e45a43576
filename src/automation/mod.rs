pub mod actions;
pub mod outcome;

pub use actions::{Automation, TapTarget, TypeRequest, Unit};
pub use outcome::{ActionOutcome, Direction, ResolvedBy};
