pub mod fallback;
pub mod query;
pub mod resolve;

pub use query::{Selector, SelectorQuery};
