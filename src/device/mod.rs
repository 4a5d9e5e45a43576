pub mod command;
pub mod idb;
pub mod ports;
pub mod target;

pub use ports::{Device, Injector, ScreenCapturer, SnapshotProvider};
