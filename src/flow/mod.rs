pub mod context;
pub mod flow_model;
pub mod runner;

pub use flow_model::{FlowAction, FlowFile, FlowStep};
pub use runner::{FlowReport, FlowRunner};
