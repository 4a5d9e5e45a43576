pub mod capture;
pub mod store;
