pub mod stability;
pub mod wait;
