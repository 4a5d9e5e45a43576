pub mod element;
pub mod normalize;
pub mod transform;
pub mod value;
