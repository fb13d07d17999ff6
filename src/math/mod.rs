//! Matrix math shared by both render passes

mod transform;

pub use transform::Transform;
