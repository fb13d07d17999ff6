//! Asset loading
//!
//! - Shared handles for materials and textures
//! - OBJ/MTL parsing and model loading into the registry
//! - Random instance placement

mod handle;
mod loader;
pub mod mtl;
pub mod obj;
mod scatter;

pub use handle::Handle;
pub use loader::{AssetError, load_obj_model};
pub use scatter::unique_positions;
