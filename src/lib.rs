//! Shadow-mapping render pipeline built on wgpu
//!
//! This crate provides:
//! - A two-pass frame: depth from the light, then the lit scene sampling it
//! - Hard and soft (smoothstep penumbra) shadow comparison with bias
//! - Directional and spot light models, Lambert and Blinn-Phong shading
//! - OBJ/MTL model loading into a shared part registry
//! - A CPU backend for deterministic, GPU-free rendering

pub mod assets;
pub mod core;
pub mod math;
pub mod renderer;

// Re-exports for convenience
pub use glam;
pub use wgpu;
pub use winit;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{Handle, load_obj_model, unique_positions};
    pub use crate::core::{Engine, EngineConfig, EngineContext, Game, Settings};
    pub use crate::math::Transform;
    pub use crate::renderer::{
        Camera, Instance, LightModel, LightProjection, LightSpace, Material, Mesh, MeshBuilder, PartId,
        Pipeline, Registry, Renderer, Scene, ShadingModel, ShadowFilter, TextureImage,
    };
    pub use glam::{Vec2, Vec3, Vec4};
    pub use winit::keyboard::KeyCode;
}
