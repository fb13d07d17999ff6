//! Rendering module
//!
//! The shadow-mapping pipeline: a frame plan built by [`Pipeline`], run by
//! either the `wgpu` [`Renderer`] or the CPU [`software::SoftwareRenderer`].

mod camera;
mod context;
mod depth_pass;
mod light;
mod material;
pub(crate) mod mesh;
mod pipeline;
mod registry;
mod scene_pass;
pub mod shading;
mod shadow;
pub mod software;
mod texture;

pub use camera::Camera;
pub use context::{RenderError, Renderer};
pub use light::{LightProjection, LightSpace};
pub use material::{Material, MaterialDesc, MaterialUniform};
pub use mesh::{Mesh, MeshBuilder, MeshError, Vertex, generate_tangents};
pub use pipeline::{FramePlan, Instance, Pipeline, RenderBackend, Scene};
pub use registry::{GpuMeshHandle, Part, PartId, Registry};
pub use scene_pass::{FrameUniform, InstanceRaw};
pub use shading::{LightModel, ShadingModel, ShadowFilter, ShadowParams};
pub use shadow::{DepthPassUniform, DepthTarget};
pub use texture::{Texture, TextureError, TextureFilter, TextureImage};
