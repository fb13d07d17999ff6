//! CPU reference backend
//!
//! Runs the same frame plan and shading model as the GPU renderer without a
//! device, one fragment at a time.

mod depth;
mod raster;
mod renderer;

pub use depth::{DEFAULT_DEPTH_SIZE, DepthBuffer};
pub use raster::{FaceCull, Fragment, rasterize_triangle};
pub use renderer::{FragmentRecord, Probe, SoftwareRenderer, render_depth_pass};
