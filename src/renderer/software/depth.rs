//! CPU depth target

use glam::Vec2;

use crate::renderer::shading::DepthSampler;

/// Resolution of the shadow demos' depth texture
pub const DEFAULT_DEPTH_SIZE: u32 = 512;

/// Row-major depth buffer; row 0 is the top of the image
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    texels: Vec<f32>,
}

impl DepthBuffer {
    /// Create a buffer cleared to the far plane
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            texels: vec![1.0; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw depth values
    pub fn texels(&self) -> &[f32] {
        &self.texels
    }

    /// Reset every texel to 1.0
    pub fn clear(&mut self) {
        self.texels.fill(1.0);
    }

    /// Stored depth at a texel, `None` outside the buffer
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels.get((y * self.width + x) as usize).copied()
    }

    /// Store `depth` if it is closer than the current value.
    ///
    /// Coordinates come from the rasterizer, which stays inside the buffer.
    pub(crate) fn test_and_set(&mut self, x: u32, y: u32, depth: f32) -> bool {
        let texel = &mut self.texels[(y * self.width + x) as usize];
        if depth < *texel {
            *texel = depth;
            true
        } else {
            false
        }
    }
}

impl Default for DepthBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH_SIZE, DEFAULT_DEPTH_SIZE)
    }
}

impl DepthSampler for DepthBuffer {
    /// Nearest texel, clamped to the edge
    fn sample_depth(&self, uv: Vec2) -> f32 {
        let clamp = |t: f32, size: u32| ((t * size as f32).floor().max(0.0) as u32).min(size - 1);
        self.get(clamp(uv.x, self.width), clamp(uv.y, self.height))
            .unwrap_or(1.0)
    }
}
