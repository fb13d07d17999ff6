//! Viewer camera for the lit-scene pass

use glam::Vec3;

use crate::math::Transform;

/// Perspective camera looking at a target point
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
}

impl Camera {
    /// Create a new camera with default settings
    pub fn new() -> Self {
        Self {
            position: Vec3::new(6.0, 12.0, 15.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 60.0_f32.to_radians(),
            near: 1.0,
            far: 2000.0,
            aspect: 16.0 / 9.0,
        }
    }

    /// Create a camera at a specific position looking at a target
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            position,
            target,
            up,
            ..Self::new()
        }
    }

    /// World matrix of the camera
    pub fn world_matrix(&self) -> Transform {
        Transform::look_at(self.position, self.target, self.up)
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Transform {
        self.world_matrix().inverse()
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Transform {
        Transform::perspective(self.fov, self.aspect, self.near, self.far)
    }

    /// Update aspect ratio
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
