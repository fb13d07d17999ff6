//! Light-space description
//!
//! The light is a camera: a look-at world matrix plus a projection whose
//! frustum bounds what the depth pass records.

use glam::{Vec3, Vec4};

use crate::math::Transform;
use crate::renderer::shading::{DEFAULT_BIAS, LightModel};

/// Projection used for the light's depth pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightProjection {
    /// Spot-style frustum, field of view in radians
    Perspective { field_of_view: f32 },
    /// Box-shaped frustum for directional light
    Orthographic,
}

impl LightProjection {
    /// Map the plain settings flag onto a projection
    pub fn from_flag(perspective: bool, field_of_view: f32) -> Self {
        if perspective {
            Self::Perspective { field_of_view }
        } else {
            Self::Orthographic
        }
    }
}

/// Everything needed to render from the light and compare against it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: LightProjection,
    /// Frustum width (orthographic) or aspect numerator (perspective)
    pub width: f32,
    /// Frustum height (orthographic) or aspect denominator (perspective)
    pub height: f32,
    pub near: f32,
    pub far: f32,
    /// Depth bias of the shadow comparison
    pub bias: f32,
    pub model: LightModel,
    /// Linear RGB multiplier on the light term
    pub color: Vec3,
}

impl LightSpace {
    /// Light of the shadow demos
    pub fn new() -> Self {
        Self {
            position: Vec3::new(2.5, 5.0, 7.0),
            target: Vec3::new(3.5, 0.0, 3.5),
            up: Vec3::Y,
            projection: LightProjection::Orthographic,
            width: 10.0,
            height: 10.0,
            near: 0.5,
            far: 10.0,
            bias: DEFAULT_BIAS,
            model: LightModel::Directional,
            color: Vec3::ONE,
        }
    }

    /// World matrix of the light
    pub fn world_matrix(&self) -> Transform {
        Transform::look_at(self.position, self.target, self.up)
    }

    /// Inverse of the world matrix
    pub fn view_matrix(&self) -> Transform {
        self.world_matrix().inverse()
    }

    /// Projection for the depth pass
    pub fn projection_matrix(&self) -> Transform {
        match self.projection {
            LightProjection::Perspective { field_of_view } => Transform::perspective(
                field_of_view,
                self.width / self.height,
                self.near,
                self.far,
            ),
            LightProjection::Orthographic => Transform::orthographic(
                -self.width / 2.0,
                self.width / 2.0,
                -self.height / 2.0,
                self.height / 2.0,
                self.near,
                self.far,
            ),
        }
    }

    /// Unit vector from the target back toward the light
    pub fn reverse_light_direction(&self) -> Vec3 {
        self.world_matrix().axis(2)
    }

    /// The 8 world-space corners of the light frustum.
    ///
    /// Near corners first, in the order (-1,-1), (1,-1), (1,1), (-1,1) of
    /// clip x/y, then the far corners in the same order.
    pub fn frustum_corners(&self) -> [Vec3; 8] {
        let clip_to_world = self.world_matrix() * self.projection_matrix().inverse();
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let z = if i < 4 { 0.0 } else { 1.0 };
            let (x, y) = match i % 4 {
                0 => (-1.0, -1.0),
                1 => (1.0, -1.0),
                2 => (1.0, 1.0),
                _ => (-1.0, 1.0),
            };
            let world = clip_to_world.transform_vec4(Vec4::new(x, y, z, 1.0));
            *corner = world.truncate() / world.w;
        }
        corners
    }

    /// The 12 frustum edges as line segments
    pub fn frustum_lines(&self) -> [[Vec3; 2]; 12] {
        let c = self.frustum_corners();
        [
            [c[0], c[1]],
            [c[1], c[2]],
            [c[2], c[3]],
            [c[3], c[0]],
            [c[4], c[5]],
            [c[5], c[6]],
            [c[6], c[7]],
            [c[7], c[4]],
            [c[0], c[4]],
            [c[1], c[5]],
            [c[2], c[6]],
            [c[3], c[7]],
        ]
    }
}

impl Default for LightSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overhead(projection: LightProjection) -> LightSpace {
        LightSpace {
            position: Vec3::new(0.0, 5.0, 0.0),
            target: Vec3::ZERO,
            projection,
            ..LightSpace::new()
        }
    }

    #[test]
    fn test_projection_last_rows() {
        let ortho = overhead(LightProjection::Orthographic).projection_matrix();
        assert_eq!(ortho.matrix().row(3), Vec4::new(0.0, 0.0, 0.0, 1.0));

        let perspective = overhead(LightProjection::Perspective {
            field_of_view: 120_f32.to_radians(),
        })
        .projection_matrix();
        assert_eq!(perspective.matrix().row(3), Vec4::new(0.0, 0.0, -1.0, 0.0));
    }

    #[test]
    fn test_from_flag() {
        assert_eq!(LightProjection::from_flag(false, 1.0), LightProjection::Orthographic);
        assert_eq!(
            LightProjection::from_flag(true, 1.0),
            LightProjection::Perspective { field_of_view: 1.0 }
        );
    }

    #[test]
    fn test_reverse_direction_points_at_light() {
        let light = overhead(LightProjection::Orthographic);
        assert!((light.reverse_light_direction() - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_orthographic_frustum_corners() {
        let light = overhead(LightProjection::Orthographic);
        let corners = light.frustum_corners();

        // Near plane 0.5 below the light, far plane 10 below
        for corner in &corners[..4] {
            assert!((corner.y - 4.5).abs() < 1e-4);
            assert!((corner.x.abs() - 5.0).abs() < 1e-4);
            assert!((corner.z.abs() - 5.0).abs() < 1e-4);
        }
        for corner in &corners[4..] {
            assert!((corner.y + 5.0).abs() < 1e-4);
        }
        assert_eq!(light.frustum_lines().len(), 12);
    }
}
