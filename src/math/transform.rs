//! Immutable 4x4 transform
//!
//! Thin value type over `glam::Mat4`. Every operation returns a new
//! transform. Conventions follow `wgpu`: right-handed, column-major,
//! clip-space depth in `[0, 1]`.

use std::ops::Mul;

use glam::{Mat4, Vec3, Vec4};

/// Below this squared length a cross product is treated as degenerate
const DEGENERATE_EPSILON: f32 = 1e-10;

/// A 4x4 homogeneous transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(Mat4);

impl Transform {
    /// The identity transform
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    /// Maps clip-space x/y from `[-1, 1]` into `[0, 1]` texture space.
    ///
    /// `v` grows downward (top-left texture origin), depth is passed
    /// through because clip depth is already in `[0, 1]`.
    pub const TEXTURE_SPACE: Self = Self(Mat4::from_cols(
        Vec4::new(0.5, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -0.5, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(0.5, 0.5, 0.0, 1.0),
    ));

    /// Wrap a raw matrix
    #[must_use]
    pub const fn from_mat4(matrix: Mat4) -> Self {
        Self(matrix)
    }

    /// The underlying matrix
    #[must_use]
    pub const fn matrix(&self) -> Mat4 {
        self.0
    }

    /// Column-major array, ready for a uniform buffer
    #[must_use]
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        self.0.to_cols_array_2d()
    }

    /// Translation by `offset`
    #[must_use]
    pub fn translation(offset: Vec3) -> Self {
        Self(Mat4::from_translation(offset))
    }

    /// Non-uniform scale
    #[must_use]
    pub fn scaling(scale: Vec3) -> Self {
        Self(Mat4::from_scale(scale))
    }

    /// Rotation around the Y axis, in radians
    #[must_use]
    pub fn rotation_y(angle: f32) -> Self {
        Self(Mat4::from_rotation_y(angle))
    }

    /// Perspective projection with a vertical field of view in radians.
    ///
    /// The last row is `(0, 0, -1, 0)`, so `w` carries the view-space depth.
    #[must_use]
    pub fn perspective(field_of_view: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self(Mat4::perspective_rh(field_of_view, aspect, near, far))
    }

    /// Orthographic projection of the given box.
    ///
    /// The last row is `(0, 0, 0, 1)`, so the perspective divide is a no-op.
    #[must_use]
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self(Mat4::orthographic_rh(left, right, bottom, top, near, far))
    }

    /// World matrix of a viewer at `eye` looking at `target`.
    ///
    /// The z axis points from `target` back to `eye`. The inverse of this
    /// matrix is the view matrix. When `up` is parallel to the viewing
    /// direction another world axis stands in for it.
    #[must_use]
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let z_axis = (eye - target).normalize_or_zero();
        let z_axis = if z_axis == Vec3::ZERO { Vec3::Z } else { z_axis };

        let mut x_axis = up.cross(z_axis);
        if x_axis.length_squared() < DEGENERATE_EPSILON {
            let fallback = if z_axis.z.abs() < 0.9 { Vec3::Z } else { Vec3::X };
            x_axis = fallback.cross(z_axis);
        }
        let x_axis = x_axis.normalize();
        let y_axis = z_axis.cross(x_axis);

        Self(Mat4::from_cols(
            x_axis.extend(0.0),
            y_axis.extend(0.0),
            z_axis.extend(0.0),
            eye.extend(1.0),
        ))
    }

    /// `self * other`: apply `other` first, then `self`
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        Self(self.0 * other.0)
    }

    /// Matrix inverse
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self(self.0.inverse())
    }

    /// Matrix transpose
    #[must_use]
    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Homogeneous transform of a 4-vector
    #[must_use]
    pub fn transform_vec4(&self, v: Vec4) -> Vec4 {
        self.0 * v
    }

    /// Transform a point and divide by `w`
    #[must_use]
    pub fn project_point(&self, point: Vec3) -> Vec3 {
        self.0.project_point3(point)
    }

    /// Transform a direction, ignoring translation
    #[must_use]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.0.transform_vector3(vector)
    }

    /// Column `index` without its w component (an axis for rigid transforms)
    #[must_use]
    pub fn axis(&self, index: usize) -> Vec3 {
        self.0.col(index).truncate()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.multiply(&rhs)
    }
}

impl From<Mat4> for Transform {
    fn from(matrix: Mat4) -> Self {
        Self(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_perspective_last_row() {
        let projection = Transform::perspective(1.2, 1.5, 0.5, 10.0);
        assert_eq!(projection.matrix().row(3), Vec4::new(0.0, 0.0, -1.0, 0.0));
    }

    #[test]
    fn test_orthographic_last_row() {
        let projection = Transform::orthographic(-5.0, 5.0, -5.0, 5.0, 0.5, 10.0);
        assert_eq!(projection.matrix().row(3), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_orthographic_depth_range() {
        let projection = Transform::orthographic(-5.0, 5.0, -5.0, 5.0, 0.5, 10.0);
        let near = projection.project_point(Vec3::new(0.0, 0.0, -0.5));
        let far = projection.project_point(Vec3::new(0.0, 0.0, -10.0));
        assert!(near.z.abs() < 1e-6);
        assert!((far.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_look_at_axes() {
        let world = Transform::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        assert!(approx(world.axis(0), Vec3::X));
        assert!(approx(world.axis(1), Vec3::Y));
        assert!(approx(world.axis(2), Vec3::Z));
        assert!(approx(world.axis(3), Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn test_look_at_straight_down_is_valid() {
        let world = Transform::look_at(Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO, Vec3::Y);
        assert!(approx(world.axis(2), Vec3::Y));
        assert!(world.matrix().is_finite());
        assert!((world.axis(0).length() - 1.0).abs() < 1e-5);
        assert!(world.axis(0).dot(world.axis(2)).abs() < 1e-5);

        // The target ends up straight ahead of the view
        let view = world.inverse();
        assert!(approx(view.project_point(Vec3::ZERO), Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn test_operations_return_new_values() {
        let a = Transform::translation(Vec3::new(1.0, 2.0, 3.0));
        let b = a.inverse();
        assert_ne!(a, b);
        assert!(a.multiply(&b).matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert_eq!(a.transpose().transpose(), a);
        assert_eq!(a * Transform::IDENTITY, a);
    }

    #[test]
    fn test_texture_space_maps_clip_corners() {
        let t = Transform::TEXTURE_SPACE;
        assert!(approx(t.project_point(Vec3::new(-1.0, 1.0, 0.25)), Vec3::new(0.0, 0.0, 0.25)));
        assert!(approx(t.project_point(Vec3::new(1.0, -1.0, 0.75)), Vec3::new(1.0, 1.0, 0.75)));
    }
}
