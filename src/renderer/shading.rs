//! Shadow sampling and surface shading
//!
//! CPU reference of the model `shaders/scene.wgsl` runs on the GPU. The
//! software backend calls these functions per fragment, and the tests use
//! them directly.

use glam::{Vec2, Vec3, Vec4};

use crate::math::Transform;
use crate::renderer::material::Material;

/// Depth bias of the shadow demos
pub const DEFAULT_BIAS: f32 = -0.006;
/// Width of the soft comparison ramp
pub const DEFAULT_PENUMBRA: f32 = 0.06;
/// Shadow factor outside the depth target with hard comparison
pub const HARD_OUT_OF_RANGE: f32 = 1.0;
/// Shadow factor outside the depth target with soft comparison
pub const SOFT_OUT_OF_RANGE: f32 = 0.6;

/// Read access to a depth target in texture space
pub trait DepthSampler {
    /// Depth stored at `uv`, with `uv` in `[0, 1]^2`
    fn sample_depth(&self, uv: Vec2) -> f32;
}

/// How sampled depth is compared with the fragment depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowFilter {
    /// Binary lit/shadowed
    Hard,
    /// Smoothstep ramp of width `penumbra` in depth units
    Soft { penumbra: f32 },
}

/// Per-frame shadow comparison parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowParams {
    /// Added to the fragment depth before comparison
    pub bias: f32,
    pub filter: ShadowFilter,
    /// Returned for fragments outside the depth target
    pub out_of_range: f32,
}

impl ShadowParams {
    /// Hard comparison with the matching out-of-range value
    pub const fn hard(bias: f32) -> Self {
        Self {
            bias,
            filter: ShadowFilter::Hard,
            out_of_range: HARD_OUT_OF_RANGE,
        }
    }

    /// Soft comparison with the matching out-of-range value
    pub const fn soft(bias: f32, penumbra: f32) -> Self {
        Self {
            bias,
            filter: ShadowFilter::Soft { penumbra },
            out_of_range: SOFT_OUT_OF_RANGE,
        }
    }

    /// Replace the out-of-range value
    #[must_use]
    pub const fn with_out_of_range(mut self, value: f32) -> Self {
        self.out_of_range = value;
        self
    }
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self::hard(DEFAULT_BIAS)
    }
}

/// GLSL `smoothstep`. Equal edges act as a step at `edge0`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// World point to depth-target space, after the perspective divide
pub fn project(texture_matrix: &Transform, world_position: Vec3) -> Vec3 {
    let projected = texture_matrix.transform_vec4(world_position.extend(1.0));
    projected.truncate() / projected.w
}

/// Whether a projected point lands on the depth target
pub fn in_range(projected: Vec3) -> bool {
    (0.0..=1.0).contains(&projected.x) && (0.0..=1.0).contains(&projected.y)
}

/// Compare one sampled depth with the biased fragment depth
pub fn compare(sampled: f32, current_depth: f32, filter: ShadowFilter) -> f32 {
    match filter {
        ShadowFilter::Hard => {
            if sampled <= current_depth {
                0.0
            } else {
                1.0
            }
        }
        ShadowFilter::Soft { penumbra } => {
            let diff = sampled - current_depth;
            if diff < 0.0 {
                0.0
            } else {
                smoothstep(0.0, penumbra.max(0.0), diff)
            }
        }
    }
}

/// Shadow factor in `[0, 1]` for a projected point; 1 is fully lit.
///
/// Out-of-range points return `params.out_of_range` without touching
/// `sampler`.
pub fn shadow_factor(projected: Vec3, params: &ShadowParams, sampler: &impl DepthSampler) -> f32 {
    if !in_range(projected) {
        return params.out_of_range;
    }
    let current_depth = projected.z + params.bias;
    let sampled = sampler.sample_depth(projected.truncate());
    compare(sampled, current_depth, params.filter)
}

/// How light reaches a surface
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LightModel {
    /// Parallel rays along the light's view direction
    #[default]
    Directional,
    /// Cone around the view direction; limits are half-angles in radians
    Spot { inner_limit: f32, outer_limit: f32 },
}

/// Light term for a surface point
pub fn light_term(model: LightModel, normal: Vec3, surface_to_light: Vec3, reverse_light_direction: Vec3) -> f32 {
    match model {
        LightModel::Directional => normal.dot(reverse_light_direction).max(0.0),
        LightModel::Spot {
            inner_limit,
            outer_limit,
        } => {
            let to_light = surface_to_light.normalize_or_zero();
            let dot_from_direction = to_light.dot(reverse_light_direction);
            let in_light = smoothstep(outer_limit.cos(), inner_limit.cos(), dot_from_direction);
            in_light * normal.dot(to_light).max(0.0)
        }
    }
}

/// Color model of the lit-scene pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadingModel {
    /// Base texture times color multiplier
    #[default]
    Lambert,
    /// Emissive, ambient, half-Lambert diffuse and specular material terms
    BlinnPhong,
}

/// Everything interpolated or looked up for one fragment
#[derive(Debug, Clone, Copy)]
pub struct Surface {
    /// Unit normal
    pub normal: Vec3,
    /// Unit vector to the light used for diffuse and highlight terms
    pub light_direction: Vec3,
    /// Unit vector to the viewer
    pub surface_to_view: Vec3,
    pub texcoord: Vec2,
    pub vertex_color: Vec4,
    /// Sample of the part's base texture
    pub texture: Vec4,
    /// Per-instance color multiplier
    pub color_mult: Vec4,
}

/// Final fragment color.
///
/// `light` is the light term tinted by the light color and `shadow` the
/// shadow factor. Alpha never depends on either.
pub fn shade(
    model: ShadingModel,
    material: &Material,
    surface: &Surface,
    ambient_light: Vec3,
    light: Vec3,
    shadow: f32,
) -> Vec4 {
    let base = surface.texture * surface.color_mult;
    match model {
        ShadingModel::Lambert => (base.truncate() * light * shadow).extend(base.w),
        ShadingModel::BlinnPhong => {
            let normal = surface.normal;
            let half_vector = (surface.light_direction + surface.surface_to_view).normalize_or_zero();
            let half_lambert = surface.light_direction.dot(normal) * 0.5 + 0.5;
            let highlight = normal.dot(half_vector).clamp(0.0, 1.0);

            let diffuse_map = material.diffuse_map.sample(surface.texcoord);
            let specular_map = material.specular_map.sample(surface.texcoord);
            let effective_diffuse = material.diffuse * diffuse_map.truncate() * surface.vertex_color.truncate();
            let effective_opacity = material.opacity * diffuse_map.w * surface.vertex_color.w;

            let color = material.emissive
                + material.ambient * ambient_light
                + effective_diffuse * half_lambert
                + material.specular * specular_map.truncate() * highlight.powf(material.shininess);

            (color * base.truncate() * light * shadow).extend(base.w * effective_opacity)
        }
    }
}
