//! CPU backend of the shadow pipeline

use std::convert::Infallible;

use glam::{Vec2, Vec3, Vec4};

use crate::math::Transform;
use crate::renderer::mesh::Mesh;
use crate::renderer::pipeline::{FramePlan, RenderBackend, Scene};
use crate::renderer::registry::PartId;
use crate::renderer::shading::{self, LightModel, Surface};
use crate::renderer::software::depth::DepthBuffer;
use crate::renderer::software::raster::{FaceCull, rasterize_triangle};

/// Visible surface recorded for one camera pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentRecord {
    pub part: PartId,
    pub world_position: Vec3,
    pub normal: Vec3,
    /// Shadow factor, 1 is fully lit
    pub shadow: f32,
    /// Light term before shadowing
    pub light: f32,
    pub color: Vec4,
}

/// Shading inputs evaluated at an arbitrary surface point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    /// Point in depth-target texture space
    pub projected: Vec3,
    pub in_range: bool,
    pub shadow: f32,
    pub light: f32,
}

/// Fill the depth target with scene depth seen from the light.
///
/// The target is cleared first, so repeating the pass with the same inputs
/// gives identical contents. Faces turned away from the light are culled,
/// as in the GPU depth pass.
pub fn render_depth_pass<'m>(
    light_view: &Transform,
    light_projection: &Transform,
    draws: impl IntoIterator<Item = (&'m Mesh, Transform)>,
    target: &mut DepthBuffer,
) {
    target.clear();
    let view_projection = *light_projection * *light_view;
    let (width, height) = (target.width(), target.height());

    for (mesh, world) in draws {
        let clip_from_model = view_projection * world;
        for triangle in mesh.triangles() {
            let clip = triangle.map(|v| clip_from_model.transform_vec4(Vec3::from(v.position).extend(1.0)));
            rasterize_triangle(clip, width, height, FaceCull::Back, |fragment| {
                target.test_and_set(fragment.x, fragment.y, fragment.depth);
            });
        }
    }
}

/// Deterministic reference renderer
///
/// Keeps the light's depth buffer and, for every camera pixel, the nearest
/// surface with its shading terms.
#[derive(Debug, Clone)]
pub struct SoftwareRenderer {
    shadow_map: DepthBuffer,
    width: u32,
    height: u32,
    camera_depth: DepthBuffer,
    fragments: Vec<Option<FragmentRecord>>,
}

impl SoftwareRenderer {
    /// Camera target of `width` x `height` with the default 512x512 shadow map
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_shadow_map(width, height, DepthBuffer::default())
    }

    /// Camera target with a specific shadow map
    pub fn with_shadow_map(width: u32, height: u32, shadow_map: DepthBuffer) -> Self {
        let camera_depth = DepthBuffer::new(width, height);
        let (width, height) = (camera_depth.width(), camera_depth.height());
        Self {
            shadow_map,
            width,
            height,
            camera_depth,
            fragments: vec![None; (width * height) as usize],
        }
    }

    /// Depth seen from the light in the last frame
    pub fn shadow_map(&self) -> &DepthBuffer {
        &self.shadow_map
    }

    /// Camera target size
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Recorded surface at a camera pixel
    pub fn fragment(&self, x: u32, y: u32) -> Option<&FragmentRecord> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.fragments
            .get((y * self.width + x) as usize)
            .and_then(Option::as_ref)
    }

    /// All covered camera pixels
    pub fn fragments(&self) -> impl Iterator<Item = &FragmentRecord> {
        self.fragments.iter().flatten()
    }

    /// Shadow and light terms at a world point with the last frame's depth
    pub fn probe(&self, plan: &FramePlan, world_position: Vec3, normal: Vec3) -> Probe {
        let projected = shading::project(&plan.texture_matrix, world_position);
        Probe {
            projected,
            in_range: shading::in_range(projected),
            shadow: shading::shadow_factor(projected, &plan.shadow, &self.shadow_map),
            light: light_at(plan, world_position, normal.normalize_or_zero()),
        }
    }
}

fn light_at(plan: &FramePlan, world_position: Vec3, normal: Vec3) -> f32 {
    shading::light_term(
        plan.light_model,
        normal,
        plan.light.position - world_position,
        plan.reverse_light_direction,
    )
}

fn light_direction(plan: &FramePlan, world_position: Vec3) -> Vec3 {
    match plan.light_model {
        LightModel::Directional => plan.reverse_light_direction,
        LightModel::Spot { .. } => (plan.light.position - world_position).normalize_or_zero(),
    }
}

impl RenderBackend for SoftwareRenderer {
    type Error = Infallible;

    fn prepare(&mut self, _plan: &FramePlan, _scene: &Scene<'_>) -> Result<(), Infallible> {
        self.camera_depth.clear();
        self.fragments.fill(None);
        Ok(())
    }

    fn depth_pass(&mut self, plan: &FramePlan, scene: &Scene<'_>) -> Result<(), Infallible> {
        let draws = scene.instances.iter().filter_map(|instance| {
            let part = scene.registry.part(instance.part)?;
            Some((&part.mesh, instance.world))
        });
        render_depth_pass(&plan.light_view, &plan.light_projection, draws, &mut self.shadow_map);
        Ok(())
    }

    fn camera_pass(&mut self, plan: &FramePlan, scene: &Scene<'_>) -> Result<(), Infallible> {
        let view_projection = plan.camera_projection * plan.camera_view;
        let (width, height) = (self.width, self.height);

        for (part_id, instances) in scene.batches() {
            let Some(part) = scene.registry.part(part_id) else {
                continue;
            };
            for instance in instances {
                let clip_from_model = view_projection * instance.world;
                let normal_matrix = instance.world.inverse().transpose();

                for triangle in part.mesh.triangles() {
                    let clip = triangle
                        .map(|v| clip_from_model.transform_vec4(Vec3::from(v.position).extend(1.0)));
                    let world = triangle.map(|v| instance.world.project_point(Vec3::from(v.position)));
                    let normals = triangle.map(|v| normal_matrix.transform_vector(Vec3::from(v.normal)));
                    let texcoords = triangle.map(|v| Vec2::from(v.texcoord));
                    let colors = triangle.map(|v| Vec4::from(v.color));

                    let shadow_map = &self.shadow_map;
                    let camera_depth = &mut self.camera_depth;
                    let fragments = &mut self.fragments;

                    rasterize_triangle(clip, width, height, FaceCull::Back, |fragment| {
                        if !camera_depth.test_and_set(fragment.x, fragment.y, fragment.depth) {
                            return;
                        }
                        let world_position = fragment.interpolate(world);
                        let normal = fragment.interpolate(normals).normalize_or_zero();
                        let texcoord = fragment.interpolate(texcoords);

                        let projected = shading::project(&plan.texture_matrix, world_position);
                        let shadow = shading::shadow_factor(projected, &plan.shadow, shadow_map);
                        let light = light_at(plan, world_position, normal);

                        let surface = Surface {
                            normal,
                            light_direction: light_direction(plan, world_position),
                            surface_to_view: (plan.camera_position - world_position).normalize_or_zero(),
                            texcoord,
                            vertex_color: fragment.interpolate(colors),
                            texture: part.texture.sample(texcoord),
                            color_mult: instance.color_mult,
                        };
                        let color = shading::shade(
                            plan.shading,
                            &part.material,
                            &surface,
                            plan.ambient_light,
                            plan.light.color * light,
                            shadow,
                        );

                        fragments[(fragment.y * width + fragment.x) as usize] = Some(FragmentRecord {
                            part: part_id,
                            world_position,
                            normal,
                            shadow,
                            light,
                            color,
                        });
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::camera::Camera;
    use crate::renderer::light::LightSpace;
    use crate::renderer::pipeline::{Instance, Pipeline};
    use crate::renderer::registry::Registry;

    fn overhead_light() -> LightSpace {
        LightSpace {
            position: Vec3::new(0.0, 5.0, 0.0),
            target: Vec3::ZERO,
            bias: -0.005,
            ..LightSpace::new()
        }
    }

    #[test]
    fn test_depth_pass_records_plane_depth() {
        let plane = Mesh::plane(4.0, 4.0);
        let light = overhead_light();
        let mut target = DepthBuffer::new(64, 64);

        render_depth_pass(
            &light.view_matrix(),
            &light.projection_matrix(),
            [(&plane, Transform::IDENTITY)],
            &mut target,
        );

        // Plane 5 units below the light in a [0.5, 10] depth range
        let expected = (5.0 - 0.5) / (10.0 - 0.5);
        assert!((target.get(32, 32).unwrap() - expected).abs() < 1e-5);
        assert_eq!(target.get(0, 0), Some(1.0));
    }

    #[test]
    fn test_camera_pass_records_visible_part() {
        let mut registry = Registry::new();
        let material = registry.default_material();
        let plane = registry.add_part("plane", Mesh::plane(8.0, 8.0), material);
        let instances = [Instance::new(plane, Transform::IDENTITY)];
        let scene = Scene::new(&registry, &instances);

        let camera = Camera::look_at(Vec3::new(0.0, 10.0, 0.1), Vec3::ZERO, Vec3::Y);
        let mut pipeline = Pipeline::new(SoftwareRenderer::with_shadow_map(32, 32, DepthBuffer::new(64, 64)));
        pipeline.render_frame(&scene, &camera, &overhead_light()).unwrap();

        let center = pipeline.backend().fragment(16, 16).unwrap();
        assert_eq!(center.part, plane);
        assert!(center.world_position.y.abs() < 1e-4);
        assert_eq!(center.shadow, 1.0);
        assert!(center.light > 0.99);
    }

    #[test]
    fn test_prepare_clears_previous_frame() {
        let mut registry = Registry::new();
        let material = registry.default_material();
        let plane = registry.add_part("plane", Mesh::plane(8.0, 8.0), material);
        let instances = [Instance::new(plane, Transform::IDENTITY)];
        let camera = Camera::look_at(Vec3::new(0.0, 10.0, 0.1), Vec3::ZERO, Vec3::Y);
        let mut pipeline = Pipeline::new(SoftwareRenderer::with_shadow_map(16, 16, DepthBuffer::new(32, 32)));

        pipeline
            .render_frame(&Scene::new(&registry, &instances), &camera, &overhead_light())
            .unwrap();
        assert!(pipeline.backend().fragments().count() > 0);

        pipeline
            .render_frame(&Scene::new(&registry, &[]), &camera, &overhead_light())
            .unwrap();
        assert_eq!(pipeline.backend().fragments().count(), 0);
    }
}
