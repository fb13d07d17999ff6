//! Per-frame orchestration of the shadow passes
//!
//! `Pipeline::render_frame` derives every matrix of the frame once, then
//! asks the backend for the depth pass from the light followed by the lit
//! pass from the camera. Backends never compute matrices themselves.

use glam::{Vec3, Vec4};

use crate::math::Transform;
use crate::renderer::camera::Camera;
use crate::renderer::light::LightSpace;
use crate::renderer::registry::{PartId, Registry};
use crate::renderer::shading::{
    HARD_OUT_OF_RANGE, LightModel, SOFT_OUT_OF_RANGE, ShadingModel, ShadowFilter, ShadowParams,
};

/// One draw of a registered part
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub part: PartId,
    pub world: Transform,
    /// Multiplies the base texture color
    pub color_mult: Vec4,
}

impl Instance {
    /// Draw `part` at `world` with no tint
    pub fn new(part: PartId, world: Transform) -> Self {
        Self {
            part,
            world,
            color_mult: Vec4::ONE,
        }
    }

    /// Set the color multiplier
    #[must_use]
    pub fn with_color(mut self, color_mult: Vec4) -> Self {
        self.color_mult = color_mult;
        self
    }
}

/// What to draw this frame and how to shade it
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub registry: &'a Registry,
    pub instances: &'a [Instance],
    pub shadow: ShadowFilter,
    /// Overrides the filter's default out-of-range shadow factor
    pub out_of_range: Option<f32>,
    pub shading: ShadingModel,
    pub ambient_light: Vec3,
    /// Draw the light frustum as lines in the camera pass
    pub show_light_frustum: bool,
}

impl<'a> Scene<'a> {
    /// Hard shadows, Lambert shading, no overlay
    pub fn new(registry: &'a Registry, instances: &'a [Instance]) -> Self {
        Self {
            registry,
            instances,
            shadow: ShadowFilter::Hard,
            out_of_range: None,
            shading: ShadingModel::Lambert,
            ambient_light: Vec3::ZERO,
            show_light_frustum: false,
        }
    }

    /// Instances grouped by part, in part order
    ///
    /// Instances referencing unknown parts are skipped.
    pub fn batches(&self) -> Vec<(PartId, Vec<&'a Instance>)> {
        let mut batches: Vec<(PartId, Vec<&'a Instance>)> = Vec::new();
        for instance in self.instances {
            if self.registry.part(instance.part).is_none() {
                log::warn!("Skipping instance of unknown part {:?}", instance.part);
                continue;
            }
            match batches.iter_mut().find(|(part, _)| *part == instance.part) {
                Some((_, group)) => group.push(instance),
                None => batches.push((instance.part, vec![instance])),
            }
        }
        batches.sort_by_key(|(part, _)| *part);
        batches
    }
}

/// Matrices and parameters shared by both passes of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub light: LightSpace,
    pub light_world: Transform,
    pub light_view: Transform,
    pub light_projection: Transform,
    /// World to depth-target texture space
    pub texture_matrix: Transform,
    pub camera_view: Transform,
    pub camera_projection: Transform,
    pub camera_position: Vec3,
    pub reverse_light_direction: Vec3,
    pub light_model: LightModel,
    pub shadow: ShadowParams,
    pub shading: ShadingModel,
    pub ambient_light: Vec3,
    pub show_light_frustum: bool,
}

impl FramePlan {
    /// Derive the frame's matrices
    pub fn new(scene: &Scene<'_>, camera: &Camera, light: &LightSpace) -> Self {
        let light_world = light.world_matrix();
        let light_view = light_world.inverse();
        let light_projection = light.projection_matrix();
        let texture_matrix = Transform::TEXTURE_SPACE * light_projection * light_view;

        let default_out_of_range = match scene.shadow {
            ShadowFilter::Hard => HARD_OUT_OF_RANGE,
            ShadowFilter::Soft { .. } => SOFT_OUT_OF_RANGE,
        };

        Self {
            light: *light,
            light_world,
            light_view,
            light_projection,
            texture_matrix,
            camera_view: camera.view_matrix(),
            camera_projection: camera.projection_matrix(),
            camera_position: camera.position,
            reverse_light_direction: light_world.axis(2).normalize_or_zero(),
            light_model: light.model,
            shadow: ShadowParams {
                bias: light.bias,
                filter: scene.shadow,
                out_of_range: scene.out_of_range.unwrap_or(default_out_of_range),
            },
            shading: scene.shading,
            ambient_light: scene.ambient_light,
            show_light_frustum: scene.show_light_frustum,
        }
    }

    /// Combined light view-projection used by the depth pass
    pub fn light_view_projection(&self) -> Transform {
        self.light_projection * self.light_view
    }
}

/// The two passes of the shadow technique
///
/// Implemented by the GPU `Renderer` and the CPU `SoftwareRenderer`.
pub trait RenderBackend {
    type Error;

    /// Upload or reset per-frame state before the passes
    fn prepare(&mut self, _plan: &FramePlan, _scene: &Scene<'_>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Render scene depth from the light into the depth target
    fn depth_pass(&mut self, plan: &FramePlan, scene: &Scene<'_>) -> Result<(), Self::Error>;

    /// Render the lit scene from the camera, reading the depth target
    fn camera_pass(&mut self, plan: &FramePlan, scene: &Scene<'_>) -> Result<(), Self::Error>;
}

/// Drives a backend through each frame
#[derive(Debug)]
pub struct Pipeline<B> {
    backend: B,
}

impl<B: RenderBackend> Pipeline<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_inner(self) -> B {
        self.backend
    }

    /// Render one frame: depth from the light, then the lit scene.
    ///
    /// # Errors
    ///
    /// Returns the first backend error; later passes are not run.
    pub fn render_frame(&mut self, scene: &Scene<'_>, camera: &Camera, light: &LightSpace) -> Result<FramePlan, B::Error> {
        let plan = FramePlan::new(scene, camera, light);
        self.backend.prepare(&plan, scene)?;
        self.backend.depth_pass(&plan, scene)?;
        self.backend.camera_pass(&plan, scene)?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::mesh::Mesh;

    #[derive(Default)]
    struct Recording {
        calls: Vec<&'static str>,
        fail_depth: bool,
    }

    impl RenderBackend for Recording {
        type Error = String;

        fn prepare(&mut self, _plan: &FramePlan, _scene: &Scene<'_>) -> Result<(), String> {
            self.calls.push("prepare");
            Ok(())
        }

        fn depth_pass(&mut self, _plan: &FramePlan, _scene: &Scene<'_>) -> Result<(), String> {
            self.calls.push("depth");
            if self.fail_depth { Err("lost".into()) } else { Ok(()) }
        }

        fn camera_pass(&mut self, _plan: &FramePlan, _scene: &Scene<'_>) -> Result<(), String> {
            self.calls.push("camera");
            Ok(())
        }
    }

    #[test]
    fn test_passes_run_in_order() {
        let registry = Registry::new();
        let scene = Scene::new(&registry, &[]);
        let mut pipeline = Pipeline::new(Recording::default());

        pipeline
            .render_frame(&scene, &Camera::new(), &LightSpace::new())
            .unwrap();
        pipeline
            .render_frame(&scene, &Camera::new(), &LightSpace::new())
            .unwrap();

        assert_eq!(
            pipeline.backend().calls,
            ["prepare", "depth", "camera", "prepare", "depth", "camera"]
        );
    }

    #[test]
    fn test_backend_error_aborts_frame() {
        let registry = Registry::new();
        let scene = Scene::new(&registry, &[]);
        let mut pipeline = Pipeline::new(Recording {
            fail_depth: true,
            ..Default::default()
        });

        let result = pipeline.render_frame(&scene, &Camera::new(), &LightSpace::new());
        assert_eq!(result.unwrap_err(), "lost");
        assert_eq!(pipeline.into_inner().calls, ["prepare", "depth"]);
    }

    #[test]
    fn test_texture_matrix_centers_light_target() {
        let registry = Registry::new();
        let scene = Scene::new(&registry, &[]);
        let light = LightSpace::new();
        let plan = FramePlan::new(&scene, &Camera::new(), &light);

        let center = plan.texture_matrix.project_point(light.target);
        assert!((center.x - 0.5).abs() < 1e-5);
        assert!((center.y - 0.5).abs() < 1e-5);
        assert!(center.z > 0.0 && center.z < 1.0);
    }

    #[test]
    fn test_out_of_range_policy() {
        let registry = Registry::new();
        let mut scene = Scene::new(&registry, &[]);
        let camera = Camera::new();
        let light = LightSpace::new();

        assert_eq!(FramePlan::new(&scene, &camera, &light).shadow.out_of_range, 1.0);
        scene.shadow = ShadowFilter::Soft { penumbra: 0.06 };
        assert_eq!(FramePlan::new(&scene, &camera, &light).shadow.out_of_range, 0.6);
        scene.out_of_range = Some(0.0);
        assert_eq!(FramePlan::new(&scene, &camera, &light).shadow.out_of_range, 0.0);
    }

    #[test]
    fn test_batches_group_by_part() {
        let mut registry = Registry::new();
        let material = registry.default_material();
        let cube = registry.add_part("cube", Mesh::cube(1.0), material.clone());
        let plane = registry.add_part("plane", Mesh::plane(1.0, 1.0), material);
        let instances = [
            Instance::new(plane, Transform::IDENTITY),
            Instance::new(cube, Transform::IDENTITY),
            Instance::new(plane, Transform::translation(Vec3::X)),
            Instance::new(PartId(9), Transform::IDENTITY),
        ];
        let scene = Scene::new(&registry, &instances);

        let batches = scene.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, cube);
        assert_eq!(batches[1].1.len(), 2);
    }
}
