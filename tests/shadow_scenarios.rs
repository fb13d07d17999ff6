//! End-to-end shadow scenarios on the CPU backend

use std::convert::Infallible;

use glam::Vec3;
use penumbra::assets::load_obj_model;
use penumbra::core::Settings;
use penumbra::math::Transform;
use penumbra::renderer::software::{DepthBuffer, SoftwareRenderer};
use penumbra::renderer::{
    Camera, FramePlan, Instance, LightProjection, LightSpace, Mesh, PartId, Pipeline, Registry, RenderBackend, Scene, ShadowFilter,
};

fn overhead_light() -> LightSpace {
    LightSpace {
        position: Vec3::new(0.0, 5.0, 0.0),
        target: Vec3::ZERO,
        bias: -0.005,
        ..LightSpace::new()
    }
}

fn overhead_camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 10.0, 0.1), Vec3::ZERO, Vec3::Y)
}

fn renderer() -> Pipeline<SoftwareRenderer> {
    Pipeline::new(SoftwareRenderer::with_shadow_map(64, 64, DepthBuffer::new(256, 256)))
}

struct World {
    registry: Registry,
    plane: PartId,
    instances: Vec<Instance>,
}

fn ground(size: f32) -> World {
    let mut registry = Registry::new();
    let material = registry.default_material();
    let plane = registry.add_part("plane", Mesh::plane(size, size), material);
    World {
        registry,
        plane,
        instances: vec![Instance::new(plane, Transform::IDENTITY)],
    }
}

fn ground_with_cube() -> World {
    let mut world = ground(8.0);
    let material = world.registry.default_material();
    let cube = world.registry.add_part("cube", Mesh::cube(2.0), material);
    world
        .instances
        .push(Instance::new(cube, Transform::translation(Vec3::new(0.0, 1.0, 0.0))));
    world
}

#[test]
fn test_unoccluded_plane_is_fully_lit() {
    let world = ground(8.0);
    let scene = Scene::new(&world.registry, &world.instances);
    let mut pipeline = renderer();
    pipeline
        .render_frame(&scene, &overhead_camera(), &overhead_light())
        .unwrap();

    let fragments: Vec<_> = pipeline.backend().fragments().collect();
    assert!(!fragments.is_empty());
    for fragment in fragments {
        assert_eq!(fragment.part, world.plane);
        assert_eq!(fragment.shadow, 1.0);
        assert!(fragment.light > 0.0);
    }
}

#[test]
fn test_cube_shadows_plane_beneath_it() {
    let world = ground_with_cube();
    let scene = Scene::new(&world.registry, &world.instances);
    let mut pipeline = renderer();
    let plan = pipeline
        .render_frame(&scene, &overhead_camera(), &overhead_light())
        .unwrap();
    let backend = pipeline.backend();

    for point in [Vec3::ZERO, Vec3::new(0.5, 0.0, -0.5), Vec3::new(-0.8, 0.0, 0.8)] {
        let probe = backend.probe(&plan, point, Vec3::Y);
        assert!(probe.in_range);
        assert_eq!(probe.shadow, 0.0, "expected shadow at {point}");
    }
    for point in [Vec3::new(3.0, 0.0, 3.0), Vec3::new(-2.5, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0)] {
        let probe = backend.probe(&plan, point, Vec3::Y);
        assert_eq!(probe.shadow, 1.0, "expected light at {point}");
    }

    // The cube's top faces the light and must not shadow itself
    let top: Vec<_> = backend
        .fragments()
        .filter(|f| f.part != world.plane && f.normal.y > 0.9)
        .collect();
    assert!(!top.is_empty());
    assert!(top.iter().all(|f| f.shadow == 1.0));
}

#[test]
fn test_out_of_range_points_use_policy_value() {
    let world = ground(8.0);
    let far_away = Vec3::new(20.0, 0.0, 0.0);
    let mut pipeline = renderer();

    let cases = [
        (ShadowFilter::Hard, None, 1.0),
        (ShadowFilter::Soft { penumbra: 0.06 }, None, 0.6),
        (ShadowFilter::Hard, Some(0.25), 0.25),
    ];
    for (filter, out_of_range, expected) in cases {
        let scene = Scene {
            shadow: filter,
            out_of_range,
            ..Scene::new(&world.registry, &world.instances)
        };
        let plan = pipeline
            .render_frame(&scene, &overhead_camera(), &overhead_light())
            .unwrap();
        let probe = pipeline.backend().probe(&plan, far_away, Vec3::Y);
        assert!(!probe.in_range);
        assert_eq!(probe.shadow, expected);
    }
}

#[test]
fn test_soft_shadow_fully_lit_when_bias_exceeds_penumbra() {
    let world = ground_with_cube();
    let scene = Scene {
        shadow: ShadowFilter::Soft { penumbra: 0.06 },
        ..Scene::new(&world.registry, &world.instances)
    };
    let light = LightSpace {
        bias: -0.08,
        ..overhead_light()
    };
    let mut pipeline = renderer();
    let plan = pipeline.render_frame(&scene, &overhead_camera(), &light).unwrap();

    assert_eq!(pipeline.backend().probe(&plan, Vec3::new(3.0, 0.0, 3.0), Vec3::Y).shadow, 1.0);
    assert_eq!(pipeline.backend().probe(&plan, Vec3::ZERO, Vec3::Y).shadow, 0.0);
}

#[test]
fn test_depth_pass_is_repeatable() {
    let world = ground_with_cube();
    let scene = Scene::new(&world.registry, &world.instances);
    let light = overhead_light();

    let mut pipeline = renderer();
    pipeline.render_frame(&scene, &overhead_camera(), &light).unwrap();
    let first = pipeline.backend().shadow_map().clone();
    pipeline.render_frame(&scene, &overhead_camera(), &light).unwrap();
    assert_eq!(pipeline.backend().shadow_map(), &first);

    let mut fresh = renderer();
    fresh.render_frame(&scene, &overhead_camera(), &light).unwrap();
    assert_eq!(fresh.backend().shadow_map(), &first);
}

#[test]
fn test_more_negative_bias_never_adds_acne() {
    let world = ground(6.0);
    let scene = Scene::new(&world.registry, &world.instances);

    // Oblique light so the plane is tilted relative to the depth target
    let oblique = LightSpace {
        position: Vec3::new(4.0, 5.0, 0.0),
        target: Vec3::ZERO,
        ..LightSpace::new()
    };

    let mut previous = usize::MAX;
    for bias in [0.0, -0.001, -0.003, -0.01, -0.05] {
        let mut pipeline = Pipeline::new(SoftwareRenderer::with_shadow_map(64, 64, DepthBuffer::new(64, 64)));
        let light = LightSpace { bias, ..oblique };
        pipeline.render_frame(&scene, &overhead_camera(), &light).unwrap();

        let acne = pipeline
            .backend()
            .fragments()
            .filter(|f| f.part == world.plane && f.shadow < 1.0)
            .count();
        assert!(acne <= previous, "bias {bias} shadowed {acne} fragments, more than {previous}");
        previous = acne;
    }
    assert_eq!(previous, 0);
}

#[test]
fn test_loaded_model_casts_shadow() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panel.obj");
    std::fs::write(
        &path,
        "v -1 1 -1\nv 1 1 -1\nv 1 1 1\nv -1 1 1\nvn 0 1 0\nf 1//1 4//1 3//1 2//1\n",
    )
    .unwrap();

    let mut world = ground(8.0);
    let parts = load_obj_model(&path, &mut world.registry).unwrap();
    assert_eq!(parts.len(), 1);
    world
        .instances
        .extend(parts.iter().map(|&part| Instance::new(part, Transform::IDENTITY)));

    let scene = Scene::new(&world.registry, &world.instances);
    let mut pipeline = renderer();
    let plan = pipeline
        .render_frame(&scene, &overhead_camera(), &overhead_light())
        .unwrap();

    assert_eq!(pipeline.backend().probe(&plan, Vec3::ZERO, Vec3::Y).shadow, 0.0);
    assert_eq!(pipeline.backend().probe(&plan, Vec3::new(3.0, 0.0, 0.0), Vec3::Y).shadow, 1.0);
}

#[test]
fn test_occluder_reaching_behind_perspective_light_still_casts() {
    let mut world = ground(8.0);
    let material = world.registry.default_material();
    let slab = world.registry.add_part("slab", Mesh::plane(40.0, 40.0), material);
    world
        .instances
        .push(Instance::new(slab, Transform::translation(Vec3::new(0.0, 2.0, 0.0))));
    let scene = Scene::new(&world.registry, &world.instances);

    // Part of the slab lies behind the light's eye plane
    let light = LightSpace {
        position: Vec3::new(0.0, 5.0, 3.0),
        target: Vec3::ZERO,
        projection: LightProjection::Perspective {
            field_of_view: 120f32.to_radians(),
        },
        bias: -0.005,
        ..LightSpace::new()
    };
    let mut pipeline = renderer();
    let plan = pipeline.render_frame(&scene, &overhead_camera(), &light).unwrap();

    let probe = pipeline.backend().probe(&plan, Vec3::ZERO, Vec3::Y);
    assert!(probe.in_range);
    assert_eq!(probe.shadow, 0.0);
}

#[test]
fn test_default_camera_sees_large_ground() {
    let world = ground(200.0);
    let scene = Scene::new(&world.registry, &world.instances);
    let settings = Settings::default();

    let mut pipeline = Pipeline::new(SoftwareRenderer::with_shadow_map(64, 64, DepthBuffer::new(64, 64)));
    pipeline
        .render_frame(&scene, &settings.camera(64, 64), &settings.light_space())
        .unwrap();

    let fragments: Vec<_> = pipeline.backend().fragments().collect();
    assert!(fragments.len() > 64 * 64 / 4);
    assert!(fragments.iter().all(|f| f.part == world.plane && f.world_position.y.abs() < 1e-3));
}

/// Records the passes while delegating to the CPU backend
struct Traced {
    inner: SoftwareRenderer,
    calls: Vec<&'static str>,
}

impl RenderBackend for Traced {
    type Error = Infallible;

    fn prepare(&mut self, plan: &FramePlan, scene: &Scene<'_>) -> Result<(), Infallible> {
        self.calls.push("prepare");
        self.inner.prepare(plan, scene)
    }

    fn depth_pass(&mut self, plan: &FramePlan, scene: &Scene<'_>) -> Result<(), Infallible> {
        self.calls.push("depth");
        self.inner.depth_pass(plan, scene)
    }

    fn camera_pass(&mut self, plan: &FramePlan, scene: &Scene<'_>) -> Result<(), Infallible> {
        // The depth target is already filled when the camera pass starts
        assert!(self.inner.shadow_map().texels().iter().any(|&d| d < 1.0));
        self.calls.push("camera");
        self.inner.camera_pass(plan, scene)
    }
}

#[test]
fn test_depth_pass_precedes_camera_pass() {
    let world = ground(8.0);
    let scene = Scene::new(&world.registry, &world.instances);
    let mut pipeline = Pipeline::new(Traced {
        inner: SoftwareRenderer::with_shadow_map(16, 16, DepthBuffer::new(32, 32)),
        calls: Vec::new(),
    });

    for _ in 0..2 {
        pipeline
            .render_frame(&scene, &overhead_camera(), &overhead_light())
            .unwrap();
    }
    assert_eq!(
        pipeline.backend().calls,
        ["prepare", "depth", "camera", "prepare", "depth", "camera"]
    );
}
