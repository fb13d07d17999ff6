//! Shadow demo: primitives on a checkered ground, optional OBJ models
//!
//! Usage: `penumbra [settings.ron|settings.json] [model.obj ...]`
//!
//! Keys: P perspective light, T soft shadows, F light frustum, M Blinn-Phong,
//! `[` / `]` bias, arrows move the light, Esc quits.

use std::path::PathBuf;

use penumbra::prelude::*;

const MODEL_COPIES: usize = 5;
const MODEL_SPACING: f32 = 4.0;
const BIAS_STEP: f32 = 0.001;
const LIGHT_SPEED: f32 = 3.0;

struct ShadowDemo {
    settings: Settings,
    models: Vec<PathBuf>,
    instances: Vec<Instance>,
    light_motion: Vec3,
}

impl ShadowDemo {
    fn new(settings: Settings, models: Vec<PathBuf>) -> Self {
        Self {
            settings,
            models,
            instances: Vec::new(),
            light_motion: Vec3::ZERO,
        }
    }

    fn add_primitives(&mut self, registry: &mut Registry) {
        let checker = Handle::new(TextureImage::checkerboard());
        let material = registry.default_material();

        let plane = registry.add_textured_part("plane", Mesh::plane(200.0, 200.0), material.clone(), checker.clone());
        let sphere = registry.add_textured_part("sphere", Mesh::sphere(1.0, 32, 24), material.clone(), checker.clone());
        let cube = registry.add_textured_part("cube", Mesh::cube(2.0), material, checker);

        self.instances.push(Instance::new(plane, Transform::IDENTITY));
        self.instances.push(
            Instance::new(sphere, Transform::translation(Vec3::new(2.0, 3.0, 4.0))).with_color(Vec4::new(1.0, 0.5, 0.5, 1.0)),
        );
        self.instances.push(
            Instance::new(cube, Transform::translation(Vec3::new(3.0, 1.0, 0.0))).with_color(Vec4::new(0.5, 1.0, 0.5, 1.0)),
        );
    }

    fn add_models(&mut self, registry: &mut Registry) {
        let mut rng = rand::thread_rng();
        for path in &self.models {
            let parts = match load_obj_model(path, registry) {
                Ok(parts) => parts,
                Err(e) => {
                    log::error!("Skipping model {}: {}", path.display(), e);
                    continue;
                }
            };
            for position in unique_positions(MODEL_COPIES, Vec2::splat(20.0), MODEL_SPACING, &mut rng) {
                let world = Transform::translation(position);
                self.instances
                    .extend(parts.iter().map(|&part| Instance::new(part, world)));
            }
        }
    }
}

impl Game for ShadowDemo {
    fn init(&mut self, ctx: &mut EngineContext) {
        log::info!("Initializing shadow demo");
        self.add_primitives(&mut ctx.registry);
        self.add_models(&mut ctx.registry);
        log::info!("{} parts, {} instances", ctx.registry.len(), self.instances.len());
    }

    fn update(&mut self, ctx: &mut EngineContext) {
        let step = self.light_motion * LIGHT_SPEED * ctx.delta();
        self.settings.light.position += step;
        self.settings.light.target += step;
    }

    fn render(&mut self, ctx: &mut EngineContext) {
        let camera = self.settings.camera(ctx.width(), ctx.height());
        let light = self.settings.light_space();
        let Some((registry, pipeline)) = ctx.frame() else {
            return;
        };

        let scene = Scene {
            shadow: self.settings.shadow_filter(),
            out_of_range: self.settings.shadow.out_of_range,
            shading: self.settings.shading_model(),
            ambient_light: self.settings.shadow.ambient_light,
            show_light_frustum: self.settings.shadow.show_frustum,
            ..Scene::new(registry, &self.instances)
        };
        if let Err(e) = pipeline.render_frame(&scene, &camera, &light) {
            log::error!("Frame failed: {}", e);
        }
    }

    fn on_key(&mut self, _ctx: &mut EngineContext, key: KeyCode, pressed: bool) {
        let axis = if pressed { 1.0 } else { 0.0 };
        match key {
            KeyCode::ArrowLeft => self.light_motion.x = -axis,
            KeyCode::ArrowRight => self.light_motion.x = axis,
            KeyCode::ArrowUp => self.light_motion.z = -axis,
            KeyCode::ArrowDown => self.light_motion.z = axis,
            _ if !pressed => {}
            KeyCode::KeyP => {
                self.settings.light.perspective = !self.settings.light.perspective;
                log::info!("Perspective light: {}", self.settings.light.perspective);
            }
            KeyCode::KeyT => {
                self.settings.shadow.soft = !self.settings.shadow.soft;
                log::info!("Soft shadows: {}", self.settings.shadow.soft);
            }
            KeyCode::KeyF => self.settings.shadow.show_frustum = !self.settings.shadow.show_frustum,
            KeyCode::KeyM => self.settings.shadow.blinn_phong = !self.settings.shadow.blinn_phong,
            KeyCode::BracketLeft => {
                self.settings.shadow.bias -= BIAS_STEP;
                log::info!("Bias: {:.4}", self.settings.shadow.bias);
            }
            KeyCode::BracketRight => {
                self.settings.shadow.bias += BIAS_STEP;
                log::info!("Bias: {:.4}", self.settings.shadow.bias);
            }
            _ => {}
        }
    }
}

fn main() {
    let mut settings_path = None;
    let mut models = Vec::new();
    for arg in std::env::args().skip(1).map(PathBuf::from) {
        match arg.extension().and_then(|e| e.to_str()) {
            Some("ron" | "json") => settings_path = Some(arg),
            _ => models.push(arg),
        }
    }

    let settings = match settings_path {
        Some(path) => Settings::load(&path).unwrap_or_else(|e| {
            eprintln!("Using default settings, {} unreadable: {}", path.display(), e);
            Settings::default()
        }),
        None => Settings::default(),
    };

    let config = settings
        .engine_config()
        .with_shadow_map_size(settings.shadow.map_size);
    let engine = Engine::new(config, ShadowDemo::new(settings, models));

    if let Err(e) = engine.run() {
        eprintln!("Engine error: {}", e);
    }
}
