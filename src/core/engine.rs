//! Window, event loop and frame driving

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::renderer::software::DEFAULT_DEPTH_SIZE;
use crate::renderer::{Pipeline, Registry, Renderer};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable VSync
    pub vsync: bool,
    /// Side length of the shadow depth target
    pub shadow_map_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: String::from("Penumbra"),
            width: 1280,
            height: 720,
            vsync: true,
            shadow_map_size: DEFAULT_DEPTH_SIZE,
        }
    }
}

impl EngineConfig {
    /// Create a new config with a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set window dimensions
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable VSync
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the shadow depth target size
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }
}

/// Application callbacks
pub trait Game: 'static {
    /// Called once, after the renderer exists. Register parts here.
    fn init(&mut self, engine: &mut EngineContext);

    /// Called every frame before rendering
    fn update(&mut self, engine: &mut EngineContext);

    /// Called every frame to draw
    fn render(&mut self, engine: &mut EngineContext);

    /// Called when the window is resized
    fn on_resize(&mut self, _engine: &mut EngineContext, _width: u32, _height: u32) {}

    /// Called on key press and release
    fn on_key(&mut self, _engine: &mut EngineContext, _key: KeyCode, _pressed: bool) {}

    /// Called when the game is shutting down
    fn shutdown(&mut self, _engine: &mut EngineContext) {}
}

/// Context passed to game callbacks
pub struct EngineContext {
    /// Parts available for drawing
    pub registry: Registry,
    pipeline: Option<Pipeline<Renderer>>,
    window_size: PhysicalSize<u32>,
    last_frame: Instant,
    delta: f32,
    elapsed: f32,
    should_quit: bool,
}

impl EngineContext {
    fn new(width: u32, height: u32) -> Self {
        Self {
            registry: Registry::new(),
            pipeline: None,
            window_size: PhysicalSize::new(width, height),
            last_frame: Instant::now(),
            delta: 0.0,
            elapsed: 0.0,
            should_quit: false,
        }
    }

    /// Registry and GPU pipeline, borrowed together for building a frame
    pub fn frame(&mut self) -> Option<(&Registry, &mut Pipeline<Renderer>)> {
        let pipeline = self.pipeline.as_mut()?;
        Some((&self.registry, pipeline))
    }

    /// Check if renderer is available
    pub fn has_renderer(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Get window width
    pub fn width(&self) -> u32 {
        self.window_size.width
    }

    /// Get window height
    pub fn height(&self) -> u32 {
        self.window_size.height
    }

    /// Seconds since the previous frame
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Seconds since the first frame
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Check if engine should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now.duration_since(self.last_frame).as_secs_f32();
        self.elapsed += self.delta;
        self.last_frame = now;
    }

    /// Send newly registered parts to the GPU
    fn upload_pending(&mut self) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.backend_mut().upload_parts(&mut self.registry);
        }
    }
}

/// Main engine struct
pub struct Engine<G: Game> {
    config: EngineConfig,
    game: G,
    context: EngineContext,
    window: Option<Arc<Window>>,
    initialized: bool,
}

impl<G: Game> Engine<G> {
    /// Create a new engine with the given game
    pub fn new(config: EngineConfig, game: G) -> Self {
        let context = EngineContext::new(config.width, config.height);
        Self {
            config,
            game,
            context,
            window: None,
            initialized: false,
        }
    }

    /// Run the engine
    ///
    /// # Errors
    ///
    /// Returns an error if the event loop cannot be created or fails
    pub fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        env_logger::init();
        log::info!("Starting engine: {}", self.config.title);

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        Ok(())
    }
}

impl<G: Game> ApplicationHandler for Engine<G> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let renderer = pollster::block_on(Renderer::with_depth_size(
            Arc::clone(&window),
            self.config.vsync,
            self.config.shadow_map_size,
        ));
        match renderer {
            Ok(renderer) => self.context.pipeline = Some(Pipeline::new(renderer)),
            Err(e) => {
                log::error!("Failed to initialize renderer: {}", e);
                event_loop.exit();
                return;
            }
        }

        let size = window.inner_size();
        self.context.window_size = size;
        self.window = Some(window);

        if !self.initialized {
            self.game.init(&mut self.context);
            self.context.upload_pending();
            self.initialized = true;
            log::info!("Engine initialized successfully");
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                self.game.shutdown(&mut self.context);
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    log::debug!("Resized to {}x{}", new_size.width, new_size.height);
                    self.context.window_size = new_size;
                    if let Some(pipeline) = self.context.pipeline.as_mut() {
                        pipeline.backend_mut().resize(new_size.width, new_size.height);
                    }
                    self.game
                        .on_resize(&mut self.context, new_size.width, new_size.height);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.repeat {
                    return;
                }
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    let pressed = event.state == ElementState::Pressed;
                    if pressed && key_code == KeyCode::Escape {
                        self.context.quit();
                    }
                    self.game.on_key(&mut self.context, key_code, pressed);
                }
            }

            WindowEvent::RedrawRequested => {
                self.context.tick();
                self.game.update(&mut self.context);

                if self.context.should_quit() {
                    self.game.shutdown(&mut self.context);
                    event_loop.exit();
                    return;
                }

                self.context.upload_pending();
                self.game.render(&mut self.context);

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
