//! GPU renderer
//!
//! Owns the surface, device and every GPU resource of the shadow pipeline,
//! and implements both passes on top of `wgpu`.

use std::ops::Range;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::assets::Handle;
use crate::renderer::depth_pass::DepthPass;
use crate::renderer::pipeline::{FramePlan, RenderBackend, Scene};
use crate::renderer::registry::{GpuMeshHandle, PartId, Registry};
use crate::renderer::scene_pass::{CAMERA_DEPTH_FORMAT, FRUSTUM_LINE_VERTICES, InstanceRaw, ScenePass};
use crate::renderer::shadow::DepthTarget;
use crate::renderer::software::DEFAULT_DEPTH_SIZE;
use crate::renderer::texture::{Texture, TextureImage};

/// Errors raised by the GPU renderer
#[derive(Debug, Clone)]
pub enum RenderError {
    /// No adapter can present to the window
    NoAdapter,
    /// Device request failed
    Device(String),
    /// Surface creation or presentation failed
    Surface(String),
    /// A shader or its pipeline failed validation
    Shader { label: String, message: String },
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "no suitable GPU adapter found"),
            Self::Device(e) => write!(f, "failed to create device: {e}"),
            Self::Surface(e) => write!(f, "surface error: {e}"),
            Self::Shader { label, message } => write!(f, "shader '{label}' failed: {message}"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Vertex and index buffers of one uploaded part
#[derive(Debug)]
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Instances of one part drawn with one call
#[derive(Debug)]
struct DrawBatch {
    mesh: GpuMeshHandle,
    material: (u64, u64),
    instances: Range<u32>,
}

/// Main renderer
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: (u32, u32),
    depth_view: wgpu::TextureView,
    depth_target: DepthTarget,
    depth_pass: DepthPass,
    scene_pass: ScenePass,
    meshes: Vec<GpuMesh>,
    textures: FxHashMap<u64, Texture>,
    /// Keyed by (material id, base texture id)
    material_bind_groups: FxHashMap<(u64, u64), wgpu::BindGroup>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    draws: Vec<DrawBatch>,
    /// Clear color
    pub clear_color: wgpu::Color,
}

impl Renderer {
    /// Create a renderer with the default 512x512 shadow depth target
    ///
    /// # Errors
    ///
    /// Returns an error if no adapter, device or surface is available, or a
    /// built-in shader fails validation
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RenderError> {
        Self::with_depth_size(window, vsync, DEFAULT_DEPTH_SIZE).await
    }

    /// Create a renderer with a specific shadow depth target size
    ///
    /// # Errors
    ///
    /// See [`Renderer::new`]
    pub async fn with_depth_size(window: Arc<Window>, vsync: bool, depth_size: u32) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let size = (size.width.max(1), size.height.max(1));

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        log::info!("Using GPU: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Penumbra Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::Device(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| RenderError::Surface("surface reports no formats".into()))?;

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.0,
            height: size.1,
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = Self::create_depth_view(&device, size.0, size.1);
        let depth_target = DepthTarget::new(&device, depth_size);

        let depth_pass = checked(&device, "depth", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Depth Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/depth.wgsl").into()),
            });
            DepthPass::new(&device, &shader)
        })
        .await?;

        let scene_pass = checked(&device, "scene", || {
            let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Scene Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
            });
            let lines_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Lines Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/lines.wgsl").into()),
            });
            ScenePass::new(&device, &scene_shader, &lines_shader, config.format, &depth_target)
        })
        .await?;

        let instance_capacity = 64;
        let instance_buffer = Self::create_instance_buffer(&device, instance_capacity);

        log::info!(
            "Renderer ready: {}x{}, shadow depth target {}x{}",
            size.0,
            size.1,
            depth_target.size(),
            depth_target.size()
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            depth_view,
            depth_target,
            depth_pass,
            scene_pass,
            meshes: Vec::new(),
            textures: FxHashMap::default(),
            material_bind_groups: FxHashMap::default(),
            instance_buffer,
            instance_capacity,
            draws: Vec::new(),
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
        })
    }

    fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Camera Depth Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAMERA_DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (capacity * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Resize the renderer
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);

            self.depth_view = Self::create_depth_view(&self.device, width, height);

            log::debug!("Resized to {}x{}", width, height);
        }
    }

    /// Current surface size
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Upload every part that has no GPU buffers yet
    pub fn upload_parts(&mut self, registry: &mut Registry) {
        let pending: Vec<PartId> = registry
            .parts()
            .filter(|(_, part)| part.gpu.is_none())
            .map(|(id, _)| id)
            .collect();

        for id in pending {
            let Some(part) = registry.part_mut(id) else {
                continue;
            };

            let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Vertex Buffer", part.name)),
                contents: bytemuck::cast_slice(part.mesh.vertices()),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Index Buffer", part.name)),
                contents: bytemuck::cast_slice(part.mesh.indices()),
                usage: wgpu::BufferUsages::INDEX,
            });

            part.gpu = Some(GpuMeshHandle(self.meshes.len()));
            self.meshes.push(GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: part.mesh.index_count(),
            });
            log::debug!("Uploaded part '{}'", part.name);
        }
    }

    fn upload_texture(&mut self, image: &Handle<TextureImage>) {
        if !self.textures.contains_key(&image.id()) {
            let texture = Texture::from_image(&self.device, &self.queue, image, Some("Material Texture"));
            self.textures.insert(image.id(), texture);
        }
    }

    /// Make sure a material bind group exists for a part; returns its key
    fn ensure_material(&mut self, registry: &Registry, id: PartId) -> Option<(u64, u64)> {
        let part = registry.part(id)?;
        let key = (part.material.id(), part.texture.id());
        if self.material_bind_groups.contains_key(&key) {
            return Some(key);
        }

        self.upload_texture(&part.texture);
        self.upload_texture(&part.material.diffuse_map);
        self.upload_texture(&part.material.specular_map);

        let base = self.textures.get(&part.texture.id())?;
        let diffuse_map = self.textures.get(&part.material.diffuse_map.id())?;
        let specular_map = self.textures.get(&part.material.specular_map.id())?;
        let bind_group = self.scene_pass.create_material_bind_group(
            &self.device,
            &part.material.to_uniform(),
            base,
            diffuse_map,
            specular_map,
        );
        self.material_bind_groups.insert(key, bind_group);
        Some(key)
    }
}

/// Run GPU object creation inside a validation error scope
async fn checked<T>(device: &wgpu::Device, label: &str, create: impl FnOnce() -> T) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match device.pop_error_scope().await {
        None => Ok(value),
        Some(error) => {
            log::error!("Shader '{}' failed validation: {}", label, error);
            Err(RenderError::Shader {
                label: label.to_string(),
                message: error.to_string(),
            })
        }
    }
}

impl RenderBackend for Renderer {
    type Error = RenderError;

    fn prepare(&mut self, plan: &FramePlan, scene: &Scene<'_>) -> Result<(), RenderError> {
        self.depth_pass.write_frame(&self.queue, plan);
        self.scene_pass.write_frame(&self.queue, plan);

        let mut raw = Vec::with_capacity(scene.instances.len());
        self.draws.clear();
        for (id, instances) in scene.batches() {
            let Some(mesh) = scene.registry.part(id).and_then(|part| part.gpu) else {
                log::warn!("Part {:?} is not uploaded, skipping", id);
                continue;
            };
            let Some(material) = self.ensure_material(scene.registry, id) else {
                continue;
            };
            let start = raw.len() as u32;
            raw.extend(instances.into_iter().map(InstanceRaw::new));
            self.draws.push(DrawBatch {
                mesh,
                material,
                instances: start..raw.len() as u32,
            });
        }

        if raw.len() > self.instance_capacity {
            self.instance_capacity = raw.len().next_power_of_two();
            self.instance_buffer = Self::create_instance_buffer(&self.device, self.instance_capacity);
            log::debug!("Instance buffer grown to {}", self.instance_capacity);
        }
        if !raw.is_empty() {
            self.queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        }
        Ok(())
    }

    fn depth_pass(&mut self, _plan: &FramePlan, _scene: &Scene<'_>) -> Result<(), RenderError> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Depth Pass Encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Depth Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_target.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let size = self.depth_target.size() as f32;
            pass.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
            pass.set_pipeline(&self.depth_pass.pipeline);
            pass.set_bind_group(0, &self.depth_pass.bind_group, &[]);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for draw in &self.draws {
                let Some(mesh) = self.meshes.get(draw.mesh.0) else {
                    continue;
                };
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, draw.instances.clone());
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn camera_pass(&mut self, plan: &FramePlan, _scene: &Scene<'_>) -> Result<(), RenderError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return Err(RenderError::Surface(e.to_string()));
            }
        };

        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Pass Encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.scene_pass.pipeline);
            pass.set_bind_group(0, &self.scene_pass.frame_bind_group, &[]);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for draw in &self.draws {
                let (Some(material), Some(mesh)) = (
                    self.material_bind_groups.get(&draw.material),
                    self.meshes.get(draw.mesh.0),
                ) else {
                    continue;
                };
                pass.set_bind_group(1, material, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, draw.instances.clone());
            }

            if plan.show_light_frustum {
                pass.set_pipeline(&self.scene_pass.lines_pipeline);
                pass.set_bind_group(0, &self.scene_pass.frame_bind_group, &[]);
                pass.set_vertex_buffer(0, self.scene_pass.lines_buffer.slice(..));
                pass.draw(0..FRUSTUM_LINE_VERTICES, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
