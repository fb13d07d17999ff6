//! GPU state of the lit scene pass and the light frustum overlay

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::renderer::material::MaterialUniform;
use crate::renderer::mesh::Vertex;
use crate::renderer::pipeline::{FramePlan, Instance};
use crate::renderer::shading::{LightModel, ShadingModel, ShadowFilter};
use crate::renderer::shadow::DepthTarget;
use crate::renderer::texture::Texture;

/// Format of the camera depth buffer
pub const CAMERA_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-frame block of the scene shader, group 0 binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub texture_matrix: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub reverse_light_direction: [f32; 4],
    pub light_position: [f32; 4],
    pub ambient_light: [f32; 4],
    pub light_color: [f32; 4],
    pub bias: f32,
    pub penumbra: f32,
    pub out_of_range: f32,
    pub filter_mode: u32,
    pub light_model: u32,
    pub shading_model: u32,
    /// Cosine of the inner spot limit
    pub inner_limit: f32,
    /// Cosine of the outer spot limit
    pub outer_limit: f32,
}

impl FrameUniform {
    pub fn from_plan(plan: &FramePlan) -> Self {
        let (filter_mode, penumbra) = match plan.shadow.filter {
            ShadowFilter::Hard => (0, 0.0),
            ShadowFilter::Soft { penumbra } => (1, penumbra),
        };
        let (light_model, inner_limit, outer_limit) = match plan.light_model {
            LightModel::Directional => (0, 1.0, 1.0),
            LightModel::Spot {
                inner_limit,
                outer_limit,
            } => (1, inner_limit.cos(), outer_limit.cos()),
        };
        let shading_model = match plan.shading {
            ShadingModel::Lambert => 0,
            ShadingModel::BlinnPhong => 1,
        };

        Self {
            view: plan.camera_view.to_cols_array_2d(),
            projection: plan.camera_projection.to_cols_array_2d(),
            texture_matrix: plan.texture_matrix.to_cols_array_2d(),
            camera_position: plan.camera_position.extend(1.0).into(),
            reverse_light_direction: plan.reverse_light_direction.extend(0.0).into(),
            light_position: plan.light.position.extend(1.0).into(),
            ambient_light: plan.ambient_light.extend(1.0).into(),
            light_color: plan.light.color.extend(1.0).into(),
            bias: plan.shadow.bias,
            penumbra,
            out_of_range: plan.shadow.out_of_range,
            filter_mode,
            light_model,
            shading_model,
            inner_limit,
            outer_limit,
        }
    }
}

/// Per-instance vertex data shared by both passes
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceRaw {
    pub world: [[f32; 4]; 4],
    /// Inverse-transpose of the world matrix, three columns
    pub normal: [[f32; 4]; 3],
    pub color_mult: [f32; 4],
}

impl InstanceRaw {
    const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
        10 => Float32x4,
        11 => Float32x4,
        12 => Float32x4,
    ];

    pub fn new(instance: &Instance) -> Self {
        let normal = instance.world.inverse().transpose().to_cols_array_2d();
        Self {
            world: instance.world.to_cols_array_2d(),
            normal: [normal[0], normal[1], normal[2]],
            color_mult: instance.color_mult.into(),
        }
    }

    /// Get the instance buffer layout for wgpu
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Pipelines and per-frame bindings of the camera pass
#[derive(Debug)]
pub struct ScenePass {
    pub pipeline: wgpu::RenderPipeline,
    pub lines_pipeline: wgpu::RenderPipeline,
    pub material_layout: wgpu::BindGroupLayout,
    pub frame_buffer: wgpu::Buffer,
    pub frame_bind_group: wgpu::BindGroup,
    pub lines_buffer: wgpu::Buffer,
}

/// Vertices of the 12 frustum edges
pub const FRUSTUM_LINE_VERTICES: u32 = 24;

impl ScenePass {
    /// Build pipelines from compiled scene and line shaders
    pub fn new(
        device: &wgpu::Device,
        scene_shader: &wgpu::ShaderModule,
        lines_shader: &wgpu::ShaderModule,
        color_format: wgpu::TextureFormat,
        depth_target: &DepthTarget,
    ) -> Self {
        let [shadow_texture_entry, shadow_sampler_entry] = DepthTarget::layout_entries(1);
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                shadow_texture_entry,
                shadow_sampler_entry,
            ],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Base texture, diffuse map, specular map
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Buffer"),
            size: std::mem::size_of::<FrameUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let [shadow_texture, shadow_sampler] = depth_target.bind_entries(1);
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                shadow_texture,
                shadow_sampler,
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: scene_shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout(), InstanceRaw::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: scene_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: CAMERA_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let lines_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Frustum Lines Pipeline Layout"),
            bind_group_layouts: &[&frame_layout],
            push_constant_ranges: &[],
        });

        let lines_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Frustum Lines Pipeline"),
            layout: Some(&lines_layout),
            vertex: wgpu::VertexState {
                module: lines_shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: lines_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: CAMERA_DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let lines_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frustum Lines Buffer"),
            size: (FRUSTUM_LINE_VERTICES as usize * std::mem::size_of::<[f32; 3]>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            lines_pipeline,
            material_layout,
            frame_buffer,
            frame_bind_group,
            lines_buffer,
        }
    }

    /// Upload the frame block and, when enabled, the frustum lines
    pub fn write_frame(&self, queue: &wgpu::Queue, plan: &FramePlan) {
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&FrameUniform::from_plan(plan)));
        if plan.show_light_frustum {
            let vertices: Vec<[f32; 3]> = plan
                .light
                .frustum_lines()
                .iter()
                .flatten()
                .map(|&p: &Vec3| p.into())
                .collect();
            queue.write_buffer(&self.lines_buffer, 0, bytemuck::cast_slice(&vertices));
        }
    }

    /// Material bind group for one material and base texture
    pub fn create_material_bind_group(
        &self,
        device: &wgpu::Device,
        material: &MaterialUniform,
        base: &Texture,
        diffuse_map: &Texture,
        specular_map: &Texture,
    ) -> wgpu::BindGroup {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::bytes_of(material),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&base.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&diffuse_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&specular_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&base.sampler),
                },
            ],
        })
    }
}
