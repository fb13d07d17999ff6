//! GPU depth target for the light's depth pass
//!
//! Created once with a fixed resolution. The depth pass writes it as a
//! depth attachment; the scene pass reads it as a plain depth texture
//! through a clamp-to-edge, nearest sampler and does the comparison in the
//! shader.

use bytemuck::{Pod, Zeroable};

use crate::math::Transform;

/// Format of the shadow depth target
pub const DEPTH_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Uniform of the depth pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DepthPassUniform {
    pub light_view_projection: [[f32; 4]; 4],
}

impl DepthPassUniform {
    pub fn new(light_view_projection: &Transform) -> Self {
        Self {
            light_view_projection: light_view_projection.to_cols_array_2d(),
        }
    }
}

/// Depth texture rendered from the light
#[derive(Debug)]
pub struct DepthTarget {
    /// Depth texture
    pub texture: wgpu::Texture,
    /// View used both as attachment and for sampling
    pub view: wgpu::TextureView,
    /// Clamp-to-edge, nearest sampler
    pub sampler: wgpu::Sampler,
    size: u32,
}

impl DepthTarget {
    /// Create a square depth target
    #[must_use]
    pub fn new(device: &wgpu::Device, size: u32) -> Self {
        let size = size.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow_depth_texture"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: None,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            size,
        }
    }

    /// Bind group layout entries for sampling the target, at `binding` and
    /// `binding + 1`
    pub fn layout_entries(binding: u32) -> [wgpu::BindGroupLayoutEntry; 2] {
        [
            wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: binding + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
        ]
    }

    /// Bind group entries matching [`Self::layout_entries`]
    pub fn bind_entries(&self, binding: u32) -> [wgpu::BindGroupEntry<'_>; 2] {
        [
            wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(&self.view),
            },
            wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ]
    }

    /// Side length in texels
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }
}
