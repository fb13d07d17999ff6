//! Texture decoding and GPU upload
//!
//! `TextureImage` is the decoded CPU copy. The software backend samples it
//! directly; the GPU backend uploads it once into a `Texture`.

use std::path::Path;

use glam::{Vec2, Vec4};
use wgpu::util::DeviceExt;

/// Magnification filter requested for a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    /// Bilinear filtering (photographs, model textures)
    #[default]
    Linear,
    /// Nearest texel (pixel-art patterns such as the checkerboard)
    Nearest,
}

/// A decoded RGBA8 image with a bottom-left origin
#[derive(Debug, Clone)]
pub struct TextureImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
    filter: TextureFilter,
}

impl TextureImage {
    /// Load and decode an image file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| TextureError::IoError(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Decode an encoded image (PNG, JPEG)
    ///
    /// Rows are flipped so `v = 0` addresses the bottom of the picture, the
    /// convention OBJ texture coordinates use.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded as an image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TextureError> {
        let img =
            image::load_from_memory(bytes).map_err(|e| TextureError::DecodeError(e.to_string()))?;
        let rgba = image::imageops::flip_vertical(&img.to_rgba8());
        let (width, height) = rgba.dimensions();
        let pixels = rgba.pixels().map(|p| p.0).collect();
        Self::from_rgba(width, height, pixels)
    }

    /// Wrap raw RGBA pixels, row-major from the bottom row
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel count does not match the dimensions
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<[u8; 4]>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 || pixels.len() != (width * height) as usize {
            return Err(TextureError::DecodeError(format!(
                "{} pixels do not fill a {width}x{height} image",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            filter: TextureFilter::Linear,
        })
    }

    /// Create a 1x1 texture of one color
    #[must_use]
    pub fn solid_color(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![color],
            filter: TextureFilter::Nearest,
        }
    }

    /// Create a 1x1 white texture, the default for missing maps
    #[must_use]
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255])
    }

    /// 8x8 checkerboard of two light grays, sampled with nearest filtering
    #[must_use]
    pub fn checkerboard() -> Self {
        let pixels = (0..64)
            .map(|i| {
                let (x, y) = (i % 8, i / 8);
                let value = if (x + y) % 2 == 0 { 0xFF } else { 0xCC };
                [value, value, value, 255]
            })
            .collect();
        Self {
            width: 8,
            height: 8,
            pixels,
            filter: TextureFilter::Nearest,
        }
    }

    /// Get texture width
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Get texture height
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Requested filter
    #[must_use]
    pub const fn filter(&self) -> TextureFilter {
        self.filter
    }

    /// Raw pixel data
    #[must_use]
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Nearest-texel lookup with repeat wrapping, as normalized RGBA
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let wrap = |t: f32, size: u32| -> usize {
            let t = t - t.floor();
            ((t * size as f32) as usize).min(size as usize - 1)
        };
        let x = wrap(uv.x, self.width);
        let y = wrap(uv.y, self.height);
        let [r, g, b, a] = self.pixels[y * self.width as usize + x];
        Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    }
}

/// A GPU texture with its view and sampler
#[derive(Debug)]
pub struct Texture {
    /// The GPU texture
    pub texture: wgpu::Texture,
    /// Texture view for binding
    pub view: wgpu::TextureView,
    /// Sampler for texture filtering
    pub sampler: wgpu::Sampler,
}

impl Texture {
    /// Upload a decoded image
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &TextureImage,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label,
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&image.pixels),
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let filter = match image.filter {
            TextureFilter::Linear => wgpu::FilterMode::Linear,
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_texture_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: filter,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }
}

/// Errors that can occur during texture loading
#[derive(Debug, Clone)]
pub enum TextureError {
    /// IO error reading file
    IoError(String),
    /// Error decoding image data
    DecodeError(String),
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::DecodeError(e) => write!(f, "Decode error: {e}"),
        }
    }
}

impl std::error::Error for TextureError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard_alternates() {
        let checker = TextureImage::checkerboard();
        let a = checker.sample(Vec2::new(0.01, 0.01));
        let b = checker.sample(Vec2::new(0.13, 0.01));
        assert_eq!(a, Vec4::ONE);
        assert!((b.x - 0.8).abs() < 1e-6);
        assert_eq!(checker.filter(), TextureFilter::Nearest);
    }

    #[test]
    fn test_sample_wraps() {
        let checker = TextureImage::checkerboard();
        assert_eq!(
            checker.sample(Vec2::new(1.01, 2.01)),
            checker.sample(Vec2::new(0.01, 0.01))
        );
        assert_eq!(
            checker.sample(Vec2::new(-0.99, 0.01)),
            checker.sample(Vec2::new(0.01, 0.01))
        );
    }

    #[test]
    fn test_from_rgba_rejects_wrong_size() {
        assert!(TextureImage::from_rgba(2, 2, vec![[0; 4]; 3]).is_err());
        assert!(TextureImage::from_rgba(0, 0, Vec::new()).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let err = TextureImage::from_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, TextureError::DecodeError(_)));
    }
}
