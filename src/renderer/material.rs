//! Surface materials
//!
//! A `MaterialDesc` is what a loader found (every field optional); a
//! `Material` is the resolved value with every field set, shared by handle
//! between all parts that use it.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::assets::Handle;
use crate::renderer::texture::TextureImage;

/// Default diffuse color
pub const DEFAULT_DIFFUSE: Vec3 = Vec3::ONE;
/// Default ambient color
pub const DEFAULT_AMBIENT: Vec3 = Vec3::ZERO;
/// Default specular color
pub const DEFAULT_SPECULAR: Vec3 = Vec3::ONE;
/// Default emissive color
pub const DEFAULT_EMISSIVE: Vec3 = Vec3::ZERO;
/// Default specular exponent
pub const DEFAULT_SHININESS: f32 = 400.0;
/// Default opacity
pub const DEFAULT_OPACITY: f32 = 1.0;

/// Partially specified material, as read from an MTL file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialDesc {
    pub diffuse: Option<Vec3>,
    pub ambient: Option<Vec3>,
    pub specular: Option<Vec3>,
    pub emissive: Option<Vec3>,
    pub shininess: Option<f32>,
    pub opacity: Option<f32>,
    /// Diffuse map file name, relative to the OBJ file's directory
    pub diffuse_map: Option<String>,
    /// Specular map file name, relative to the OBJ file's directory
    pub specular_map: Option<String>,
}

/// Fully resolved material
#[derive(Debug, Clone)]
pub struct Material {
    pub diffuse: Vec3,
    pub ambient: Vec3,
    pub specular: Vec3,
    pub emissive: Vec3,
    pub shininess: f32,
    pub opacity: f32,
    pub diffuse_map: Handle<TextureImage>,
    pub specular_map: Handle<TextureImage>,
}

impl Material {
    /// The default material, using `white` for both maps
    pub fn new(white: Handle<TextureImage>) -> Self {
        Self {
            diffuse: DEFAULT_DIFFUSE,
            ambient: DEFAULT_AMBIENT,
            specular: DEFAULT_SPECULAR,
            emissive: DEFAULT_EMISSIVE,
            shininess: DEFAULT_SHININESS,
            opacity: DEFAULT_OPACITY,
            diffuse_map: white.clone(),
            specular_map: white,
        }
    }

    /// Merge a description over the default.
    ///
    /// Fields present in `desc` win; maps are passed already resolved, since
    /// turning file names into textures is the loader's job.
    pub fn from_desc(
        desc: &MaterialDesc,
        diffuse_map: Handle<TextureImage>,
        specular_map: Handle<TextureImage>,
    ) -> Self {
        Self {
            diffuse: desc.diffuse.unwrap_or(DEFAULT_DIFFUSE),
            ambient: desc.ambient.unwrap_or(DEFAULT_AMBIENT),
            specular: desc.specular.unwrap_or(DEFAULT_SPECULAR),
            emissive: desc.emissive.unwrap_or(DEFAULT_EMISSIVE),
            shininess: desc.shininess.unwrap_or(DEFAULT_SHININESS),
            opacity: desc.opacity.unwrap_or(DEFAULT_OPACITY),
            diffuse_map,
            specular_map,
        }
    }

    /// Flat colored material with no specular highlight
    pub fn diffuse(color: Vec3, white: Handle<TextureImage>) -> Self {
        Self {
            diffuse: color,
            specular: Vec3::ZERO,
            ..Self::new(white)
        }
    }

    /// Convert to uniform data
    pub fn to_uniform(&self) -> MaterialUniform {
        MaterialUniform {
            diffuse_opacity: self.diffuse.extend(self.opacity).into(),
            ambient: self.ambient.extend(0.0).into(),
            specular_shininess: self.specular.extend(self.shininess).into(),
            emissive: self.emissive.extend(0.0).into(),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Handle::new(TextureImage::white()))
    }
}

/// Material block of the scene shader, group 1 binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Diffuse RGB, opacity in w
    pub diffuse_opacity: [f32; 4],
    pub ambient: [f32; 4],
    /// Specular RGB, shininess in w
    pub specular_shininess: [f32; 4],
    pub emissive: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material() {
        let material = Material::default();
        assert_eq!(material.diffuse, Vec3::ONE);
        assert_eq!(material.ambient, Vec3::ZERO);
        assert_eq!(material.specular, Vec3::ONE);
        assert_eq!(material.emissive, Vec3::ZERO);
        assert_eq!(material.shininess, 400.0);
        assert_eq!(material.opacity, 1.0);
        assert_eq!(material.diffuse_map, material.specular_map);
        assert_eq!(material.diffuse_map.pixels(), &[[255, 255, 255, 255]]);
    }

    #[test]
    fn test_merge_keeps_given_fields() {
        let white = Handle::new(TextureImage::white());
        let desc = MaterialDesc {
            diffuse: Some(Vec3::new(0.5, 0.2, 0.1)),
            shininess: Some(25.0),
            ..Default::default()
        };

        let material = Material::from_desc(&desc, white.clone(), white);

        assert_eq!(material.diffuse, Vec3::new(0.5, 0.2, 0.1));
        assert_eq!(material.shininess, 25.0);
        assert_eq!(material.specular, DEFAULT_SPECULAR);
        assert_eq!(material.opacity, DEFAULT_OPACITY);
    }

    #[test]
    fn test_uniform_packing() {
        let uniform = Material::default().to_uniform();
        assert_eq!(uniform.diffuse_opacity, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniform.specular_shininess, [1.0, 1.0, 1.0, 400.0]);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 64);
    }
}
