//! Geometry and material registry
//!
//! Owns every renderable part. Loading fills the registry before the first
//! frame; afterwards render passes only read it, apart from the GPU backend
//! recording where it uploaded each part.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::assets::Handle;
use crate::renderer::material::Material;
use crate::renderer::mesh::Mesh;
use crate::renderer::texture::{TextureError, TextureImage};

/// Index of a part in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(pub(crate) usize);

impl PartId {
    /// Position in the registry
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Slot of a part's vertex and index buffers in the GPU renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMeshHandle(pub(crate) usize);

/// One drawable: a mesh with its material and base texture
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub mesh: Mesh,
    pub material: Handle<Material>,
    /// Texture multiplied by the instance color (white for loaded models)
    pub texture: Handle<TextureImage>,
    /// Set once the GPU renderer has uploaded the mesh
    pub gpu: Option<GpuMeshHandle>,
}

/// Owner of all parts, shared materials and cached textures
#[derive(Debug)]
pub struct Registry {
    parts: Vec<Part>,
    materials: FxHashMap<String, Handle<Material>>,
    textures: FxHashMap<PathBuf, Handle<TextureImage>>,
    white: Handle<TextureImage>,
    default_material: Handle<Material>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        let white = Handle::new(TextureImage::white());
        let default_material = Handle::new(Material::new(white.clone()));
        Self {
            parts: Vec::new(),
            materials: FxHashMap::default(),
            textures: FxHashMap::default(),
            white,
            default_material,
        }
    }

    /// The shared 1x1 white texture
    pub fn white_texture(&self) -> Handle<TextureImage> {
        self.white.clone()
    }

    /// The shared default material
    pub fn default_material(&self) -> Handle<Material> {
        self.default_material.clone()
    }

    /// Register a part with a white base texture
    pub fn add_part(&mut self, name: impl Into<String>, mesh: Mesh, material: Handle<Material>) -> PartId {
        let texture = self.white_texture();
        self.add_textured_part(name, mesh, material, texture)
    }

    /// Register a part with its own base texture
    pub fn add_textured_part(
        &mut self,
        name: impl Into<String>,
        mesh: Mesh,
        material: Handle<Material>,
        texture: Handle<TextureImage>,
    ) -> PartId {
        let id = PartId(self.parts.len());
        let name = name.into();
        log::debug!("Registered part '{}' ({} indices)", name, mesh.index_count());
        self.parts.push(Part {
            name,
            mesh,
            material,
            texture,
            gpu: None,
        });
        id
    }

    /// Look up a part
    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id.0)
    }

    pub(crate) fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.get_mut(id.0)
    }

    /// Iterate parts with their ids
    pub fn parts(&self) -> impl Iterator<Item = (PartId, &Part)> {
        self.parts.iter().enumerate().map(|(i, part)| (PartId(i), part))
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether no part is registered
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Store a named material, replacing any previous one of that name
    pub fn add_material(&mut self, name: impl Into<String>, material: Material) -> Handle<Material> {
        let handle = Handle::new(material);
        self.materials.insert(name.into(), handle.clone());
        handle
    }

    /// Look up a named material
    pub fn material(&self, name: &str) -> Option<Handle<Material>> {
        self.materials.get(name).cloned()
    }

    /// Load a texture once per path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded. Failures are
    /// not cached.
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<Handle<TextureImage>, TextureError> {
        let path = path.as_ref();
        if let Some(handle) = self.textures.get(path) {
            return Ok(handle.clone());
        }
        let handle = Handle::new(TextureImage::from_path(path)?);
        log::debug!(
            "Loaded texture {} ({}x{})",
            path.display(),
            handle.width(),
            handle.height()
        );
        self.textures.insert(path.to_path_buf(), handle.clone());
        Ok(handle)
    }

    /// Load a texture, falling back to white when it cannot be loaded
    pub fn texture_or_white(&mut self, path: impl AsRef<Path>) -> Handle<TextureImage> {
        let path = path.as_ref();
        match self.load_texture(path) {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Texture {} unavailable, using white: {}", path.display(), e);
                self.white_texture()
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path) {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_parts_get_sequential_ids() {
        let mut registry = Registry::new();
        let material = registry.default_material();
        let a = registry.add_part("a", Mesh::cube(1.0), material.clone());
        let b = registry.add_part("b", Mesh::plane(1.0, 1.0), material);

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(registry.part(b).unwrap().name, "b");
        assert!(registry.part(b).unwrap().gpu.is_none());

        // Held by the registry, both parts and this local
        let shared = registry.default_material();
        assert_eq!(shared.share_count(), 4);
    }

    #[test]
    fn test_textures_load_once_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.png");
        write_png(&path);

        let mut registry = Registry::new();
        let first = registry.load_texture(&path).unwrap();
        let second = registry.load_texture(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.width(), 2);
    }

    #[test]
    fn test_missing_texture_falls_back_to_white() {
        let mut registry = Registry::new();
        let handle = registry.texture_or_white("does/not/exist.png");
        assert_eq!(handle, registry.white_texture());
        assert!(registry.load_texture("does/not/exist.png").is_err());
    }

    #[test]
    fn test_named_materials() {
        let mut registry = Registry::new();
        let handle = registry.add_material("red", Material::default());
        assert_eq!(registry.material("red"), Some(handle));
        assert!(registry.material("blue").is_none());
    }
}
