//! OBJ model loading into the registry
//!
//! Reads the OBJ file, its MTL libraries and texture maps from paths
//! relative to the OBJ file, then registers one part per geometry.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::assets::Handle;
use crate::assets::mtl::parse_mtl;
use crate::assets::obj::{ObjGeometry, parse_obj};
use crate::renderer::mesh::{chunk2, chunk3};
use crate::renderer::{Material, MaterialDesc, Mesh, MeshBuilder, MeshError, PartId, Registry};

/// Errors from loading model files
#[derive(Debug)]
pub enum AssetError {
    /// File could not be read
    Io { path: PathBuf, message: String },
    /// Malformed OBJ or MTL text
    Parse { line: usize, message: String },
    /// Geometry rejected by the mesh builder
    Mesh(MeshError),
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "Failed to read {}: {}", path.display(), message),
            Self::Parse { line, message } => write!(f, "Parse error on line {}: {}", line, message),
            Self::Mesh(e) => write!(f, "Invalid mesh: {}", e),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<MeshError> for AssetError {
    fn from(e: MeshError) -> Self {
        Self::Mesh(e)
    }
}

fn read_text(path: &Path) -> Result<String, AssetError> {
    std::fs::read_to_string(path).map_err(|e| AssetError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load an OBJ model and register its parts.
///
/// A missing or malformed MTL library leaves its materials at the default,
/// a missing texture map becomes white, and a geometry the mesh builder
/// rejects is skipped. Each case is logged as a warning.
///
/// # Errors
///
/// Returns an error if the OBJ file itself cannot be read or parsed.
pub fn load_obj_model(path: impl AsRef<Path>, registry: &mut Registry) -> Result<Vec<PartId>, AssetError> {
    let path = path.as_ref();
    let data = parse_obj(&read_text(path)?).map_err(|e| match e {
        AssetError::Parse { line, message } => AssetError::Parse {
            line,
            message: format!("{}: {}", path.display(), message),
        },
        other => other,
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let model = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());

    let materials = load_materials(base, &model, &data.material_libs, registry);

    let mut parts = Vec::with_capacity(data.geometries.len());
    for (index, geometry) in data.geometries.iter().enumerate() {
        let material = match materials.get(&geometry.material) {
            Some(material) => material.clone(),
            None => registry.default_material(),
        };
        let name = format!("{}/{}#{}", model, geometry.material, index);
        match build_mesh(geometry) {
            Ok(mesh) => parts.push(registry.add_part(name, mesh, material)),
            Err(e) => log::warn!("Skipping part {}: {}", name, e),
        }
    }

    log::info!(
        "Loaded {} ({} parts, {} materials)",
        path.display(),
        parts.len(),
        materials.len()
    );
    Ok(parts)
}

fn load_materials(
    base: &Path,
    model: &str,
    libraries: &[String],
    registry: &mut Registry,
) -> FxHashMap<String, Handle<Material>> {
    let mut materials = FxHashMap::default();
    for library in libraries {
        let library_path = base.join(library);
        let descs = match read_text(&library_path).and_then(|text| parse_mtl(&text)) {
            Ok(descs) => descs,
            Err(e) => {
                log::warn!("Material library unavailable, using defaults: {}", e);
                continue;
            }
        };
        for (name, desc) in descs {
            let material = resolve_material(base, &desc, registry);
            let handle = registry.add_material(format!("{}/{}", model, name), material);
            materials.insert(name, handle);
        }
    }
    materials
}

fn resolve_material(base: &Path, desc: &MaterialDesc, registry: &mut Registry) -> Material {
    let mut map = |file: &Option<String>| match file {
        Some(file) => registry.texture_or_white(base.join(file)),
        None => registry.white_texture(),
    };
    let diffuse_map = map(&desc.diffuse_map);
    let specular_map = map(&desc.specular_map);
    Material::from_desc(desc, diffuse_map, specular_map)
}

fn build_mesh(geometry: &ObjGeometry) -> Result<Mesh, MeshError> {
    let count = geometry.vertex_count();
    let mut builder = MeshBuilder::from_flat_positions(&geometry.positions);
    if !geometry.texcoords.is_empty() {
        builder = builder.texcoords(chunk2(&geometry.texcoords));
    }
    if !geometry.normals.is_empty() {
        builder = builder.normals(chunk3(&geometry.normals));
    }
    // Colors only when every vertex has one
    if geometry.colors.len() == count * 3 {
        builder = builder.colors_rgb(chunk3(&geometry.colors));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::fs;

    const TRIANGLE_OBJ: &str = "\
mtllib tri.mtl
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
usemtl shiny
f 1/1/1 2/2/1 3/3/1
usemtl unknown
f 3/3/1 2/2/1 1/1/1
";

    fn write_checker(path: &Path) {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        image.save(path).unwrap();
    }

    #[test]
    fn test_loads_parts_with_materials_and_maps() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tri.obj"), TRIANGLE_OBJ).unwrap();
        fs::write(
            dir.path().join("tri.mtl"),
            "newmtl shiny\nKd 0.5 0.5 0.5\nNs 32\nmap_Kd red.png\nmap_Ns missing.png\n",
        )
        .unwrap();
        write_checker(&dir.path().join("red.png"));

        let mut registry = Registry::new();
        let parts = load_obj_model(dir.path().join("tri.obj"), &mut registry).unwrap();
        assert_eq!(parts.len(), 2);

        let shiny = registry.part(parts[0]).unwrap();
        assert_eq!(shiny.mesh.vertices().len(), 3);
        assert_eq!(shiny.material.diffuse, Vec3::splat(0.5));
        assert_eq!(shiny.material.shininess, 32.0);
        assert_eq!(shiny.material.diffuse_map.width(), 2);
        assert_eq!(shiny.material.specular_map, registry.white_texture());
        assert!(registry.material("tri/shiny").is_some());

        // Material absent from the library falls back to the default
        let unknown = registry.part(parts[1]).unwrap();
        assert_eq!(unknown.material, registry.default_material());
    }

    #[test]
    fn test_missing_mtl_uses_default_material() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tri.obj"), TRIANGLE_OBJ).unwrap();

        let mut registry = Registry::new();
        let parts = load_obj_model(dir.path().join("tri.obj"), &mut registry).unwrap();
        assert_eq!(parts.len(), 2);
        for id in parts {
            assert_eq!(registry.part(id).unwrap().material, registry.default_material());
        }
    }

    #[test]
    fn test_missing_obj_is_io_error() {
        let mut registry = Registry::new();
        let err = load_obj_model("no/such/model.obj", &mut registry).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.obj");
        fs::write(&path, "v 0 0\n").unwrap();

        let mut registry = Registry::new();
        match load_obj_model(&path, &mut registry) {
            Err(AssetError::Parse { line, message }) => {
                assert_eq!(line, 1);
                assert!(message.contains("bad.obj"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_vertex_colors_are_dropped() {
        let geometry = ObjGeometry {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            colors: vec![1.0, 0.0, 0.0],
            ..Default::default()
        };
        let mesh = build_mesh(&geometry).unwrap();
        assert_eq!(mesh.vertices()[0].color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mixed_corners_keep_the_part() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.obj");
        fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nvt 1 1\nf 1/1 2/1 3/1\nf 2 4 3\n",
        )
        .unwrap();

        let mut registry = Registry::new();
        let parts = load_obj_model(&path, &mut registry).unwrap();
        assert_eq!(parts.len(), 1);

        let vertices = registry.part(parts[0]).unwrap().mesh.vertices();
        assert_eq!(vertices.len(), 6);
        assert_eq!(vertices[0].texcoord, [1.0, 1.0]);
        assert_eq!(vertices[5].texcoord, [0.0, 0.0]);
    }
}
