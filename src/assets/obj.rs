//! Wavefront OBJ parsing
//!
//! Produces non-indexed geometry: every face corner becomes its own vertex.
//! Faces are fan-triangulated. A new geometry starts whenever the object,
//! group or material changes and a face follows.

use smallvec::SmallVec;

use crate::assets::loader::AssetError;
use crate::renderer::mesh::{DEFAULT_NORMAL, DEFAULT_TEXCOORD};

/// One run of faces sharing object, group and material
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjGeometry {
    pub object: String,
    pub groups: Vec<String>,
    pub material: String,
    /// Flat `[x, y, z, ...]`
    pub positions: Vec<f32>,
    /// Flat `[u, v, ...]`, empty when no corner carries one. Corners
    /// without a texcoord get the default when others have one.
    pub texcoords: Vec<f32>,
    /// Flat `[x, y, z, ...]`, filled like `texcoords`
    pub normals: Vec<f32>,
    /// Flat `[r, g, b, ...]`, empty when the vertices carry none
    pub colors: Vec<f32>,
}

impl ObjGeometry {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Parsed OBJ file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjData {
    /// MTL libraries named by `mtllib`, in file order
    pub material_libs: Vec<String>,
    pub geometries: Vec<ObjGeometry>,
}

#[derive(Default)]
struct State {
    positions: Vec<[f32; 3]>,
    colors: Vec<Option<[f32; 3]>>,
    texcoords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
    object: String,
    groups: Vec<String>,
    material: String,
    current: Option<ObjGeometry>,
    data: ObjData,
}

impl State {
    fn new() -> Self {
        Self {
            groups: vec!["default".to_string()],
            material: "default".to_string(),
            ..Default::default()
        }
    }

    /// Close the running geometry; the next face opens a new one
    fn finish_geometry(&mut self) {
        if let Some(geometry) = self.current.take().filter(|g| !g.positions.is_empty()) {
            self.data.geometries.push(geometry);
        }
    }

    fn geometry(&mut self) -> &mut ObjGeometry {
        let (object, groups, material) = (&self.object, &self.groups, &self.material);
        self.current.get_or_insert_with(|| ObjGeometry {
            object: object.clone(),
            groups: groups.clone(),
            material: material.clone(),
            ..Default::default()
        })
    }

    fn add_corner(&mut self, corner: Corner) {
        let position = self.positions[corner.position];
        let color = self.colors[corner.position];
        let texcoord = corner.texcoord.map(|i| self.texcoords[i]);
        let normal = corner.normal.map(|i| self.normals[i]);

        let geometry = self.geometry();
        let vertex = geometry.vertex_count();
        geometry.positions.extend_from_slice(&position);
        if let Some(color) = color {
            geometry.colors.extend_from_slice(&color);
        }
        push_attribute(&mut geometry.texcoords, vertex, texcoord, DEFAULT_TEXCOORD);
        push_attribute(&mut geometry.normals, vertex, normal, DEFAULT_NORMAL);
    }
}

/// Append the attribute of vertex `vertex`, keeping `values` either empty or
/// one entry per vertex. Earlier vertices are backfilled with `default` when
/// the first value shows up late.
fn push_attribute<const N: usize>(values: &mut Vec<f32>, vertex: usize, value: Option<[f32; N]>, default: [f32; N]) {
    match value {
        Some(value) => {
            while values.len() < vertex * N {
                values.extend_from_slice(&default);
            }
            values.extend_from_slice(&value);
        }
        None if !values.is_empty() => values.extend_from_slice(&default),
        None => {}
    }
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

/// Parse OBJ source text
///
/// Unknown keywords are skipped with a warning.
///
/// # Errors
///
/// Returns [`AssetError::Parse`] with the 1-based line number for malformed
/// numbers and out-of-range face indices.
pub fn parse_obj(source: &str) -> Result<ObjData, AssetError> {
    let mut state = State::new();

    for (index, raw) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match keyword {
            "v" => {
                let values = parse_floats(rest, line_number)?;
                if values.len() < 3 {
                    return Err(parse_error(line_number, "vertex needs 3 coordinates"));
                }
                state.positions.push([values[0], values[1], values[2]]);
                state
                    .colors
                    .push((values.len() >= 6).then(|| [values[3], values[4], values[5]]));
            }
            "vt" => {
                let values = parse_floats(rest, line_number)?;
                if values.len() < 2 {
                    return Err(parse_error(line_number, "texcoord needs 2 coordinates"));
                }
                state.texcoords.push([values[0], values[1]]);
            }
            "vn" => {
                let values = parse_floats(rest, line_number)?;
                if values.len() < 3 {
                    return Err(parse_error(line_number, "normal needs 3 coordinates"));
                }
                state.normals.push([values[0], values[1], values[2]]);
            }
            "f" => {
                let corners = rest
                    .split_whitespace()
                    .map(|token| parse_corner(token, &state, line_number))
                    .collect::<Result<SmallVec<[Corner; 4]>, _>>()?;
                if corners.len() < 3 {
                    return Err(parse_error(line_number, "face needs at least 3 vertices"));
                }
                for i in 1..corners.len() - 1 {
                    for corner in [corners[0], corners[i], corners[i + 1]] {
                        state.add_corner(corner);
                    }
                }
            }
            "o" => {
                state.finish_geometry();
                state.object = rest.to_string();
            }
            "g" => {
                state.finish_geometry();
                state.groups = rest.split_whitespace().map(str::to_string).collect();
            }
            "usemtl" => {
                state.finish_geometry();
                state.material = rest.to_string();
            }
            "mtllib" => state.data.material_libs.push(rest.to_string()),
            "s" => {}
            _ => log::warn!("OBJ line {}: unhandled keyword '{}'", line_number, keyword),
        }
    }

    state.finish_geometry();
    Ok(state.data)
}

fn parse_error(line: usize, message: impl Into<String>) -> AssetError {
    AssetError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_floats(text: &str, line: usize) -> Result<SmallVec<[f32; 6]>, AssetError> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| parse_error(line, format!("invalid number '{}'", token)))
        })
        .collect()
}

fn parse_corner(token: &str, state: &State, line: usize) -> Result<Corner, AssetError> {
    let mut parts = token.split('/');
    let position = match parts.next() {
        Some(text) if !text.is_empty() => resolve_index(text, state.positions.len(), line)?,
        _ => return Err(parse_error(line, format!("face vertex '{}' has no position", token))),
    };
    let texcoord = match parts.next() {
        Some(text) if !text.is_empty() => Some(resolve_index(text, state.texcoords.len(), line)?),
        _ => None,
    };
    let normal = match parts.next() {
        Some(text) if !text.is_empty() => Some(resolve_index(text, state.normals.len(), line)?),
        _ => None,
    };
    Ok(Corner {
        position,
        texcoord,
        normal,
    })
}

/// Convert a 1-based or negative (relative to the end) OBJ index
fn resolve_index(text: &str, len: usize, line: usize) -> Result<usize, AssetError> {
    let value: i64 = text
        .parse()
        .map_err(|_| parse_error(line, format!("invalid index '{}'", text)))?;
    let resolved = if value < 0 { len as i64 + value } else { value - 1 };
    if value == 0 || resolved < 0 || resolved >= len as i64 {
        return Err(parse_error(
            line,
            format!("index {} out of range for {} elements", value, len),
        ));
    }
    Ok(resolved as usize)
}
