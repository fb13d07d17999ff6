//! Mesh and vertex definitions
//!
//! Meshes are only created through [`MeshBuilder`], which validates the
//! attribute arrays and fills every missing attribute with a constant, so
//! whatever reaches a render pass is complete.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Normal used when the source has none
pub const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];
/// Texture coordinate used when the source has none
pub const DEFAULT_TEXCOORD: [f32; 2] = [0.0, 0.0];
/// Tangent used when it cannot be generated
pub const DEFAULT_TANGENT: [f32; 3] = [1.0, 0.0, 0.0];
/// Vertex color used when the source has none
pub const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Interleaved vertex with every attribute the shaders read
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    pub tangent: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // normal
        2 => Float32x2, // texcoord
        3 => Float32x3, // tangent
        4 => Float32x4, // color
    ];

    /// Get the vertex buffer layout for wgpu
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Errors raised while building a mesh
#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    /// A mesh needs at least one triangle
    Empty,
    /// An attribute array does not match the position count
    AttributeCount {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },
    /// Index count is not a multiple of three
    IncompleteTriangle(usize),
    /// An index points past the last vertex
    IndexOutOfBounds { index: u32, vertex_count: usize },
}

impl std::fmt::Display for MeshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "mesh has no triangles"),
            Self::AttributeCount {
                attribute,
                expected,
                found,
            } => write!(
                f,
                "attribute '{attribute}' has {found} vertices, expected {expected}"
            ),
            Self::IncompleteTriangle(count) => {
                write!(f, "{count} indices do not form whole triangles")
            }
            Self::IndexOutOfBounds {
                index,
                vertex_count,
            } => write!(f, "index {index} out of bounds for {vertex_count} vertices"),
        }
    }
}

impl std::error::Error for MeshError {}

/// Collects raw attribute arrays and normalizes them into a [`Mesh`]
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    texcoords: Option<Vec<[f32; 2]>>,
    tangents: Option<Vec<[f32; 3]>>,
    colors: Option<Vec<[f32; 4]>>,
    indices: Option<Vec<u32>>,
}

impl MeshBuilder {
    /// Start from vertex positions
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            ..Default::default()
        }
    }

    /// Start from a flat `[x, y, z, x, y, z, ...]` array, as OBJ parsing yields
    pub fn from_flat_positions(positions: &[f32]) -> Self {
        Self::new(chunk3(positions))
    }

    pub fn normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn texcoords(mut self, texcoords: Vec<[f32; 2]>) -> Self {
        self.texcoords = Some(texcoords);
        self
    }

    pub fn tangents(mut self, tangents: Vec<[f32; 3]>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    pub fn colors(mut self, colors: Vec<[f32; 4]>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// RGB vertex colors; alpha becomes 1
    pub fn colors_rgb(self, colors: Vec<[f32; 3]>) -> Self {
        self.colors(colors.into_iter().map(|[r, g, b]| [r, g, b, 1.0]).collect())
    }

    /// Triangle indices; without them the vertices are a plain triangle list
    pub fn indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Validate and normalize into an immutable mesh
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is empty, an attribute array has the
    /// wrong length, or the index list is malformed
    pub fn build(self) -> Result<Mesh, MeshError> {
        let count = self.positions.len();
        check_count("normal", self.normals.as_deref(), count)?;
        check_count("texcoord", self.texcoords.as_deref(), count)?;
        check_count("tangent", self.tangents.as_deref(), count)?;
        check_count("color", self.colors.as_deref(), count)?;

        let indices = self.indices.unwrap_or_else(|| (0..count as u32).collect());
        if indices.is_empty() {
            return Err(MeshError::Empty);
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::IncompleteTriangle(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= count) {
            return Err(MeshError::IndexOutOfBounds {
                index,
                vertex_count: count,
            });
        }

        let tangents = match (self.tangents, &self.texcoords, &self.normals) {
            (Some(tangents), _, _) => tangents,
            (None, Some(texcoords), Some(_)) => {
                generate_tangents(&self.positions, texcoords, &indices)
            }
            (None, _, _) => vec![DEFAULT_TANGENT; count],
        };

        let vertices = (0..count)
            .map(|i| Vertex {
                position: self.positions[i],
                normal: self.normals.as_ref().map_or(DEFAULT_NORMAL, |n| n[i]),
                texcoord: self.texcoords.as_ref().map_or(DEFAULT_TEXCOORD, |t| t[i]),
                tangent: tangents[i],
                color: self.colors.as_ref().map_or(DEFAULT_COLOR, |c| c[i]),
            })
            .collect();

        Ok(Mesh { vertices, indices })
    }
}

fn check_count<T>(attribute: &'static str, data: Option<&[T]>, expected: usize) -> Result<(), MeshError> {
    match data {
        Some(data) if data.len() != expected => Err(MeshError::AttributeCount {
            attribute,
            expected,
            found: data.len(),
        }),
        _ => Ok(()),
    }
}

/// Split a flat float array into triples, dropping a trailing remainder
pub(crate) fn chunk3(data: &[f32]) -> Vec<[f32; 3]> {
    data.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

/// Split a flat float array into pairs, dropping a trailing remainder
pub(crate) fn chunk2(data: &[f32]) -> Vec<[f32; 2]> {
    data.chunks_exact(2).map(|c| [c[0], c[1]]).collect()
}

/// Per-vertex tangents from triangle position and texcoord deltas.
///
/// Contributions of every triangle touching a vertex are summed; vertices
/// whose texcoords are degenerate get [`DEFAULT_TANGENT`].
pub fn generate_tangents(positions: &[[f32; 3]], texcoords: &[[f32; 2]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut sums = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let dp1 = Vec3::from(positions[b]) - Vec3::from(positions[a]);
        let dp2 = Vec3::from(positions[c]) - Vec3::from(positions[a]);
        let duv1 = Vec2::from(texcoords[b]) - Vec2::from(texcoords[a]);
        let duv2 = Vec2::from(texcoords[c]) - Vec2::from(texcoords[a]);

        let r = 1.0 / (duv1.x * duv2.y - duv1.y * duv2.x);
        let tangent = (dp1 * duv2.y - dp2 * duv1.y) * r;
        if tangent.is_finite() {
            for index in [a, b, c] {
                sums[index] += tangent;
            }
        }
    }

    sums.into_iter()
        .map(|t| {
            let t = t.normalize_or_zero();
            if t == Vec3::ZERO { DEFAULT_TANGENT } else { t.into() }
        })
        .collect()
}

/// An immutable triangle mesh with fully populated vertices
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Vertex data
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Triangle indices
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Get the number of indices
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Iterate triangles as position triples
    pub fn triangles(&self) -> impl Iterator<Item = [&Vertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                &self.vertices[t[0] as usize],
                &self.vertices[t[1] as usize],
                &self.vertices[t[2] as usize],
            ]
        })
    }

    /// Axis-aligned cube of edge `size` centered at origin
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        // (normal, u axis, v axis) per face
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut texcoords = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, u_axis, v_axis) in faces {
            let (n, u, v) = (Vec3::from(normal), Vec3::from(u_axis), Vec3::from(v_axis));
            let base = positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                positions.push(((n + u * su + v * sv) * h).into());
                normals.push(normal);
                texcoords.push([(su + 1.0) / 2.0, (sv + 1.0) / 2.0]);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self::from_parts(positions, normals, texcoords, indices)
    }

    /// Plane on the XZ axis at `y = 0`, facing +Y
    pub fn plane(width: f32, depth: f32) -> Self {
        let (hw, hd) = (width / 2.0, depth / 2.0);
        let positions = vec![
            [-hw, 0.0, hd],
            [hw, 0.0, hd],
            [hw, 0.0, -hd],
            [-hw, 0.0, -hd],
        ];
        let normals = vec![[0.0, 1.0, 0.0]; 4];
        let texcoords = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        Self::from_parts(positions, normals, texcoords, vec![0, 1, 2, 2, 3, 0])
    }

    /// Create a UV sphere
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut texcoords = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let y = radius * phi.cos();
            let ring_radius = radius * phi.sin();

            for segment in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
                let position = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());

                positions.push(position.into());
                normals.push(position.normalize_or_zero().into());
                texcoords.push([segment as f32 / segments as f32, 1.0 - ring as f32 / rings as f32]);
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                indices.extend_from_slice(&[current, current + 1, next]);
                indices.extend_from_slice(&[current + 1, next + 1, next]);
            }
        }

        Self::from_parts(positions, normals, texcoords, indices)
    }

    /// Build a procedural shape whose arrays are consistent by construction
    fn from_parts(
        positions: Vec<[f32; 3]>,
        normals: Vec<[f32; 3]>,
        texcoords: Vec<[f32; 2]>,
        indices: Vec<u32>,
    ) -> Self {
        let tangents = generate_tangents(&positions, &texcoords, &indices);
        let vertices = positions
            .iter()
            .zip(&normals)
            .zip(&texcoords)
            .zip(&tangents)
            .map(|(((&position, &normal), &texcoord), &tangent)| Vertex {
                position,
                normal,
                texcoord,
                tangent,
                color: DEFAULT_COLOR,
            })
            .collect();
        Self { vertices, indices }
    }
}
