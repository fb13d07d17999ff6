//! Triangle scan conversion
//!
//! Triangles are clipped against the eye and near planes in clip space,
//! then the clipped polygon is fanned and sampled at pixel centers with
//! edge functions.

use glam::{Vec2, Vec3, Vec4};
use smallvec::SmallVec;

/// Clipped vertices keep at least this much `w`
const MIN_W: f32 = 1e-6;

/// A covered pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    /// Clip-space depth in `[0, 1]`
    pub depth: f32,
    /// Perspective-correct weights of the three source vertices
    pub barycentric: Vec3,
}

impl Fragment {
    /// Interpolate a per-vertex attribute
    pub fn interpolate<T>(&self, values: [T; 3]) -> T
    where
        T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T> + Copy,
    {
        values[0] * self.barycentric.x + values[1] * self.barycentric.y + values[2] * self.barycentric.z
    }
}

/// Which windings a pass draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaceCull {
    /// Draw both windings
    #[default]
    None,
    /// Skip triangles that are clockwise in normalized device coordinates
    Back,
}

#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    position: Vec4,
    /// Weights of the source triangle's vertices
    weights: Vec3,
}

impl ClipVertex {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            weights: self.weights.lerp(other.weights, t),
        }
    }
}

/// A triangle clipped by two planes has at most five corners
type Polygon = SmallVec<[ClipVertex; 8]>;

/// Sutherland-Hodgman against one plane; keeps `distance >= 0`
fn clip_polygon(polygon: &Polygon, distance: impl Fn(Vec4) -> f32) -> Polygon {
    let mut clipped = Polygon::new();
    for (i, &current) in polygon.iter().enumerate() {
        let next = polygon[(i + 1) % polygon.len()];
        let (d0, d1) = (distance(current.position), distance(next.position));
        if d0 >= 0.0 {
            clipped.push(current);
        }
        if (d0 >= 0.0) != (d1 >= 0.0) {
            clipped.push(current.lerp(next, d0 / (d0 - d1)));
        }
    }
    clipped
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Rasterize one clip-space triangle into a `width` x `height` target.
///
/// The parts behind the eye plane (`w <= 0`) or in front of the near plane
/// (`z < 0`) are clipped away. Fragments whose depth falls past the far
/// plane are dropped.
pub fn rasterize_triangle(clip: [Vec4; 3], width: u32, height: u32, cull: FaceCull, mut emit: impl FnMut(Fragment)) {
    let source: Polygon = clip
        .into_iter()
        .zip([Vec3::X, Vec3::Y, Vec3::Z])
        .map(|(position, weights)| ClipVertex { position, weights })
        .collect();
    let polygon = clip_polygon(&clip_polygon(&source, |p| p.w - MIN_W), |p| p.z);
    if polygon.len() < 3 {
        return;
    }

    for i in 1..polygon.len() - 1 {
        draw_triangle([polygon[0], polygon[i], polygon[i + 1]], width, height, cull, &mut emit);
    }
}

fn draw_triangle(
    vertices: [ClipVertex; 3],
    width: u32,
    height: u32,
    cull: FaceCull,
    emit: &mut impl FnMut(Fragment),
) {
    let ndc = vertices.map(|v| v.position.truncate() / v.position.w);
    let screen = ndc.map(|p| {
        Vec2::new(
            (p.x + 1.0) * 0.5 * width as f32,
            (1.0 - p.y) * 0.5 * height as f32,
        )
    });

    // Screen y points down, so counter-clockwise triangles have negative area
    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() <= f32::EPSILON || (cull == FaceCull::Back && area > 0.0) {
        return;
    }

    let min = screen[0].min(screen[1]).min(screen[2]);
    let max = screen[0].max(screen[1]).max(screen[2]);
    if max.x < 0.0 || max.y < 0.0 || min.x >= width as f32 || min.y >= height as f32 {
        return;
    }
    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil().min(width as f32) as u32).min(width - 1);
    let y1 = (max.y.ceil().min(height as f32) as u32).min(height - 1);

    let inverse_w = Vec3::new(
        1.0 / vertices[0].position.w,
        1.0 / vertices[1].position.w,
        1.0 / vertices[2].position.w,
    );

    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let weights = Vec3::new(
                edge(screen[1], screen[2], p),
                edge(screen[2], screen[0], p),
                edge(screen[0], screen[1], p),
            ) / area;
            if weights.min_element() < 0.0 {
                continue;
            }

            let depth = weights.dot(Vec3::new(ndc[0].z, ndc[1].z, ndc[2].z));
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }

            let corrected = weights * inverse_w;
            let local = corrected / corrected.element_sum();
            emit(Fragment {
                x,
                y,
                depth,
                barycentric: vertices[0].weights * local.x
                    + vertices[1].weights * local.y
                    + vertices[2].weights * local.z,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use glam::Mat4;

    fn collect(clip: [Vec4; 3], size: u32) -> Vec<Fragment> {
        collect_culled(clip, size, FaceCull::None)
    }

    fn collect_culled(clip: [Vec4; 3], size: u32, cull: FaceCull) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        rasterize_triangle(clip, size, size, cull, |f| fragments.push(f));
        fragments
    }

    fn full_screen(z: f32) -> [Vec4; 3] {
        [
            Vec4::new(-1.0, -1.0, z, 1.0),
            Vec4::new(3.0, -1.0, z, 1.0),
            Vec4::new(-1.0, 3.0, z, 1.0),
        ]
    }

    #[test]
    fn test_covers_every_pixel_once() {
        let fragments = collect(full_screen(0.5), 4);
        assert_eq!(fragments.len(), 16);
        assert!(fragments.iter().all(|f| f.depth == 0.5));
    }

    #[test]
    fn test_both_windings_are_drawn_without_culling() {
        let [a, b, c] = full_screen(0.5);
        assert_eq!(collect([a, c, b], 4).len(), 16);
    }

    #[test]
    fn test_back_faces_are_culled() {
        let [a, b, c] = full_screen(0.5);
        assert_eq!(collect_culled([a, b, c], 4, FaceCull::Back).len(), 16);
        assert!(collect_culled([a, c, b], 4, FaceCull::Back).is_empty());
    }

    #[test]
    fn test_rejects_depth_outside_range() {
        assert!(collect(full_screen(1.5), 4).is_empty());
        assert!(collect(full_screen(-0.1), 4).is_empty());
    }

    #[test]
    fn test_rejects_triangle_behind_eye() {
        let clip = full_screen(0.5).map(|v| Vec4::new(v.x, v.y, v.z, -1.0));
        assert!(collect(clip, 4).is_empty());
    }

    #[test]
    fn test_clips_triangle_crossing_eye_plane() {
        // Floor triangle one unit below an eye looking down -z, apex behind it
        let clip_from_view = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 10.0);
        let clip = [
            Vec3::new(-1.0, -1.0, -2.0),
            Vec3::new(1.0, -1.0, -2.0),
            Vec3::new(0.0, -1.0, 2.0),
        ]
        .map(|p| clip_from_view * p.extend(1.0));
        assert!(clip[2].w < 0.0);

        let fragments = collect(clip, 8);
        assert!(!fragments.is_empty());
        for fragment in &fragments {
            // The far edge projects to y = -0.5, the bottom quarter of the target
            assert!(fragment.y >= 6, "fragment at row {}", fragment.y);
            assert!((0.0..=1.0).contains(&fragment.depth));
            assert!((fragment.barycentric.element_sum() - 1.0).abs() < 1e-4);
            assert!(fragment.barycentric.min_element() >= -1e-4);
        }
    }

    #[test]
    fn test_top_row_is_positive_y() {
        // Triangle covering only the upper half of clip space
        let clip = [
            Vec4::new(-1.0, 0.0, 0.5, 1.0),
            Vec4::new(3.0, 0.0, 0.5, 1.0),
            Vec4::new(-1.0, 4.0, 0.5, 1.0),
        ];
        let fragments = collect(clip, 4);
        assert!(!fragments.is_empty());
        assert!(fragments.iter().all(|f| f.y < 2));
    }

    #[test]
    fn test_barycentric_sums_to_one() {
        let clip = [
            Vec4::new(-1.0, -1.0, 0.2, 1.0),
            Vec4::new(2.0, -2.0, 0.4, 2.0),
            Vec4::new(-3.0, 3.0, 0.6, 3.0),
        ];
        for fragment in collect(clip, 8) {
            assert!((fragment.barycentric.element_sum() - 1.0).abs() < 1e-5);
            let value = fragment.interpolate([1.0_f32, 2.0, 3.0]);
            assert!((1.0..=3.0).contains(&value));
        }
    }
}
