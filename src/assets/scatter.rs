//! Random placement of model instances on the ground plane

use glam::{Vec2, Vec3};
use rand::Rng;

/// Attempts per requested position before giving up
const ATTEMPTS_PER_POSITION: usize = 64;

/// Pick up to `count` points on the `y = 0` plane inside
/// `[-extent.x / 2, extent.x / 2] x [-extent.y / 2, extent.y / 2]`, no two
/// closer than `min_distance`.
///
/// Returns fewer points when the area cannot fit them.
pub fn unique_positions(count: usize, extent: Vec2, min_distance: f32, rng: &mut impl Rng) -> Vec<Vec3> {
    let half = (extent * 0.5).abs();
    let min_distance_sq = min_distance * min_distance;
    let mut positions: Vec<Vec3> = Vec::with_capacity(count);

    for _ in 0..count * ATTEMPTS_PER_POSITION {
        if positions.len() == count {
            break;
        }
        let candidate = Vec3::new(sample(rng, half.x), 0.0, sample(rng, half.y));
        if positions
            .iter()
            .all(|p| p.distance_squared(candidate) >= min_distance_sq)
        {
            positions.push(candidate);
        }
    }

    if positions.len() < count {
        log::warn!(
            "Placed {} of {} positions with spacing {}",
            positions.len(),
            count,
            min_distance
        );
    }
    positions
}

fn sample(rng: &mut impl Rng, half: f32) -> f32 {
    if half > 0.0 { rng.gen_range(-half..=half) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_positions_respect_spacing_and_extent() {
        let mut rng = StdRng::seed_from_u64(7);
        let positions = unique_positions(20, Vec2::new(200.0, 200.0), 20.0, &mut rng);
        assert_eq!(positions.len(), 20);
        for (i, a) in positions.iter().enumerate() {
            assert_eq!(a.y, 0.0);
            assert!(a.x.abs() <= 100.0 && a.z.abs() <= 100.0);
            for b in &positions[i + 1..] {
                assert!(a.distance(*b) >= 20.0);
            }
        }
    }

    #[test]
    fn test_crowded_area_returns_fewer() {
        let mut rng = StdRng::seed_from_u64(1);
        let positions = unique_positions(10, Vec2::new(1.0, 1.0), 5.0, &mut rng);
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn test_same_seed_same_positions() {
        let a = unique_positions(5, Vec2::splat(50.0), 2.0, &mut StdRng::seed_from_u64(3));
        let b = unique_positions(5, Vec2::splat(50.0), 2.0, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
