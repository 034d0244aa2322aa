//! Spawn placement for new stars
//!
//! Stars are scattered uniformly over concentric spherical shells. Every
//! `SHELL_CAPACITY` stars the shell moves outward by `SHELL_THICKNESS`, which
//! keeps the visual density roughly constant as the population grows.

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use std::f64::consts::PI;
use tracing::warn;

use crate::types::Result;

/// Stars per shell before the next shell starts
pub const SHELL_CAPACITY: u64 = 350;

/// Radial thickness of one shell
pub const SHELL_THICKNESS: f64 = 400.0;

/// Inner radius of the first shell
pub const INNER_RADIUS: f64 = 200.0;

/// Candidates tried before a colliding coordinate is accepted anyway
pub const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpawnPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SpawnPoint {
    pub fn radius(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Inner and outer radius of the shell for a population of `count` stars
pub fn shell_bounds(count: u64) -> (f64, f64) {
    let shell = (count / SHELL_CAPACITY) as f64;
    let min = INNER_RADIUS + shell * SHELL_THICKNESS;
    (min, min + SHELL_THICKNESS)
}

/// Draw one coordinate in the current shell.
///
/// Direction uses inverse-transform sampling (`θ = 2πU₁`, `φ = acos(2U₂ − 1)`)
/// so points are uniform over the sphere rather than bunched at the poles.
/// Each axis is rounded to one decimal.
pub fn spawn_coordinate<R: Rng + ?Sized>(count: u64, rng: &mut R) -> SpawnPoint {
    let (min, max) = shell_bounds(count);
    let r = rng.gen_range(min..=max);

    let theta = 2.0 * PI * rng.gen::<f64>();
    let phi = (2.0 * rng.gen::<f64>() - 1.0).acos();

    SpawnPoint {
        x: round1(r * phi.sin() * theta.cos()),
        y: round1(r * phi.sin() * theta.sin()),
        z: round1(r * phi.cos()),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Lookup of already taken coordinates
#[async_trait]
pub trait Occupancy: Send + Sync {
    async fn is_occupied(&self, point: SpawnPoint) -> Result<bool>;
}

/// Pick a coordinate that no existing star occupies.
///
/// After `MAX_ATTEMPTS` collisions the last candidate is returned anyway;
/// a duplicate coordinate is preferable to failing star creation.
pub async fn allocate_spawn_point<R, O>(count: u64, rng: &mut R, occupancy: &O) -> Result<SpawnPoint>
where
    R: Rng + Send + ?Sized,
    O: Occupancy + ?Sized,
{
    let mut candidate = spawn_coordinate(count, rng);

    for attempt in 1..=MAX_ATTEMPTS {
        if !occupancy.is_occupied(candidate).await? {
            return Ok(candidate);
        }
        if attempt == MAX_ATTEMPTS {
            break;
        }
        candidate = spawn_coordinate(count, rng);
    }

    warn!(
        "No free spawn coordinate after {} attempts, accepting ({}, {}, {})",
        MAX_ATTEMPTS, candidate.x, candidate.y, candidate.z
    );
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // rounding each axis to 0.1 moves the radius by at most ~0.087
    const ROUNDING_SLACK: f64 = 0.1;

    #[test]
    fn test_shell_bounds() {
        assert_eq!(shell_bounds(0), (200.0, 600.0));
        assert_eq!(shell_bounds(349), (200.0, 600.0));
        assert_eq!(shell_bounds(350), (600.0, 1000.0));
        assert_eq!(shell_bounds(1200), (1400.0, 1800.0));
    }

    #[test]
    fn test_radius_within_shell() {
        let mut rng = StdRng::seed_from_u64(7);
        for count in [0u64, 10, 349, 350, 700, 5000] {
            let (min, max) = shell_bounds(count);
            for _ in 0..500 {
                let r = spawn_coordinate(count, &mut rng).radius();
                assert!(r >= min - ROUNDING_SLACK && r <= max + ROUNDING_SLACK, "r={r}");
            }
        }
    }

    #[test]
    fn test_one_decimal_rounding() {
        let mut rng = StdRng::seed_from_u64(42);
        let p = spawn_coordinate(0, &mut rng);
        for v in [p.x, p.y, p.z] {
            assert!(((v * 10.0).round() - v * 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let a = spawn_coordinate(12, &mut StdRng::seed_from_u64(3));
        let b = spawn_coordinate(12, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_directions_cover_both_hemispheres() {
        let mut rng = StdRng::seed_from_u64(11);
        let points: Vec<_> = (0..400).map(|_| spawn_coordinate(0, &mut rng)).collect();
        let north = points.iter().filter(|p| p.z > 0.0).count();
        assert!(north > 120 && north < 280, "north={north}");
    }

    struct AlwaysTaken(AtomicUsize);

    #[async_trait]
    impl Occupancy for AlwaysTaken {
        async fn is_occupied(&self, _point: SpawnPoint) -> Result<bool> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    struct TakenOnce(AtomicUsize);

    #[async_trait]
    impl Occupancy for TakenOnce {
        async fn is_occupied(&self, _point: SpawnPoint) -> Result<bool> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) == 0)
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let occupancy = AlwaysTaken(AtomicUsize::new(0));
        let mut rng = StdRng::seed_from_u64(1);
        let point = allocate_spawn_point(0, &mut rng, &occupancy).await.unwrap();
        assert_eq!(occupancy.0.load(Ordering::SeqCst), MAX_ATTEMPTS);
        assert!(point.radius() <= 600.0 + ROUNDING_SLACK);
    }

    #[tokio::test]
    async fn test_retries_on_collision() {
        let occupancy = TakenOnce(AtomicUsize::new(0));
        let mut rng = StdRng::seed_from_u64(5);
        let first = spawn_coordinate(0, &mut StdRng::seed_from_u64(5));
        let point = allocate_spawn_point(0, &mut rng, &occupancy).await.unwrap();
        assert_eq!(occupancy.0.load(Ordering::SeqCst), 2);
        assert_ne!(point, first);
    }
}
