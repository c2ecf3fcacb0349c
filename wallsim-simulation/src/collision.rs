//! Particle-versus-wall collision tests.
//!
//! Two detectors are provided. The point test only looks at the predicted
//! end-of-step position, so a fast particle can tunnel through a wall in one
//! step. The swept test samples the straight path at fixed parametric steps.
//! A simulation picks one at construction and uses it for every particle.

use wallsim_core::geometry::{self, Point2};

use crate::particle::Particle;
use crate::wall::Wall;

/// Distance from `point` to the closest point on the wall segment.
///
/// The projection parameter is clamped to `[0, 1]`, so points beyond the
/// ends measure to the endpoint rather than the infinite line.
pub fn segment_point_distance(wall: &Wall, point: Point2) -> f64 {
    let closest = geometry::project_onto_segment(wall.start(), wall.end(), point);
    geometry::length(point - closest)
}

/// Point test: the disc at `candidate` touches or overlaps the wall.
pub fn collides(particle: &Particle, candidate: Point2, wall: &Wall) -> bool {
    segment_point_distance(wall, candidate) <= particle.radius
}

/// Swept test: any of `samples + 1` evenly spaced points on `from..to`
/// (both ends included) passes the point test.
pub fn collides_swept(particle: &Particle, from: Point2, to: Point2, wall: &Wall, samples: u32) -> bool {
    let samples = samples.max(1);
    (0..=samples).any(|k| {
        let t = f64::from(k) / f64::from(samples);
        collides(particle, geometry::lerp(from, to, t), wall)
    })
}

/// Which detector a simulation uses. Fixed per simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionMode {
    /// End-of-step position only.
    #[default]
    Point,
    /// Path sampled at `t = k / samples` for `k = 0..=samples`.
    Swept { samples: u32 },
}

impl CollisionMode {
    pub const DEFAULT_SWEEP_SAMPLES: u32 = 10;

    /// Swept detection at `t = 0, 0.1, ..., 1.0`.
    pub fn swept() -> Self {
        CollisionMode::Swept {
            samples: Self::DEFAULT_SWEEP_SAMPLES,
        }
    }

    /// Test the step `from -> to` of `particle` against `wall`.
    pub fn detect(&self, particle: &Particle, from: Point2, to: Point2, wall: &Wall) -> bool {
        match *self {
            CollisionMode::Point => collides(particle, to, wall),
            CollisionMode::Swept { samples } => collides_swept(particle, from, to, wall, samples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn disc(radius: f64) -> Particle {
        Particle::new(DVec2::ZERO, DVec2::ZERO, radius)
    }

    #[test]
    fn distance_to_segment_interior_and_ends() {
        let wall = Wall::from_coords(50.0, 0.0, 50.0, 100.0);
        assert_eq!(segment_point_distance(&wall, DVec2::new(60.0, 50.0)), 10.0);
        assert_eq!(segment_point_distance(&wall, DVec2::new(50.0, 140.0)), 40.0);
        let d = segment_point_distance(&wall, DVec2::new(53.0, -4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn contact_at_exactly_radius_counts() {
        let wall = Wall::from_coords(0.0, 0.0, 100.0, 0.0);
        assert!(collides(&disc(5.0), DVec2::new(40.0, 5.0), &wall));
        assert!(!collides(&disc(5.0), DVec2::new(40.0, 5.0001), &wall));
    }

    #[test]
    fn extension_of_the_wall_does_not_collide() {
        let wall = Wall::from_coords(0.0, 0.0, 10.0, 0.0);
        // On the infinite line but 20 units past the end.
        assert!(!collides(&disc(5.0), DVec2::new(30.0, 0.0), &wall));
    }

    #[test]
    fn point_test_tunnels_where_sweep_does_not() {
        let wall = Wall::from_coords(50.0, 0.0, 50.0, 100.0);
        let p = disc(2.0);
        let from = DVec2::new(10.0, 50.0);
        let to = DVec2::new(90.0, 50.0);

        assert!(!CollisionMode::Point.detect(&p, from, to, &wall));
        assert!(CollisionMode::swept().detect(&p, from, to, &wall));
    }

    #[test]
    fn sweep_includes_both_endpoints() {
        let wall = Wall::from_coords(0.0, 0.0, 0.0, 10.0);
        let p = disc(1.0);
        assert!(collides_swept(&p, DVec2::new(0.5, 5.0), DVec2::new(80.0, 5.0), &wall, 10));
        assert!(collides_swept(&p, DVec2::new(80.0, 5.0), DVec2::new(0.5, 5.0), &wall, 10));
        // Zero samples still checks the two ends.
        assert!(collides_swept(&p, DVec2::new(80.0, 5.0), DVec2::new(0.5, 5.0), &wall, 0));
    }

    #[test]
    fn default_mode_is_point() {
        assert_eq!(CollisionMode::default(), CollisionMode::Point);
        assert_eq!(CollisionMode::swept(), CollisionMode::Swept { samples: 10 });
    }
}
