//! Batch constructors for groups of particles.
//!
//! Geometry is taken as given: nothing here checks that particles fit in
//! the arena. Callers that read user input validate it first.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wallsim_core::geometry::{self, Point2};

use crate::arena::ArenaBounds;
use crate::particle::Particle;

/// `count` evenly spaced values from `start` to `end` inclusive.
/// A single value sits at `start`.
fn spread(start: f64, end: f64, count: usize) -> impl Iterator<Item = f64> {
    let step = if count > 1 {
        (end - start) / (count - 1) as f64
    } else {
        0.0
    };
    (0..count).map(move |i| start + step * i as f64)
}

/// Particles evenly spaced along `from..=to`, all with the same heading and speed.
pub fn line(count: usize, from: Point2, to: Point2, angle_degrees: f64, speed: f64, radius: f64) -> Vec<Particle> {
    debug!("Spawning line batch of {} particles", count);
    spread(0.0, 1.0, count)
        .map(|t| {
            let p = geometry::lerp(from, to, t);
            Particle::from_heading(p.x, p.y, angle_degrees, speed, radius)
        })
        .collect()
}

/// Particles at one origin with headings evenly spaced from `start_angle` to `end_angle`.
pub fn fan(count: usize, origin: Point2, start_angle: f64, end_angle: f64, speed: f64, radius: f64) -> Vec<Particle> {
    debug!("Spawning fan batch of {} particles", count);
    spread(start_angle, end_angle, count)
        .map(|angle| Particle::from_heading(origin.x, origin.y, angle, speed, radius))
        .collect()
}

/// Particles at one origin and heading with speeds evenly spaced from `start_speed` to `end_speed`.
pub fn speed_sweep(
    count: usize,
    origin: Point2,
    angle_degrees: f64,
    start_speed: f64,
    end_speed: f64,
    radius: f64,
) -> Vec<Particle> {
    debug!("Spawning speed sweep of {} particles", count);
    spread(start_speed, end_speed, count)
        .map(|speed| Particle::from_heading(origin.x, origin.y, angle_degrees, speed, radius))
        .collect()
}

/// Uniformly random particles inside the arena, reproducible from `seed`.
///
/// Positions are inset by `radius`; headings cover the full circle.
pub fn random(count: usize, bounds: &ArenaBounds, speed: (f64, f64), radius: f64, seed: u64) -> Vec<Particle> {
    debug!("Spawning {} random particles (seed {})", count, seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let (min_speed, max_speed) = ordered(speed.0, speed.1);
    let (min_x, max_x) = inset(bounds.width, radius);
    let (min_y, max_y) = inset(bounds.height, radius);

    (0..count)
        .map(|_| {
            let x = rng.gen_range(min_x..=max_x);
            let y = rng.gen_range(min_y..=max_y);
            let angle = rng.gen_range(0.0..360.0);
            let speed = rng.gen_range(min_speed..=max_speed);
            Particle::from_heading(x, y, angle, speed, radius)
        })
        .collect()
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

// Range a disc centre may occupy along one axis. Collapses to the midpoint
// when the disc is wider than the axis.
fn inset(extent: f64, radius: f64) -> (f64, f64) {
    if extent - radius >= radius {
        (radius, extent - radius)
    } else {
        (extent / 2.0, extent / 2.0)
    }
}
