//! Point-mass particles and the per-step update pipeline.

use wallsim_core::geometry::{self, Point2, Vector2};
use glam::DVec2;

use crate::arena::ArenaBounds;
use crate::collision::CollisionMode;
use crate::wall::Wall;

/// Reflected speeds below this are left as-is instead of renormalized.
pub const MIN_REFLECTED_SPEED: f64 = 1e-12;

/// Kinematic state of one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Point2,
    pub velocity: Vector2,
    pub radius: f64,
}

impl Particle {
    pub fn new(position: Point2, velocity: Vector2, radius: f64) -> Self {
        Self {
            position,
            velocity,
            radius,
        }
    }

    /// Build a particle from a heading in degrees and a speed.
    ///
    /// The y component is negated: the arena's y axis grows downward, so a
    /// heading of 90° moves up the screen.
    pub fn from_heading(x: f64, y: f64, angle_degrees: f64, speed: f64, radius: f64) -> Self {
        let angle = angle_degrees.to_radians();
        let velocity = DVec2::new(angle.cos(), -angle.sin()) * speed;
        Self::new(DVec2::new(x, y), velocity, radius)
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn speed(&self) -> f64 {
        geometry::length(self.velocity)
    }

    /// Advance this particle by `dt`.
    ///
    /// 1. Predict `p' = p + v·dt`.
    /// 2. Reflect-and-clamp `p'` against the arena, per axis.
    /// 3. For each wall in order that the detector reports hit from `p` to
    ///    `p'`, reflect `v` about the wall normal and rescale it to the speed
    ///    it had before this stage.
    /// 4. Commit. Without a wall hit the position is the clamped `p'`.
    ///    Otherwise the step is retaken from `p` with the reflected velocity
    ///    and clamped against the arena once more.
    ///
    /// Simultaneous hits are applied one after another in wall order.
    pub fn update(&mut self, dt: f64, bounds: &ArenaBounds, walls: &[Wall], mode: CollisionMode) {
        let start = self.position;
        let mut predicted = start + self.velocity * dt;
        bounds.reflect_and_clamp(&mut predicted, &mut self.velocity, self.radius);

        let speed = self.speed();
        let mut deflected = false;
        for wall in walls {
            if !mode.detect(self, start, predicted, wall) {
                continue;
            }
            let Some(normal) = wall.normal() else {
                continue;
            };
            self.velocity = reflect_preserving_speed(self.velocity, normal, speed);
            deflected = true;
        }

        if deflected {
            let mut committed = start + self.velocity * dt;
            bounds.reflect_and_clamp(&mut committed, &mut self.velocity, self.radius);
            self.position = committed;
        } else {
            self.position = predicted;
        }
    }
}

/// `v - 2(v·n)n`, rescaled to `speed` to cancel drift from repeated bounces.
fn reflect_preserving_speed(velocity: Vector2, normal: Vector2, speed: f64) -> Vector2 {
    let reflected = geometry::reflect(velocity, normal);
    let reflected_speed = geometry::length(reflected);
    if reflected_speed < MIN_REFLECTED_SPEED {
        return reflected;
    }
    reflected * (speed / reflected_speed)
}
