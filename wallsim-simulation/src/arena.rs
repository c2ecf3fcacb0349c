//! The rectangular arena `[0, width] × [0, height]`.

use wallsim_core::geometry::{clamp, Point2, Vector2};

/// Arena bounds, fixed for the lifetime of a simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub width: f64,
    pub height: f64,
}

impl ArenaBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Axis-aligned reflect-and-clamp of a disc of `radius` at `position`.
    ///
    /// Each axis is handled on its own. A disc touching or crossing a side
    /// while moving toward it has that velocity component negated, and the
    /// position is clamped to `[radius, extent - radius]`. Returns whether
    /// any component was reflected.
    pub fn reflect_and_clamp(&self, position: &mut Point2, velocity: &mut Vector2, radius: f64) -> bool {
        let bounced_x = reflect_axis(&mut position.x, &mut velocity.x, radius, self.width);
        let bounced_y = reflect_axis(&mut position.y, &mut velocity.y, radius, self.height);
        bounced_x || bounced_y
    }

    /// Whether the disc lies inside the arena, allowing `epsilon` of overlap.
    pub fn contains(&self, position: Point2, radius: f64, epsilon: f64) -> bool {
        position.x - radius >= -epsilon
            && position.x + radius <= self.width + epsilon
            && position.y - radius >= -epsilon
            && position.y + radius <= self.height + epsilon
    }
}

fn reflect_axis(p: &mut f64, v: &mut f64, radius: f64, extent: f64) -> bool {
    let low = *p - radius <= 0.0;
    let high = *p + radius >= extent;
    if !low && !high {
        return false;
    }

    // Contact counts as a hit (closed boundary), but only a component heading
    // out of the arena is reversed.
    let outward = (low && *v < 0.0) || (high && *v > 0.0);
    if outward {
        *v = -*v;
    }
    *p = clamp(*p, radius, extent - radius);
    outward
}
