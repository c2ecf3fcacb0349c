//! Static line-segment obstacles.

use log::warn;
use wallsim_core::geometry::{self, Point2, Vector2};
use glam::DVec2;

/// An immutable wall segment with its unit normal precomputed.
///
/// Walls are only read during a frame, so workers share them by reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    start: Point2,
    end: Point2,
    // None for a zero-length wall; reflection off it is a no-op.
    normal: Option<Vector2>,
}

impl Wall {
    pub fn new(start: Point2, end: Point2) -> Self {
        let d = end - start;
        let normal = geometry::normalize(DVec2::new(d.y, -d.x));
        if normal.is_none() {
            warn!(
                "Degenerate wall at ({}, {}); it will never deflect particles",
                start.x, start.y
            );
        }
        Self { start, end, normal }
    }

    pub fn from_coords(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(DVec2::new(x1, y1), DVec2::new(x2, y2))
    }

    pub fn start(&self) -> Point2 {
        self.start
    }

    pub fn end(&self) -> Point2 {
        self.end
    }

    /// `end - start`.
    pub fn direction(&self) -> Vector2 {
        self.end - self.start
    }

    /// Unit normal `normalize((D.y, -D.x))`, or `None` for a zero-length wall.
    pub fn normal(&self) -> Option<Vector2> {
        self.normal
    }

    pub fn is_degenerate(&self) -> bool {
        self.normal.is_none()
    }

    pub fn length(&self) -> f64 {
        geometry::length(self.direction())
    }

    /// `(x1, y1, x2, y2)` as the renderer draws it.
    pub fn endpoints(&self) -> (f64, f64, f64, f64) {
        (self.start.x, self.start.y, self.end.x, self.end.y)
    }
}
