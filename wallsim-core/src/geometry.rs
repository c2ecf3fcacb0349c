//! Vector helpers shared by all collision math.
//!
//! Thin wrappers over `glam::DVec2` so the call sites read like the
//! formulas they implement, plus the guards glam leaves to the caller.

use glam::DVec2;

/// A position in arena space. Y grows downward (screen convention).
pub type Point2 = DVec2;
/// A displacement or velocity in arena space.
pub type Vector2 = DVec2;

/// Lengths at or below this are treated as zero by [`normalize`].
pub const NORMALIZE_EPSILON: f64 = 1e-12;

#[inline]
pub fn dot(a: Vector2, b: Vector2) -> f64 {
    a.dot(b)
}

#[inline]
pub fn length(v: Vector2) -> f64 {
    v.length()
}

/// Unit vector in the direction of `v`, or `None` for a (near) zero vector.
#[inline]
pub fn normalize(v: Vector2) -> Option<Vector2> {
    let len = length(v);
    if len <= NORMALIZE_EPSILON || !len.is_finite() {
        None
    } else {
        Some(v / len)
    }
}

/// Clamp `x` into `[lo, hi]`.
///
/// Unlike `f64::clamp` this never panics: when `lo > hi` (an arena
/// narrower than a particle) the result is `hi`.
#[inline]
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Parameter `t` in `[0, 1]` of the point on segment `start..end` closest to `point`.
///
/// A degenerate segment yields `0.0`, i.e. `start`.
pub fn segment_param(start: Point2, end: Point2, point: Point2) -> f64 {
    let d = end - start;
    let len_sq = dot(d, d);
    if len_sq <= NORMALIZE_EPSILON * NORMALIZE_EPSILON {
        return 0.0;
    }
    clamp(dot(point - start, d) / len_sq, 0.0, 1.0)
}

/// Closest point to `point` on the segment (not the infinite line).
pub fn project_onto_segment(start: Point2, end: Point2, point: Point2) -> Point2 {
    start + (end - start) * segment_param(start, end, point)
}

/// Mirror `v` about the line with unit normal `n`: `v - 2(v·n)n`.
#[inline]
pub fn reflect(v: Vector2, n: Vector2) -> Vector2 {
    v - 2.0 * dot(v, n) * n
}

/// Linear interpolation between two points.
#[inline]
pub fn lerp(a: Point2, b: Point2, t: f64) -> Point2 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_guards_zero_vector() {
        assert!(normalize(DVec2::ZERO).is_none());
        assert!(normalize(DVec2::new(1e-13, 0.0)).is_none());
        let n = normalize(DVec2::new(3.0, 4.0)).unwrap();
        assert!((n - DVec2::new(0.6, 0.8)).length() < 1e-12);
    }

    #[test]
    fn clamp_tolerates_inverted_range() {
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp(11.0, 0.0, 10.0), 10.0);
        assert_eq!(clamp(5.0, 8.0, 2.0), 2.0);
    }

    #[test]
    fn projection_is_confined_to_segment() {
        let a = DVec2::new(0.0, 0.0);
        let b = DVec2::new(10.0, 0.0);
        assert_eq!(project_onto_segment(a, b, DVec2::new(5.0, 3.0)), DVec2::new(5.0, 0.0));
        // Beyond the end the closest point is the endpoint, not the line extension.
        assert_eq!(project_onto_segment(a, b, DVec2::new(15.0, 3.0)), b);
        assert_eq!(project_onto_segment(a, b, DVec2::new(-4.0, -1.0)), a);
    }

    #[test]
    fn degenerate_segment_projects_to_start() {
        let a = DVec2::new(2.0, 2.0);
        assert_eq!(segment_param(a, a, DVec2::new(9.0, 9.0)), 0.0);
        assert_eq!(project_onto_segment(a, a, DVec2::new(9.0, 9.0)), a);
    }

    #[test]
    fn reflect_about_vertical_line_flips_x() {
        let v = reflect(DVec2::new(20.0, 3.0), DVec2::new(1.0, 0.0));
        assert_eq!(v, DVec2::new(-20.0, 3.0));
    }

    proptest! {
        #[test]
        fn reflection_preserves_length(
            vx in -1e3f64..1e3, vy in -1e3f64..1e3,
            nx in -1.0f64..1.0, ny in -1.0f64..1.0,
        ) {
            prop_assume!(nx.abs() + ny.abs() > 1e-3);
            let n = normalize(DVec2::new(nx, ny)).unwrap();
            let v = DVec2::new(vx, vy);
            let r = reflect(v, n);
            prop_assert!((length(r) - length(v)).abs() <= 1e-9 * (1.0 + length(v)));
        }

        #[test]
        fn segment_param_stays_in_unit_range(
            px in -100.0f64..100.0, py in -100.0f64..100.0,
            bx in -100.0f64..100.0, by in -100.0f64..100.0,
        ) {
            let t = segment_param(DVec2::ZERO, DVec2::new(bx, by), DVec2::new(px, py));
            prop_assert!((0.0..=1.0).contains(&t));
        }
    }
}
