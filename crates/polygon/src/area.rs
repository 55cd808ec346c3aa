//! Polygon and triplet areas.
//!
//! Traced contours wind clockwise when seen from the light-facing side, so
//! every signed area here is clockwise-positive: the shoelace sum is negated.
//! Under that convention a convex vertex has a positive triplet area and
//! removing it shrinks the polygon by exactly that amount.

use glam::Vec2;

use crate::constants::EPSILON;

/// Signed area of a closed loop (clockwise-positive shoelace).
///
/// The loop is implicitly closed; do not repeat the first point.
pub fn polygon_signed_area(points: &[Vec2]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    -0.5 * sum
}

/// Shoelace term of the directed edge `p -> q`, already in the clockwise-positive sign.
#[inline]
pub fn shoelace_term(p: Vec2, q: Vec2) -> f32 {
    -0.5 * (p.x * q.y - q.x * p.y)
}

/// Signed area of the triangle `(prev, cur, next)`, clockwise-positive.
///
/// Positive for a convex vertex of a clockwise loop, negative for a concave one.
#[inline]
pub fn triplet_signed_area(prev: Vec2, cur: Vec2, next: Vec2) -> f32 {
    -0.5 * (cur - prev).perp_dot(next - prev)
}

/// Unsigned triplet area.
#[inline]
pub fn triplet_area(prev: Vec2, cur: Vec2, next: Vec2) -> f32 {
    triplet_signed_area(prev, cur, next).abs()
}

/// Whether `p` lies inside or on the boundary of triangle `(a, b, c)`.
///
/// Degenerate triangles contain nothing.
pub fn triangle_contains(a: Vec2, b: Vec2, c: Vec2, p: Vec2) -> bool {
    let twice_area = (b - a).perp_dot(c - a);
    if twice_area.abs() <= EPSILON {
        return false;
    }

    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);

    let has_neg = d1 < -EPSILON || d2 < -EPSILON || d3 < -EPSILON;
    let has_pos = d1 > EPSILON || d2 > EPSILON || d3 > EPSILON;

    !(has_neg && has_pos)
}
