//! Polygon measurements over integer boundary points.
//!
//! Arc length and the convex hull come from `imageproc::geometry`; the
//! shoelace area and polygon moments are computed here.

use glam::{DVec2, IVec2};
use imageproc::geometry::{arc_length, convex_hull as graham_hull};
use imageproc::point::Point;

/// Signed shoelace area (positive for counter-clockwise in y-up axes).
pub fn signed_area(points: &[IVec2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = closed_edges(points)
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice as f64 / 2.0
}

/// Length of the closed polyline through `points`.
pub fn closed_arc_length(points: &[IVec2]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    arc_length(&to_points(points), true)
}

/// First-order polygon moments; `None` when the enclosed area is zero.
pub fn polygon_centroid(points: &[IVec2]) -> Option<DVec2> {
    if points.len() < 3 {
        return None;
    }
    let mut m00 = 0.0;
    let mut m10 = 0.0;
    let mut m01 = 0.0;
    for (a, b) in closed_edges(points) {
        let (a, b) = (a.as_dvec2(), b.as_dvec2());
        let cross = a.x * b.y - b.x * a.y;
        m00 += cross;
        m10 += (a.x + b.x) * cross;
        m01 += (a.y + b.y) * cross;
    }
    m00 /= 2.0;
    if m00.abs() < f64::EPSILON {
        return None;
    }
    Some(DVec2::new(m10 / (6.0 * m00), m01 / (6.0 * m00)))
}

/// Convex hull of the distinct points. Fewer than three distinct points are
/// returned as they are.
pub fn convex_hull(points: &[IVec2]) -> Vec<IVec2> {
    let mut distinct = points.to_vec();
    distinct.sort_by(|a, b| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));
    distinct.dedup();
    if distinct.len() < 3 {
        return distinct;
    }
    graham_hull(to_points(&distinct).as_slice())
        .into_iter()
        .map(|p| IVec2::new(p.x, p.y))
        .collect()
}

fn to_points(points: &[IVec2]) -> Vec<Point<i32>> {
    points.iter().map(|p| Point::new(p.x, p.y)).collect()
}

fn closed_edges(points: &[IVec2]) -> impl Iterator<Item = (IVec2, IVec2)> + '_ {
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(&a, &b)| (a, b))
}
