// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D polygon utilities on the floor plane
//!
//! Floor-plan points use `Point2 { x: world.x, y: world.z }`. With the world Y
//! axis pointing up, a positive [`signed_area`] means counter-clockwise when
//! looking down the +x/+y axes of the plan (not when looking down from the
//! ceiling, where handedness flips).

use nalgebra::{Point2, Vector2};

/// Vertex average of a point set
pub fn centroid(points: &[Point2<f64>]) -> Point2<f64> {
    if points.is_empty() {
        return Point2::origin();
    }
    let sum = points
        .iter()
        .fold(Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / points.len() as f64)
}

/// Shoelace area, positive for counter-clockwise order in plan coordinates
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area / 2.0
}

/// 2D cross product of (b - a) and (c - a)
#[inline]
pub fn cross(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Convex hull by angular sweep around the lowest point (Graham scan).
///
/// Returns the hull counter-clockwise in plan coordinates, starting at the
/// lowest (then leftmost) point. Collinear boundary points are dropped.
pub fn convex_hull(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    // Find bottom-most point (lowest Y, then leftmost X)
    let mut start_idx = 0;
    for (i, p) in points.iter().enumerate() {
        let s = &points[start_idx];
        if p.y < s.y || (p.y == s.y && p.x < s.x) {
            start_idx = i;
        }
    }
    let start = points[start_idx];

    let mut sorted: Vec<Point2<f64>> = points.iter().filter(|p| **p != start).copied().collect();

    // Sort by polar angle, nearer points first on ties so the scan drops them
    sorted.sort_by(|a, b| {
        let angle_a = (a.y - start.y).atan2(a.x - start.x);
        let angle_b = (b.y - start.y).atan2(b.x - start.x);
        angle_a.total_cmp(&angle_b).then_with(|| {
            let da = (a - start).norm_squared();
            let db = (b - start).norm_squared();
            da.total_cmp(&db)
        })
    });
    sorted.dedup();

    let mut hull = vec![start];
    for p in sorted {
        while hull.len() > 1 {
            let top = hull[hull.len() - 1];
            let second = hull[hull.len() - 2];
            if cross(&second, &top, &p) <= 1e-12 {
                hull.pop();
            } else {
                break;
            }
        }
        hull.push(p);
    }

    hull
}

/// Order points around their centroid by polar angle.
///
/// `clockwise` refers to plan coordinates (descending angle).
pub fn order_by_polar_angle(points: &[Point2<f64>], clockwise: bool) -> Vec<Point2<f64>> {
    let c = centroid(points);
    let mut ordered = points.to_vec();
    ordered.sort_by(|a, b| {
        let angle_a = (a.y - c.y).atan2(a.x - c.x);
        let angle_b = (b.y - c.y).atan2(b.x - c.x);
        let ord = angle_a.total_cmp(&angle_b);
        if clockwise {
            ord.reverse()
        } else {
            ord
        }
    });
    ordered
}

/// Closest point on segment `a`-`b` to `p`.
///
/// Returns the clamped parameter `t` in [0, 1] and the distance.
pub fn closest_point_on_segment(
    p: &Point2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
) -> (f64, f64) {
    let ab = b - a;
    let length_sq = ab.norm_squared();

    if length_sq < 1e-18 {
        return (0.0, (p - a).norm());
    }

    let t = ((p - a).dot(&ab) / length_sq).clamp(0.0, 1.0);
    let proj = a + ab * t;
    (t, (p - proj).norm())
}

/// Interior angle at `b` of the path `a` -> `b` -> `c`, in degrees [0, 180]
pub fn interior_angle_deg(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    let u = a - b;
    let v = c - b;
    let nu = u.norm();
    let nv = v.norm();
    if nu < 1e-12 || nv < 1e-12 {
        return 180.0;
    }
    (u.dot(&v) / (nu * nv)).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Heading change at `b` when walking `a` -> `b` -> `c`, in degrees [0, 180]
#[inline]
pub fn turning_angle_deg(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    180.0 - interior_angle_deg(a, b, c)
}

/// Remove consecutive (cyclic) points closer than `tolerance`, keeping the first
pub fn dedup_points(points: &[Point2<f64>], tolerance: f64) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |last| (p - last).norm() >= tolerance) {
            out.push(*p);
        }
    }
    while out.len() > 1 {
        let first = out[0];
        let last = out[out.len() - 1];
        if (first - last).norm() < tolerance {
            out.pop();
        } else {
            break;
        }
    }
    out
}

/// Total boundary length of a closed polygon
pub fn perimeter(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| (points[(i + 1) % n] - points[i]).norm()).sum()
}

/// Count points that are pairwise farther apart than `tolerance`
pub fn distinct_count(points: &[Point2<f64>], tolerance: f64) -> usize {
    let mut distinct: Vec<Point2<f64>> = Vec::new();
    for p in points {
        if distinct.iter().all(|q| (p - q).norm() >= tolerance) {
            distinct.push(*p);
        }
    }
    distinct.len()
}
