// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Room outlines are convex or nearly so after simplification, so a fan from
//! the centroid is enough for floor and ceiling caps.

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::polygon::{centroid, distinct_count, signed_area};
use nalgebra::{Point2, Point3, Vector3};

/// Emit a horizontal cap at height `y` as a fan around the outline centroid.
///
/// With `up` the triangles face +Y (floor), otherwise -Y (ceiling). Winding
/// is fixed up from the outline's orientation, so callers may pass either
/// order. Returns the number of triangles emitted.
pub fn fan_from_centroid(
    outline: &[Point2<f64>],
    y: f64,
    up: bool,
    double_sided: bool,
    mesh: &mut Mesh,
) -> Result<usize> {
    let distinct = distinct_count(outline, 1e-6);
    if distinct < 3 {
        return Err(Error::InsufficientPoints(distinct));
    }

    // A plan-CCW outline lifted to XZ winds with a -Y normal
    let plan_ccw = signed_area(outline) > 0.0;
    let ordered: Vec<Point2<f64>> = if plan_ccw == up {
        outline.iter().rev().copied().collect()
    } else {
        outline.to_vec()
    };

    let mut emitted = emit_fan(&ordered, y, up, mesh);
    if double_sided {
        let reversed: Vec<Point2<f64>> = ordered.iter().rev().copied().collect();
        emitted += emit_fan(&reversed, y, !up, mesh);
    }
    Ok(emitted)
}

fn emit_fan(ordered: &[Point2<f64>], y: f64, up: bool, mesh: &mut Mesh) -> usize {
    let normal = if up { Vector3::y() } else { -Vector3::y() };
    let c = centroid(ordered);

    let center = mesh.add_vertex(Point3::new(c.x, y, c.y), normal);
    let first = center + 1;
    for p in ordered {
        mesh.add_vertex(Point3::new(p.x, y, p.y), normal);
    }

    let n = ordered.len() as u32;
    for i in 0..n {
        mesh.add_triangle(center, first + i, first + (i + 1) % n);
    }
    n as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ]
    }

    /// Geometric normal of triangle `t` from positions
    fn face_normal(mesh: &Mesh, t: usize) -> Vector3<f32> {
        let idx = &mesh.indices[t * 3..t * 3 + 3];
        let a = mesh.position(idx[0]).unwrap();
        let b = mesh.position(idx[1]).unwrap();
        let c = mesh.position(idx[2]).unwrap();
        (b - a).cross(&(c - a))
    }

    #[test]
    fn test_floor_faces_up_for_either_winding() {
        for outline in [square(), square().into_iter().rev().collect()] {
            let mut mesh = Mesh::new();
            let n = fan_from_centroid(&outline, 0.0, true, false, &mut mesh).unwrap();
            assert_eq!(n, 4);
            for t in 0..mesh.triangle_count() {
                assert!(face_normal(&mesh, t).y > 0.0);
            }
        }
    }

    #[test]
    fn test_ceiling_faces_down() {
        let mut mesh = Mesh::new();
        fan_from_centroid(&square(), 2.5, false, false, &mut mesh).unwrap();
        for t in 0..mesh.triangle_count() {
            assert!(face_normal(&mesh, t).y < 0.0);
        }
        assert_eq!(mesh.normals[1], -1.0);
    }

    #[test]
    fn test_double_sided_doubles_triangles() {
        let mut mesh = Mesh::new();
        let n = fan_from_centroid(&square(), 0.0, true, true, &mut mesh).unwrap();
        assert_eq!(n, 8);
        let up = (0..4).filter(|&t| face_normal(&mesh, t).y > 0.0).count();
        let down = (4..8).filter(|&t| face_normal(&mesh, t).y < 0.0).count();
        assert_eq!((up, down), (4, 4));
    }

    #[test]
    fn test_degenerate_outline_is_rejected() {
        let mut mesh = Mesh::new();
        let outline = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(1.0, 0.0)];
        assert_eq!(
            fan_from_centroid(&outline, 0.0, true, false, &mut mesh),
            Err(Error::InsufficientPoints(2))
        );
        assert!(mesh.is_empty());
    }
}
