// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Indexed triangle mesh with flat f32 buffers, ready for export.
///
/// Every vertex owns one position triple and one normal triple.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex and return its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions
            .extend_from_slice(&[position.x as f32, position.y as f32, position.z as f32]);
        self.normals
            .extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
        index
    }

    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    /// Add a planar quad as two triangles sharing four fresh vertices.
    ///
    /// Corners are expected in counter-clockwise order when viewed from the
    /// side `normal` points to.
    pub fn add_quad(&mut self, corners: [Point3<f64>; 4], normal: Vector3<f64>) {
        let base = self.add_vertex(corners[0], normal);
        self.add_vertex(corners[1], normal);
        self.add_vertex(corners[2], normal);
        self.add_vertex(corners[3], normal);

        self.add_triangle(base, base + 1, base + 2);
        self.add_triangle(base, base + 2, base + 3);
    }

    /// Add a quad and, when `double_sided`, its reversed twin facing `-normal`.
    ///
    /// Returns the number of triangles emitted.
    pub fn add_quad_sided(
        &mut self,
        corners: [Point3<f64>; 4],
        normal: Vector3<f64>,
        double_sided: bool,
    ) -> usize {
        self.add_quad(corners, normal);
        if double_sided {
            let [a, b, c, d] = corners;
            self.add_quad([a, d, c, b], -normal);
            4
        } else {
            2
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position of vertex `index`
    #[inline]
    pub fn position(&self, index: u32) -> Option<Point3<f32>> {
        let i = index as usize * 3;
        let chunk = self.positions.get(i..i + 3)?;
        Some(Point3::new(chunk[0], chunk[1], chunk[2]))
    }

    /// Count vertex positions that are distinct up to 0.1 mm.
    ///
    /// Quads emitted by [`Mesh::add_quad`] never share vertices, so this is
    /// the number that matters when checking a wall for watertightness.
    pub fn distinct_position_count(&self) -> usize {
        let mut seen: FxHashSet<(i64, i64, i64)> = FxHashSet::default();
        for chunk in self.positions.chunks_exact(3) {
            seen.insert((
                (chunk[0] as f64 * 1e4).round() as i64,
                (chunk[1] as f64 * 1e4).round() as i64,
                (chunk[2] as f64 * 1e4).round() as i64,
            ));
        }
        seen.len()
    }

    /// Axis-aligned extent as (min, max). Both are the origin for an empty mesh.
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        let mut points = self
            .positions
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]));
        let Some(first) = points.next() else {
            return (Point3::origin(), Point3::origin());
        };
        points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)))
    }

    /// Drop all geometry, keeping the allocations
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.indices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> [Point3<f64>; 4] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_vertices_append_flat() {
        let mut mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.add_vertex(Point3::new(1.0, 2.0, 3.0), Vector3::z()), 0);
        assert_eq!(mesh.add_vertex(Point3::new(4.0, 5.0, 6.0), Vector3::x()), 1);
        assert_eq!(mesh.positions, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(mesh.normals, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(mesh.position(1), Some(Point3::new(4.0, 5.0, 6.0)));
        assert_eq!(mesh.position(2), None);
    }

    #[test]
    fn test_add_quad() {
        let mut mesh = Mesh::new();
        mesh.add_quad(unit_quad(), Vector3::z());
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_double_sided_quad_shares_positions() {
        let mut mesh = Mesh::new();
        let emitted = mesh.add_quad_sided(unit_quad(), Vector3::z(), true);
        assert_eq!(emitted, 4);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.vertex_count(), 8);
        // Back face reuses the same four corners
        assert_eq!(mesh.distinct_position_count(), 4);
        assert_eq!(&mesh.normals[12..15], &[0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_bounds() {
        let mut mesh = Mesh::new();
        assert_eq!(mesh.bounds(), (Point3::origin(), Point3::origin()));
        mesh.add_quad(unit_quad(), Vector3::z());
        let (min, max) = mesh.bounds();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 0.0));
    }
}
