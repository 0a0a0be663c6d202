// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synthetic capture: box rooms as scanner-like lattice fragments
//!
//! Used by the `synthetic-room` tool and by tests to drive the pipeline
//! without a sensor.

use crate::fragment::{FragmentId, MeshFragment};
use nalgebra::{Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Fragment id of the floor slab
pub const FLOOR_ID: FragmentId = FragmentId(1);

/// Fragment id of the ceiling slab
pub const CEILING_ID: FragmentId = FragmentId(2);

/// Fragment id of the first wall; the others follow
pub const FIRST_WALL_ID: u64 = 10;

/// Rectangular hole in a wall panel, in wall coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelHole {
    /// Distance from the panel start
    pub left: f64,
    pub right: f64,
    /// Height above the panel bottom
    pub bottom: f64,
    pub top: f64,
}

impl PanelHole {
    /// Strictly inside; the boundary itself stays solid
    fn contains(&self, t: f64, y: f64) -> bool {
        const EPS: f64 = 1e-9;
        t > self.left + EPS && t < self.right - EPS && y > self.bottom + EPS && y < self.top - EPS
    }
}

/// Axis-aligned box room with its floor corner at the origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticRoom {
    /// Extent along X
    pub width: f64,
    /// Extent along Z
    pub depth: f64,
    pub height: f64,
    /// Hole in the first wall (along X at z = 0)
    pub door: Option<PanelHole>,
    /// Vertex spacing of wall panels. Default: 0.05
    pub wall_spacing: f64,
    /// Vertex spacing of floor and ceiling slabs. Default: 0.5
    pub slab_spacing: f64,
}

impl SyntheticRoom {
    pub fn new(width: f64, depth: f64, height: f64) -> Self {
        Self {
            width,
            depth,
            height,
            door: None,
            wall_spacing: 0.05,
            slab_spacing: 0.5,
        }
    }

    /// Cut a floor-standing opening into the first wall
    pub fn with_door(mut self, left: f64, right: f64, top: f64) -> Self {
        self.door = Some(PanelHole {
            left,
            right,
            bottom: 0.0,
            top,
        });
        self
    }

    /// Corners in plan, counter-clockwise
    pub fn corners(&self) -> [Point2<f64>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(self.width, 0.0),
            Point2::new(self.width, self.depth),
            Point2::new(0.0, self.depth),
        ]
    }

    pub fn floor(&self) -> MeshFragment {
        slab(FLOOR_ID, self.width, self.depth, 0.0, self.slab_spacing, true)
    }

    pub fn ceiling(&self) -> MeshFragment {
        slab(CEILING_ID, self.width, self.depth, self.height, self.slab_spacing, false)
    }

    /// One panel per side, ids from [`FIRST_WALL_ID`]
    pub fn walls(&self) -> Vec<MeshFragment> {
        let corners = self.corners();
        let center = Point2::new(self.width * 0.5, self.depth * 0.5);
        (0..4)
            .map(|i| {
                let (a, b) = (corners[i], corners[(i + 1) % 4]);
                let hole = if i == 0 { self.door } else { None };
                wall_panel(
                    FragmentId(FIRST_WALL_ID + i as u64),
                    a,
                    b,
                    center,
                    self.height,
                    self.wall_spacing,
                    hole,
                )
            })
            .collect()
    }

    /// Floor, ceiling, then walls
    pub fn fragments(&self) -> Vec<MeshFragment> {
        let mut fragments = vec![self.floor(), self.ceiling()];
        fragments.extend(self.walls());
        fragments
    }
}

/// Vertical lattice panel from `a` to `b` standing on y = 0, facing `toward`.
///
/// Vertices strictly inside `hole` are left out together with every cell
/// touching them.
pub fn wall_panel(
    id: FragmentId,
    a: Point2<f64>,
    b: Point2<f64>,
    toward: Point2<f64>,
    height: f64,
    spacing: f64,
    hole: Option<PanelHole>,
) -> MeshFragment {
    let length = (b - a).norm();
    let cols = ((length / spacing).round() as usize).max(1);
    let rows = ((height / spacing).round() as usize).max(1);

    let d = (b - a) / length.max(1e-12);
    let mut facing = Vector2::new(-d.y, d.x);
    let mid = Point2::from((a.coords + b.coords) * 0.5);
    if facing.dot(&(toward - mid)) < 0.0 {
        facing = -facing;
    }
    let normal = Vector3::new(facing.x, 0.0, facing.y);

    // Lattice index -> vertex index, None inside the hole
    let mut index: Vec<Option<u32>> = Vec::with_capacity((cols + 1) * (rows + 1));
    let mut vertices = Vec::new();
    for r in 0..=rows {
        let y = height * r as f64 / rows as f64;
        for c in 0..=cols {
            let t = length * c as f64 / cols as f64;
            if hole.is_some_and(|h| h.contains(t, y)) {
                index.push(None);
                continue;
            }
            let p = a + d * t;
            index.push(Some(vertices.len() as u32));
            vertices.push(Point3::new(p.x, y, p.y));
        }
    }

    // [v0, v1, v2] winds towards the left of the panel direction
    let flip = facing.dot(&Vector2::new(-d.y, d.x)) < 0.0;
    let at = |r: usize, c: usize| index[r * (cols + 1) + c];
    let mut faces = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let (Some(v0), Some(v1), Some(v2), Some(v3)) = (at(r, c), at(r, c + 1), at(r + 1, c + 1), at(r + 1, c))
            else {
                continue;
            };
            if flip {
                faces.push([v0, v2, v1]);
                faces.push([v0, v3, v2]);
            } else {
                faces.push([v0, v1, v2]);
                faces.push([v0, v2, v3]);
            }
        }
    }

    let normals = vec![normal; vertices.len()];
    MeshFragment::new(id, vertices, normals, faces)
}

/// Horizontal lattice covering `[0, width] x [0, depth]` at height `y`
pub fn slab(id: FragmentId, width: f64, depth: f64, y: f64, spacing: f64, up: bool) -> MeshFragment {
    let cols = ((width / spacing).round() as usize).max(1);
    let rows = ((depth / spacing).round() as usize).max(1);

    let mut vertices = Vec::with_capacity((cols + 1) * (rows + 1));
    for r in 0..=rows {
        let z = depth * r as f64 / rows as f64;
        for c in 0..=cols {
            vertices.push(Point3::new(width * c as f64 / cols as f64, y, z));
        }
    }

    let at = |r: usize, c: usize| (r * (cols + 1) + c) as u32;
    let mut faces = Vec::with_capacity(cols * rows * 2);
    for r in 0..rows {
        for c in 0..cols {
            let (v0, v1, v2, v3) = (at(r, c), at(r, c + 1), at(r + 1, c + 1), at(r + 1, c));
            // (x, z) counter-clockwise lifted to XZ faces -Y
            if up {
                faces.push([v0, v2, v1]);
                faces.push([v0, v3, v2]);
            } else {
                faces.push([v0, v1, v2]);
                faces.push([v0, v2, v3]);
            }
        }
    }

    let normal = if up { Vector3::y() } else { -Vector3::y() };
    let normals = vec![normal; vertices.len()];
    MeshFragment::new(id, vertices, normals, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometric_normal(fragment: &MeshFragment, face: usize) -> Vector3<f64> {
        let [a, b, c] = fragment.faces[face].map(|i| fragment.vertices[i as usize]);
        (b - a).cross(&(c - a))
    }

    #[test]
    fn test_slab_winding() {
        let floor = slab(FLOOR_ID, 4.0, 4.0, 0.0, 0.5, true);
        assert_eq!(floor.faces.len(), 128);
        assert!(geometric_normal(&floor, 0).y > 0.0);

        let ceiling = slab(CEILING_ID, 4.0, 4.0, 2.5, 0.5, false);
        assert!(geometric_normal(&ceiling, 0).y < 0.0);
    }

    #[test]
    fn test_walls_face_inward() {
        let room = SyntheticRoom::new(4.0, 3.0, 2.5);
        let center = Vector3::new(2.0, 0.0, 1.5);
        for wall in room.walls() {
            let n = wall.normals[0];
            let p = wall.vertices[0];
            assert!(n.dot(&(center - p.coords)) > 0.0);
            assert!(geometric_normal(&wall, 0).dot(&n) > 0.0);
        }
    }

    #[test]
    fn test_door_hole_removes_vertices() {
        let solid = SyntheticRoom::new(4.0, 4.0, 2.5);
        let door = solid.clone().with_door(0.55, 1.45, 2.1);
        let (a, b) = (&solid.walls()[0], &door.walls()[0]);
        assert!(b.vertices.len() < a.vertices.len());
        assert!(b.faces.len() < a.faces.len());
        assert!(!b
            .vertices
            .iter()
            .any(|v| v.x > 0.6 && v.x < 1.4 && v.y > 0.05 && v.y < 2.05));
    }
}
