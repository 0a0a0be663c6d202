// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh fragments supplied by the capture subsystem
//!
//! A fragment is re-sent whenever the sensor resamples the same surface; the
//! latest version for an identifier replaces the earlier one everywhere.

use nalgebra::{Matrix4, Point3, Vector3};
use rayon::prelude::*;
use roomscan_geometry::{transform_normal, transform_point, Error as GeometryError};
use serde::{Deserialize, Serialize};

/// Stable identifier of a fragment across updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentId(pub u64);

impl std::fmt::Display for FragmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One batch of captured surface geometry in local space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshFragment {
    pub id: FragmentId,
    pub vertices: Vec<Point3<f64>>,
    /// Per-vertex normals, parallel to `vertices`. May be empty.
    pub normals: Vec<Vector3<f64>>,
    pub faces: Vec<[u32; 3]>,
    /// Local to world
    pub transform: Matrix4<f64>,
}

/// A triangle resolved into world space
#[derive(Debug, Clone, Copy)]
pub struct WorldFace {
    pub indices: [u32; 3],
    pub normal: Vector3<f64>,
    pub centroid: Point3<f64>,
    pub area: f64,
}

impl MeshFragment {
    pub fn new(
        id: FragmentId,
        vertices: Vec<Point3<f64>>,
        normals: Vec<Vector3<f64>>,
        faces: Vec<[u32; 3]>,
    ) -> Self {
        Self {
            id,
            vertices,
            normals,
            faces,
            transform: Matrix4::identity(),
        }
    }

    pub fn with_transform(mut self, transform: Matrix4<f64>) -> Self {
        self.transform = transform;
        self
    }

    pub fn world_vertices(&self) -> Vec<Point3<f64>> {
        self.vertices
            .par_iter()
            .map(|v| transform_point(&self.transform, v))
            .collect()
    }

    /// World-space vertex normals; `None` where missing or zero-length
    pub fn world_normals(&self) -> Vec<Option<Vector3<f64>>> {
        if self.normals.len() != self.vertices.len() {
            return vec![None; self.vertices.len()];
        }
        self.normals
            .par_iter()
            .map(|n| transform_normal(&self.transform, n).ok())
            .collect()
    }

    /// Resolve every face against already-transformed vertices.
    ///
    /// Results stay in face order; malformed faces come back as `Err` so the
    /// caller can skip them without losing index alignment.
    pub fn world_faces(
        &self,
        world: &[Point3<f64>],
        normals: &[Option<Vector3<f64>>],
    ) -> Vec<Result<WorldFace, GeometryError>> {
        self.faces
            .par_iter()
            .map(|face| world_face(*face, world, normals))
            .collect()
    }
}

/// Compute the geometric normal, centroid and area of one triangle.
///
/// The winding-derived normal is flipped to agree with the supplied vertex
/// normals when they are present.
pub fn world_face(
    indices: [u32; 3],
    world: &[Point3<f64>],
    normals: &[Option<Vector3<f64>>],
) -> Result<WorldFace, GeometryError> {
    for &index in &indices {
        if index as usize >= world.len() {
            return Err(GeometryError::IndexOutOfRange {
                index,
                len: world.len(),
            });
        }
    }

    let a = world[indices[0] as usize];
    let b = world[indices[1] as usize];
    let c = world[indices[2] as usize];

    let cross = (b - a).cross(&(c - a));
    let len = cross.norm();
    if !len.is_finite() || len < 1e-12 {
        return Err(GeometryError::DegenerateTriangle);
    }

    let mut normal = cross / len;
    let hint: Vector3<f64> = indices
        .iter()
        .filter_map(|&i| normals.get(i as usize).copied().flatten())
        .sum();
    if hint.dot(&normal) < 0.0 {
        normal = -normal;
    }

    Ok(WorldFace {
        indices,
        normal,
        centroid: Point3::from((a.coords + b.coords + c.coords) / 3.0),
        area: len / 2.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> MeshFragment {
        MeshFragment::new(
            FragmentId(7),
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![Vector3::y(); 3],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_vertex_normals_fix_orientation() {
        // Winding (0,1,2) gives -Y; vertex normals say +Y
        let frag = triangle();
        let world = frag.world_vertices();
        let normals = frag.world_normals();
        let face = world_face(frag.faces[0], &world, &normals).unwrap();
        assert_relative_eq!(face.normal, Vector3::y());
        assert_relative_eq!(face.area, 0.5);
    }

    #[test]
    fn test_transform_is_applied() {
        let frag = triangle().with_transform(Matrix4::new_translation(&Vector3::new(0.0, 2.0, 0.0)));
        let world = frag.world_vertices();
        let faces = frag.world_faces(&world, &frag.world_normals());
        let face = faces[0].as_ref().unwrap();
        assert_relative_eq!(face.centroid.y, 2.0);
    }

    #[test]
    fn test_malformed_faces_are_errors_in_place() {
        let mut frag = triangle();
        frag.faces = vec![[0, 1, 9], [0, 0, 1], [0, 1, 2]];
        let world = frag.world_vertices();
        let faces = frag.world_faces(&world, &frag.world_normals());
        assert_eq!(faces.len(), 3);
        assert!(matches!(faces[0], Err(GeometryError::IndexOutOfRange { index: 9, len: 3 })));
        assert!(matches!(faces[1], Err(GeometryError::DegenerateTriangle)));
        assert!(faces[2].is_ok());
    }

    #[test]
    fn test_missing_normals_are_tolerated() {
        let mut frag = triangle();
        frag.normals.clear();
        assert_eq!(frag.world_normals(), vec![None; 3]);
    }
}
