// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge detection between adjacent classified faces

use crate::config::ClassifierConfig;
use crate::fragment::{FragmentId, WorldFace};
use crate::surface::{EdgeType, SurfaceType};
use crate::types::DetectedEdge;
use nalgebra::Point3;
use roomscan_geometry::Error as GeometryError;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Faces sharing each undirected edge, keyed by sorted vertex indices
pub type EdgeAdjacency = FxHashMap<(u32, u32), SmallVec<[u32; 2]>>;

/// Build the edge to adjacent-face map, skipping malformed faces
pub fn build_adjacency(faces: &[Result<WorldFace, GeometryError>]) -> EdgeAdjacency {
    let mut adjacency = EdgeAdjacency::default();
    for (face_idx, face) in faces.iter().enumerate() {
        let Ok(face) = face else { continue };
        let [a, b, c] = face.indices;
        for (u, v) in [(a, b), (b, c), (c, a)] {
            let key = if u < v { (u, v) } else { (v, u) };
            adjacency.entry(key).or_default().push(face_idx as u32);
        }
    }
    adjacency
}

/// Angle between two face normals in degrees
#[inline]
pub fn dihedral_deg(a: &WorldFace, b: &WorldFace) -> f64 {
    a.normal.dot(&b.normal).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Find creases within one fragment.
///
/// Only manifold edges (exactly two faces) are examined. An edge is kept when
/// its faces were classified differently or fold sharper than the configured
/// angle. Sorted sharpest first.
pub fn detect_edges(
    fragment: FragmentId,
    world: &[Point3<f64>],
    faces: &[Result<WorldFace, GeometryError>],
    face_types: &[SurfaceType],
    config: &ClassifierConfig,
) -> Vec<DetectedEdge> {
    let adjacency = build_adjacency(faces);
    let mut edges = Vec::new();

    for (&(u, v), adjacent) in &adjacency {
        if adjacent.len() != 2 {
            continue;
        }
        let (fa, fb) = (adjacent[0] as usize, adjacent[1] as usize);
        let (Ok(a), Ok(b)) = (&faces[fa], &faces[fb]) else {
            continue;
        };
        let (Some(&ta), Some(&tb)) = (face_types.get(fa), face_types.get(fb)) else {
            continue;
        };

        let dihedral = dihedral_deg(a, b);
        let sharp = dihedral > config.edge_angle_threshold_deg;
        if ta == tb && !sharp {
            continue;
        }

        edges.push(DetectedEdge {
            start: world[u as usize],
            end: world[v as usize],
            edge_type: EdgeType::from_adjacent(ta, tb, sharp),
            dihedral_deg: dihedral,
            fragment,
        });
    }

    edges.sort_by(|a, b| b.dihedral_deg.total_cmp(&a.dihedral_deg));
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::world_face;
    use approx::assert_relative_eq;

    /// An L-shaped strip: a floor quad meeting a wall quad along x
    fn floor_and_wall() -> (Vec<Point3<f64>>, Vec<Result<WorldFace, GeometryError>>) {
        let world = vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let idx = [[0, 1, 2], [0, 2, 3], [3, 2, 4], [3, 4, 5]];
        let faces = idx.iter().map(|f| world_face(*f, &world, &[])).collect();
        (world, faces)
    }

    #[test]
    fn test_fold_between_floor_and_wall() {
        let (world, faces) = floor_and_wall();
        let types = [SurfaceType::Floor, SurfaceType::Floor, SurfaceType::Wall, SurfaceType::Wall];
        let edges = detect_edges(FragmentId(1), &world, &faces, &types, &ClassifierConfig::default());

        // The two diagonals are coplanar and same-typed; only the fold remains
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::FloorWall);
        assert_relative_eq!(edges[0].dihedral_deg, 90.0, epsilon = 1e-9);
        assert_relative_eq!(edges[0].length(), 1.0);
    }

    #[test]
    fn test_same_type_sharp_fold_is_corner() {
        let (world, faces) = floor_and_wall();
        let types = [SurfaceType::Wall; 4];
        let edges = detect_edges(FragmentId(1), &world, &faces, &types, &ClassifierConfig::default());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::VerticalCorner);
    }

    #[test]
    fn test_boundary_edges_are_ignored() {
        let (_, faces) = floor_and_wall();
        let adjacency = build_adjacency(&faces);
        let boundary = adjacency.values().filter(|f| f.len() == 1).count();
        let shared = adjacency.values().filter(|f| f.len() == 2).count();
        assert_eq!((boundary, shared), (6, 3));
    }

    #[test]
    fn test_malformed_faces_are_skipped() {
        let (world, mut faces) = floor_and_wall();
        faces[2] = Err(GeometryError::DegenerateTriangle);
        let types = [SurfaceType::Floor, SurfaceType::Floor, SurfaceType::Unknown, SurfaceType::Wall];
        let edges = detect_edges(FragmentId(1), &world, &faces, &types, &ClassifierConfig::default());
        assert!(edges.is_empty());
    }
}
