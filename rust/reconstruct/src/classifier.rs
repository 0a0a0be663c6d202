// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface classification
//!
//! Faces are tagged by their world-space normal and height:
//!
//! - `normal.y > horizontal_threshold` is floor
//! - `normal.y < -horizontal_threshold` is ceiling, or a ceiling protrusion
//!   when it hangs a plausible depth below an already known ceiling
//! - `|normal.y| < wall_threshold` is wall
//! - anything in between is an angled object
//!
//! Floor and ceiling faces feed the height estimators as they are seen.

use crate::config::ClassifierConfig;
use crate::edges::detect_edges;
use crate::fragment::{MeshFragment, WorldFace};
use crate::statistics::{FragmentContribution, ScanStatistics};
use crate::surface::SurfaceType;
use crate::types::{ClassifiedSurface, DetectedEdge};
use nalgebra::{Point3, Vector3};
use roomscan_geometry::{Aabb3, Error as GeometryError};

/// Everything learned from one fragment
#[derive(Debug, Clone)]
pub struct FragmentClassification {
    pub surface: ClassifiedSurface,
    /// One entry per input face, in face order
    pub face_types: Vec<SurfaceType>,
    pub world_vertices: Vec<Point3<f64>>,
    pub edges: Vec<DetectedEdge>,
    /// Faces skipped as malformed
    pub skipped_faces: usize,
    /// Corners of the faces tagged `CeilingProtrusion`, world space
    pub protrusion_vertices: Vec<Point3<f64>>,
    /// Share of the fragment's area tagged `CeilingProtrusion`
    pub protrusion_share: f64,
}

/// Tags faces and fragments with surface types
#[derive(Debug, Clone, Default)]
pub struct SurfaceClassifier {
    config: ClassifierConfig,
}

impl SurfaceClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one face from its normal and world height.
    ///
    /// Values exactly on a threshold fall to the less specific side: a normal
    /// with `y == horizontal_threshold` is not floor, one with
    /// `|y| == wall_threshold` is an object.
    pub fn classify(&self, normal: &Vector3<f64>, world_y: f64, stats: &mut ScanStatistics) -> SurfaceType {
        let len = normal.norm();
        if !len.is_finite() || len < 1e-12 || !world_y.is_finite() {
            return SurfaceType::Unknown;
        }
        let ny = if (len - 1.0).abs() > 1e-9 { normal.y / len } else { normal.y };
        let horizontal = self.config.horizontal_threshold;

        if ny > horizontal {
            stats.add_floor_sample(world_y);
            return SurfaceType::Floor;
        }

        if ny < -horizontal {
            if let Some(ceiling) = stats.ceiling_height() {
                let depth = ceiling - world_y;
                if depth > self.config.protrusion_min_depth && depth < self.config.protrusion_max_depth {
                    return SurfaceType::CeilingProtrusion;
                }
            }
            stats.add_ceiling_sample(world_y);
            return SurfaceType::Ceiling;
        }

        if ny.abs() < self.config.wall_threshold {
            SurfaceType::Wall
        } else {
            SurfaceType::Object
        }
    }

    /// Classify every face of a fragment and commit its contribution.
    ///
    /// World-space face geometry is computed in parallel; classification and
    /// all writes to `stats` happen afterwards on the calling thread. Any
    /// earlier contribution of the same fragment id is replaced.
    pub fn classify_mesh(&self, fragment: &MeshFragment, stats: &mut ScanStatistics) -> FragmentClassification {
        let world = fragment.world_vertices();
        let normals = fragment.world_normals();
        let faces = fragment.world_faces(&world, &normals);

        let mut face_types = Vec::with_capacity(faces.len());
        let mut skipped_faces = 0;
        for (face_idx, face) in faces.iter().enumerate() {
            match face {
                Ok(face) => face_types.push(self.classify(&face.normal, face.centroid.y, stats)),
                Err(err) => {
                    tracing::trace!(fragment = %fragment.id, face = face_idx, %err, "skipping malformed face");
                    skipped_faces += 1;
                    face_types.push(SurfaceType::Unknown);
                }
            }
        }

        let surface = classify_surface(&world, &faces, &face_types);

        let mut contribution = FragmentContribution {
            vertex_count: fragment.vertices.len(),
            ..Default::default()
        };
        let mut protrusion_vertices = Vec::new();
        for (face, surface_type) in faces.iter().zip(&face_types) {
            if let Ok(face) = face {
                contribution.area_by_type[surface_type.index()] += face.area;
                if *surface_type == SurfaceType::CeilingProtrusion {
                    protrusion_vertices.extend(face.indices.iter().map(|&i| world[i as usize]));
                }
            }
        }
        let protrusion_share = if surface.area > 0.0 {
            contribution.area_by_type[SurfaceType::CeilingProtrusion.index()] / surface.area
        } else {
            0.0
        };
        stats.record_contribution(fragment.id, contribution);

        let edges = detect_edges(fragment.id, &world, &faces, &face_types, &self.config);
        stats.record_edges(fragment.id, edges.iter().copied());

        tracing::debug!(
            fragment = %fragment.id,
            faces = faces.len(),
            skipped = skipped_faces,
            surface = %surface.surface_type,
            area = surface.area,
            confidence = surface.confidence,
            "fragment classified"
        );

        FragmentClassification {
            surface,
            face_types,
            world_vertices: world,
            edges,
            skipped_faces,
            protrusion_vertices,
            protrusion_share,
        }
    }
}

/// Aggregate per-face types into a fragment-level surface.
///
/// The dominant type is the one covering the most area, ties going to the
/// type declared first. Confidence is the dominant share of the total area.
pub fn classify_surface(
    world: &[Point3<f64>],
    faces: &[Result<WorldFace, GeometryError>],
    face_types: &[SurfaceType],
) -> ClassifiedSurface {
    let mut area_by_type = [0.0_f64; SurfaceType::COUNT];
    let mut normal_sum = Vector3::zeros();
    let mut bounds = Aabb3::empty();
    let mut total_area = 0.0;

    for (face, surface_type) in faces.iter().zip(face_types) {
        let Ok(face) = face else { continue };
        area_by_type[surface_type.index()] += face.area;
        normal_sum += face.normal * face.area;
        total_area += face.area;
        for &i in &face.indices {
            bounds.expand(&world[i as usize]);
        }
    }

    if total_area <= 0.0 || !bounds.is_valid() {
        return ClassifiedSurface::unknown();
    }

    let mut dominant = SurfaceType::Unknown;
    let mut dominant_area = f64::NEG_INFINITY;
    for surface_type in SurfaceType::ALL {
        let area = area_by_type[surface_type.index()];
        if area > dominant_area {
            dominant = surface_type;
            dominant_area = area;
        }
    }

    let average_normal = normal_sum
        .try_normalize(1e-12)
        .unwrap_or_else(Vector3::zeros);

    ClassifiedSurface {
        surface_type: dominant,
        average_normal,
        area: total_area,
        min_y: bounds.min.y,
        max_y: bounds.max.y,
        bounds,
        confidence: dominant_area / total_area,
    }
}
