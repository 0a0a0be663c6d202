// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall reconstructor: idealized walls and a watertight mesh from corners
//!
//! Reads a closed snapshot of the statistics and never mutates it, so it can
//! run on a worker thread while capture continues on a clone.

use crate::config::ReconstructionConfig;
use crate::statistics::ScanStatistics;
use crate::surface::SurfaceType;
use crate::types::{merge_openings, RoomCorner, RoomMesh, WallOpening, WallSegment};
use nalgebra::{Point2, Point3, Vector2, Vector3};
use roomscan_geometry::polygon::{centroid, closest_point_on_segment, distinct_count, order_by_polar_angle};
use roomscan_geometry::{fan_from_centroid, Mesh};

/// Below this, band edges coincide
const BAND_EPSILON: f64 = 1e-6;

/// Floor and ceiling heights of the room.
///
/// Falls back to the default room height above the floor while the
/// ceiling is unknown or implausibly low.
pub fn room_heights(stats: &ScanStatistics, config: &ReconstructionConfig) -> (f64, f64) {
    let floor = stats.floor_height().unwrap_or(0.0);
    match stats.ceiling_height() {
        Some(ceiling) if ceiling - floor >= config.min_room_height => (floor, ceiling),
        _ => (floor, floor + config.default_room_height),
    }
}

/// Builds idealized walls from corner points and recorded openings
#[derive(Debug, Clone, Default)]
pub struct WallReconstructor {
    config: ReconstructionConfig,
}

impl WallReconstructor {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Floor and ceiling heights to build with
    pub fn resolve_heights(&self, stats: &ScanStatistics) -> (f64, f64) {
        room_heights(stats, &self.config)
    }

    /// Corner polygon in plan, clockwise.
    ///
    /// Confirmed corners suppress inferred ones within twice the snap
    /// distance; corners closer than the merge distance are averaged.
    pub fn resolve_corners(&self, stats: &ScanStatistics, inferred: &[RoomCorner]) -> Vec<Point2<f64>> {
        let confirmed: Vec<Point2<f64>> = stats
            .confirmed_corners()
            .iter()
            .map(|p| Point2::new(p.x, p.z))
            .collect();
        let suppress = 2.0 * self.config.corner_snap_distance;

        let candidates = confirmed.iter().copied().chain(
            inferred
                .iter()
                .map(RoomCorner::plan)
                .filter(|p| confirmed.iter().all(|c| (p - c).norm() >= suppress)),
        );

        // Greedy clustering, each cluster tracked by its running sum
        let mut clusters: Vec<(Vector2<f64>, usize)> = Vec::new();
        for p in candidates {
            let near = clusters
                .iter_mut()
                .find(|(sum, n)| (p.coords - *sum / *n as f64).norm() < self.config.corner_merge_distance);
            match near {
                Some((sum, n)) => {
                    *sum += p.coords;
                    *n += 1;
                }
                None => clusters.push((p.coords, 1)),
            }
        }

        let points: Vec<Point2<f64>> = clusters
            .into_iter()
            .map(|(sum, n)| Point2::from(sum / n as f64))
            .collect();
        order_by_polar_angle(&points, true)
    }

    /// Idealized walls around the corner polygon.
    ///
    /// Empty when fewer than three distinct corners are known.
    pub fn reconstruct(&self, stats: &ScanStatistics, inferred: &[RoomCorner]) -> Vec<WallSegment> {
        let (floor, ceiling) = self.resolve_heights(stats);
        let corners = self.resolve_corners(stats, inferred);
        if distinct_count(&corners, self.config.corner_merge_distance.max(1e-9)) < 3 {
            return Vec::new();
        }

        let n = corners.len();
        let mut walls = outline_walls(&corners, floor, ceiling - floor, self.config.min_wall_length);

        let mut placed = 0;
        for opening in stats.openings() {
            let p = opening.plan();
            let nearest = walls
                .iter()
                .enumerate()
                .map(|(i, w)| (i, closest_point_on_segment(&p, &w.start, &w.end)))
                .filter(|(_, (_, dist))| *dist <= self.config.opening_proximity)
                .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1));
            let Some((i, (t, _))) = nearest else {
                tracing::trace!(kind = opening.kind.as_str(), "opening not near any wall");
                continue;
            };

            let wall = &mut walls[i];
            let length = wall.length();
            let local = WallOpening {
                kind: opening.kind,
                start_offset: t * length - opening.width * 0.5,
                width: opening.width,
                bottom: opening.bottom.max(0.0),
                top: opening.top.min(wall.height),
            };
            if let Some(local) = local.clamped(length) {
                wall.openings.push(local);
                placed += 1;
            }
        }
        for wall in &mut walls {
            merge_openings(&mut wall.openings);
        }

        tracing::debug!(
            corners = n,
            walls = walls.len(),
            openings = placed,
            floor,
            ceiling,
            "room reconstructed"
        );
        walls
    }

    /// Triangulate walls, floor and ceiling into one tagged mesh
    pub fn build_mesh(&self, walls: &[WallSegment], floor: f64, ceiling: f64) -> RoomMesh {
        let double_sided = self.config.double_sided;
        let mut room = RoomMesh::new();

        for wall in walls {
            emit_wall(&mut room.mesh, wall, double_sided);
            room.tag_new(SurfaceType::Wall);
        }

        let outline: Vec<Point2<f64>> = walls.iter().map(|w| w.start).collect();
        for (y, up, tag) in [(floor, true, SurfaceType::Floor), (ceiling, false, SurfaceType::Ceiling)] {
            match fan_from_centroid(&outline, y, up, double_sided, &mut room.mesh) {
                Ok(_) => room.tag_new(tag),
                Err(err) => tracing::trace!(%err, surface = %tag, "cap skipped"),
            }
        }
        room
    }

    /// `reconstruct` followed by `build_mesh`
    pub fn reconstruct_mesh(&self, stats: &ScanStatistics, inferred: &[RoomCorner]) -> RoomMesh {
        let walls = self.reconstruct(stats, inferred);
        if walls.is_empty() {
            return RoomMesh::new();
        }
        let (floor, ceiling) = self.resolve_heights(stats);
        self.build_mesh(&walls, floor, ceiling)
    }
}

/// One wall per consecutive outline pair, normals facing the centroid.
///
/// Edges shorter than `min_length` are skipped.
pub fn outline_walls(outline: &[Point2<f64>], floor: f64, height: f64, min_length: f64) -> Vec<WallSegment> {
    let n = outline.len();
    if n < 2 {
        return Vec::new();
    }
    let center = centroid(outline);
    (0..n)
        .filter_map(|i| {
            let (a, b) = (outline[i], outline[(i + 1) % n]);
            let length = (b - a).norm();
            if length < min_length.max(1e-9) {
                return None;
            }
            let d = (b - a) / length;
            let mut normal = Vector2::new(d.y, -d.x);
            let mid = Point2::from((a.coords + b.coords) * 0.5);
            if normal.dot(&(center - mid)) < 0.0 {
                normal = -normal;
            }
            Some(WallSegment {
                start: a,
                end: b,
                normal,
                height,
                bottom: floor,
                openings: Vec::new(),
                fragments: Vec::new(),
            })
        })
        .collect()
}

/// Emit a wall as one quad, or as bands around its openings.
///
/// Per opening: the band before it, the band below it (sill) and the band
/// above it (lintel); a final band closes the wall after the last opening.
/// Returns the number of quads.
pub fn emit_wall(mesh: &mut Mesh, wall: &WallSegment, double_sided: bool) -> usize {
    let length = wall.length();
    let height = wall.height;
    let mut quads = 0;
    let mut band = |mesh: &mut Mesh, t0: f64, t1: f64, y0: f64, y1: f64| {
        let (corners, normal) = wall_quad(wall, t0, t1, y0, y1);
        mesh.add_quad_sided(corners, normal, double_sided);
        quads += 1;
    };

    let mut cursor = 0.0;
    for opening in &wall.openings {
        let (start, end) = (opening.start_offset, opening.end_offset().min(length));
        if start > cursor + BAND_EPSILON {
            band(mesh, cursor, start, 0.0, height);
        }
        if opening.bottom > BAND_EPSILON {
            band(mesh, start, end, 0.0, opening.bottom.min(height));
        }
        if opening.top < height - BAND_EPSILON {
            band(mesh, start, end, opening.top.max(0.0), height);
        }
        cursor = cursor.max(end);
    }
    if cursor < length - BAND_EPSILON {
        band(mesh, cursor, length, 0.0, height);
    }
    quads
}

/// Corners and normal of the wall rectangle between two offsets and two
/// heights above the wall bottom, wound to face along the wall's normal
fn wall_quad(wall: &WallSegment, t0: f64, t1: f64, y0: f64, y1: f64) -> ([Point3<f64>; 4], Vector3<f64>) {
    let d = wall.direction();
    let at = |t: f64, y: f64| {
        let p = wall.start + d * t;
        Point3::new(p.x, wall.bottom + y, p.y)
    };
    let normal = Vector3::new(wall.normal.x, 0.0, wall.normal.y);

    // [s_bottom, e_bottom, e_top, s_top] winds towards (-d.y, d.x)
    let winding = Vector2::new(-d.y, d.x);
    let corners = if winding.dot(&wall.normal) >= 0.0 {
        [at(t0, y0), at(t1, y0), at(t1, y1), at(t0, y1)]
    } else {
        [at(t1, y0), at(t0, y0), at(t0, y1), at(t1, y1)]
    };
    (corners, normal)
}
