// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room simplifier: floor polygon straight from wall base points
//!
//! Independent of segment merging and corner inference. Wall vertices near
//! the floor are grid-snapped, hulled and then cleaned up into a room
//! outline with square corners where the scan was nearly square.

use crate::config::{ReconstructionConfig, SimplifierConfig};
use crate::reconstructor::{emit_wall, outline_walls, room_heights};
use crate::statistics::ScanStatistics;
use crate::surface::SurfaceType;
use crate::types::{ClassifiedFragment, RoomMesh, SimplifiedProtrusion, SimplifiedRoom};
use nalgebra::{Point2, Vector2};
use roomscan_geometry::polygon::{
    convex_hull, dedup_points, distinct_count, interior_angle_deg, perimeter, turning_angle_deg,
};
use roomscan_geometry::fan_from_centroid;
use rustc_hash::FxHashSet;

/// Points closer than this are the same corner
const POINT_EPSILON: f64 = 1e-6;

/// Angles this close to 90 degrees are already square
const SQUARE_EPSILON_DEG: f64 = 1e-6;

/// Builds a simplified room polygon from classified fragments
#[derive(Debug, Clone, Default)]
pub struct RoomSimplifier {
    config: SimplifierConfig,
    heights: ReconstructionConfig,
}

impl RoomSimplifier {
    /// `heights` supplies the room height fallback shared with the wall
    /// reconstructor
    pub fn new(config: SimplifierConfig, heights: ReconstructionConfig) -> Self {
        Self { config, heights }
    }

    #[inline]
    pub fn config(&self) -> &SimplifierConfig {
        &self.config
    }

    /// Plan positions of wall vertices near the floor, snapped to the grid
    /// and deduplicated
    pub fn collect_base_points<'a>(
        &self,
        fragments: impl IntoIterator<Item = &'a ClassifiedFragment>,
        floor: f64,
    ) -> Vec<Point2<f64>> {
        let grid = self.config.grid_size;
        let mut seen: FxHashSet<(i64, i64)> = FxHashSet::default();
        let mut points = Vec::new();

        let base_vertices = fragments
            .into_iter()
            .filter(|f| f.surface.surface_type == SurfaceType::Wall)
            .flat_map(|f| f.world_vertices.iter())
            .filter(|v| (v.y - floor).abs() <= self.config.base_height_tolerance);

        for v in base_vertices {
            let key = ((v.x / grid).round() as i64, (v.z / grid).round() as i64);
            if seen.insert(key) {
                points.push(Point2::new(key.0 as f64 * grid, key.1 as f64 * grid));
            }
        }
        points
    }

    /// Clean up a closed polygon until nothing changes.
    ///
    /// Each pass collapses short edges, drops near-collinear corners, squares
    /// near-right angles, merges close non-adjacent corners and removes
    /// duplicates. Never reduces a polygon below three corners.
    pub fn simplify_polygon(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        let mut current = dedup_points(points, POINT_EPSILON);
        if current.len() < 3 {
            return current;
        }

        for pass in 0..self.config.max_iterations {
            let mut next = current.clone();
            self.collapse_short_edges(&mut next);
            self.remove_collinear(&mut next);
            self.square_corners(&mut next);
            self.merge_close_corners(&mut next);
            let next = dedup_points(&next, POINT_EPSILON);

            let settled = same_polygon(&current, &next);
            current = next;
            if settled {
                tracing::trace!(pass, corners = current.len(), "polygon settled");
                break;
            }
        }
        current
    }

    fn collapse_short_edges(&self, points: &mut Vec<Point2<f64>>) {
        while points.len() > 3 {
            let n = points.len();
            let short = (0..n).find(|&i| (points[(i + 1) % n] - points[i]).norm() < self.config.min_wall_length);
            let Some(i) = short else {
                break;
            };
            let j = (i + 1) % n;
            points[i] = Point2::from((points[i].coords + points[j].coords) * 0.5);
            points.remove(j);
        }
    }

    fn remove_collinear(&self, points: &mut Vec<Point2<f64>>) {
        while points.len() > 3 {
            let n = points.len();
            let flattest = (0..n)
                .map(|i| (i, turning_angle_deg(&points[(i + n - 1) % n], &points[i], &points[(i + 1) % n])))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            match flattest {
                Some((i, angle)) if angle < self.config.collinear_angle_deg => {
                    points.remove(i);
                }
                _ => break,
            }
        }
    }

    /// Rotate the edge leaving each nearly square corner so the corner is
    /// exactly square; the edge keeps its length.
    ///
    /// The first and last corners are left alone so the closing edge absorbs
    /// the drift.
    fn square_corners(&self, points: &mut [Point2<f64>]) {
        let n = points.len();
        if n < 4 {
            return;
        }
        for i in 1..n - 1 {
            let (prev, at, next) = (points[i - 1], points[i], points[i + 1]);
            let off = (interior_angle_deg(&prev, &at, &next) - 90.0).abs();
            if off <= SQUARE_EPSILON_DEG || off >= self.config.right_angle_tolerance_deg {
                continue;
            }

            let incoming = at - prev;
            let outgoing = next - at;
            let (in_len, out_len) = (incoming.norm(), outgoing.norm());
            if in_len < POINT_EPSILON || out_len < POINT_EPSILON {
                continue;
            }
            let d = incoming / in_len;
            let left = Vector2::new(-d.y, d.x);
            let turn = if left.dot(&outgoing) >= 0.0 { left } else { -left };
            points[i + 1] = at + turn * out_len;
        }
    }

    fn merge_close_corners(&self, points: &mut Vec<Point2<f64>>) {
        'restart: while points.len() > 3 {
            let n = points.len();
            for i in 0..n {
                for j in i + 2..n {
                    if i == 0 && j == n - 1 {
                        continue;
                    }
                    if (points[i] - points[j]).norm() < self.config.corner_snap_distance {
                        points[i] = Point2::from((points[i].coords + points[j].coords) * 0.5);
                        points.remove(j);
                        continue 'restart;
                    }
                }
            }
            break;
        }
    }

    /// Simplified room from the cached fragments and the current statistics.
    ///
    /// The outline stays empty while fewer than three distinct base points
    /// are known; protrusions are reported either way.
    pub fn simplify<'a>(
        &self,
        fragments: impl IntoIterator<Item = &'a ClassifiedFragment>,
        stats: &ScanStatistics,
    ) -> SimplifiedRoom {
        let (floor, ceiling) = room_heights(stats, &self.heights);

        let mut room = SimplifiedRoom::empty(floor, ceiling);
        room.protrusions = stats
            .protrusions()
            .iter()
            .map(|p| SimplifiedProtrusion {
                kind: p.kind,
                outline: p.bounds.footprint().corners().to_vec(),
                depth: p.depth,
            })
            .collect();

        let base = self.collect_base_points(fragments, floor);
        if distinct_count(&base, POINT_EPSILON) < 3 {
            tracing::debug!(points = base.len(), "not enough wall base points");
            return room;
        }

        let hull = convex_hull(&base);
        if hull.len() < 3 {
            return room;
        }
        let outline = self.simplify_polygon(&hull);
        tracing::debug!(
            points = base.len(),
            hull = hull.len(),
            corners = outline.len(),
            perimeter = perimeter(&outline),
            "room simplified"
        );
        if outline.len() >= 3 {
            room.outline = outline;
        }
        room
    }

    /// Mesh the simplified room: walls, floor, ceiling and a prism per
    /// protrusion (four sides and an underside)
    pub fn build_mesh(&self, room: &SimplifiedRoom, double_sided: bool) -> RoomMesh {
        let mut out = RoomMesh::new();
        if room.is_empty() {
            return out;
        }
        let (floor, ceiling) = (room.floor_height, room.ceiling_height);

        for wall in outline_walls(&room.outline, floor, room.height(), 0.0) {
            emit_wall(&mut out.mesh, &wall, double_sided);
        }
        out.tag_new(SurfaceType::Wall);

        for (y, up, tag) in [(floor, true, SurfaceType::Floor), (ceiling, false, SurfaceType::Ceiling)] {
            match fan_from_centroid(&room.outline, y, up, double_sided, &mut out.mesh) {
                Ok(_) => out.tag_new(tag),
                Err(err) => tracing::trace!(%err, surface = %tag, "cap skipped"),
            }
        }

        for protrusion in &room.protrusions {
            let bottom = ceiling - protrusion.depth;
            for mut side in outline_walls(&protrusion.outline, bottom, protrusion.depth, 0.0) {
                side.normal = -side.normal;
                emit_wall(&mut out.mesh, &side, double_sided);
            }
            if let Err(err) = fan_from_centroid(&protrusion.outline, bottom, false, double_sided, &mut out.mesh) {
                tracing::trace!(%err, kind = ?protrusion.kind, "protrusion underside skipped");
            }
            out.tag_new(SurfaceType::CeilingProtrusion);
        }
        out
    }
}

fn same_polygon(a: &[Point2<f64>], b: &[Point2<f64>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(p, q)| (p - q).norm() < 1e-9)
}
