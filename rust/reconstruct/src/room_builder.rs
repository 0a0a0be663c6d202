// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room builder: wall segments and corners from vertical surfaces
//!
//! Each qualifying vertical fragment becomes one wall observation. Segments
//! live in a slot-map arena; a new observation that is collinear with and
//! close to an existing segment replaces that segment with the merged result,
//! repeatedly, until nothing else merges. Re-observing a fragment rebuilds
//! the arena from the ordered observation list, so the latest geometry of a
//! fragment is the only one that counts.

use crate::config::{ClassifierConfig, RoomBuilderConfig};
use crate::fragment::FragmentId;
use crate::openings::{detect_openings, plan_normal};
use crate::statistics::ScanStatistics;
use crate::surface::OpeningType;
use crate::types::{merge_openings, DetectedOpening, OpeningSource, RoomCorner, SegmentKey, WallOpening, WallSegment};
use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};
use roomscan_geometry::{transform_normal, transform_point};
use slotmap::SlotMap;

/// Confidence of openings inferred from gaps between segments
const GAP_OPENING_CONFIDENCE: f64 = 0.5;

/// What a vertical fragment turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalSurfaceOutcome {
    /// Floor-to-ceiling wall, merged into the given segment
    Wall(SegmentKey),
    /// Reaches the ceiling but not the floor; wall above an opening
    HeaderWall,
    /// Reaches neither floor nor ceiling
    Furniture,
    /// Floor or ceiling height not known yet
    Uncalibrated,
    /// Too narrow, or no usable horizontal facing
    Degenerate,
}

/// Accumulates wall segments across fragments
#[derive(Debug, Clone)]
pub struct RoomBuilder {
    config: RoomBuilderConfig,
    openings_config: ClassifierConfig,
    segments: SlotMap<SegmentKey, WallSegment>,
    /// Latest wall observation per fragment, in arrival order
    observations: Vec<(FragmentId, WallSegment)>,
    headers: Vec<(FragmentId, WallSegment)>,
}

impl RoomBuilder {
    pub fn new(config: RoomBuilderConfig, openings_config: ClassifierConfig) -> Self {
        Self {
            config,
            openings_config,
            segments: SlotMap::with_key(),
            observations: Vec::new(),
            headers: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &RoomBuilderConfig {
        &self.config
    }

    /// Decide what a vertical fragment is and fold walls into the segments.
    ///
    /// No-op until the statistics are calibrated. Any earlier observation of
    /// the same fragment is discarded first.
    pub fn process_vertical_surface(
        &mut self,
        id: FragmentId,
        vertices: &[Point3<f64>],
        normal: &Vector3<f64>,
        transform: &Matrix4<f64>,
        stats: &mut ScanStatistics,
    ) -> VerticalSurfaceOutcome {
        let (Some(floor), Some(room_height)) = (stats.floor_height(), stats.room_height()) else {
            return VerticalSurfaceOutcome::Uncalibrated;
        };

        if self.forget(id) {
            stats.remove_openings_from(id);
            self.rebuild();
        }

        self.observe(id, vertices, normal, transform, floor, room_height, stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn observe(
        &mut self,
        id: FragmentId,
        vertices: &[Point3<f64>],
        normal: &Vector3<f64>,
        transform: &Matrix4<f64>,
        floor: f64,
        room_height: f64,
        stats: &mut ScanStatistics,
    ) -> VerticalSurfaceOutcome {
        if vertices.is_empty() {
            return VerticalSurfaceOutcome::Degenerate;
        }
        let world: Vec<Point3<f64>> = vertices.iter().map(|v| transform_point(transform, v)).collect();
        let Some(facing) = transform_normal(transform, normal).ok().and_then(|n| plan_normal(&n)) else {
            return VerticalSurfaceOutcome::Degenerate;
        };

        let (min_y, max_y) = world
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v.y), hi.max(v.y)));
        let reaches_floor = min_y - floor <= self.config.floor_contact_tolerance;
        let reaches_ceiling = max_y - floor >= self.config.ceiling_reach_ratio * room_height;

        if !reaches_ceiling {
            tracing::trace!(fragment = %id, height = max_y - min_y, "vertical surface is furniture");
            return VerticalSurfaceOutcome::Furniture;
        }

        let Some(mut segment) = plan_segment(&world, facing, self.config.corner_snap_distance) else {
            return VerticalSurfaceOutcome::Degenerate;
        };
        segment.fragments.push(id);

        if !reaches_floor {
            segment.bottom = min_y;
            segment.height = max_y - min_y;
            self.headers.push((id, segment));
            tracing::debug!(fragment = %id, bottom = min_y - floor, "header wall stored");
            return VerticalSurfaceOutcome::HeaderWall;
        }

        segment.bottom = floor;
        segment.height = max_y - floor;

        let world_normal = Vector3::new(facing.x, 0.0, facing.y);
        let detected = detect_openings(OpeningSource::Fragment(id), &world, &world_normal, stats, &self.openings_config);
        segment.openings = detected
            .iter()
            .filter_map(|o| wall_relative(&segment, o))
            .collect();
        merge_openings(&mut segment.openings);

        self.observations.push((id, segment.clone()));
        let key = self.insert_merged(segment);
        VerticalSurfaceOutcome::Wall(key)
    }

    /// Drop a fragment's observations; returns whether there were any
    fn forget(&mut self, id: FragmentId) -> bool {
        let before = self.observations.len() + self.headers.len();
        self.observations.retain(|(fid, _)| *fid != id);
        self.headers.retain(|(fid, _)| *fid != id);
        before != self.observations.len() + self.headers.len()
    }

    /// Forget everything a fragment contributed
    pub fn remove_fragment(&mut self, id: FragmentId) -> bool {
        let removed = self.forget(id);
        if removed {
            self.rebuild();
        }
        removed
    }

    fn rebuild(&mut self) {
        self.segments.clear();
        let observations: Vec<WallSegment> = self.observations.iter().map(|(_, s)| s.clone()).collect();
        for segment in observations {
            self.insert_merged(segment);
        }
    }

    /// Segment a fragment currently contributes to
    pub fn segment_of(&self, id: FragmentId) -> Option<SegmentKey> {
        self.segments
            .iter()
            .find(|(_, s)| s.fragments.contains(&id))
            .map(|(k, _)| k)
    }

    /// Insert a segment, merging it with every segment it touches
    fn insert_merged(&mut self, segment: WallSegment) -> SegmentKey {
        let mut current = segment;
        loop {
            let candidate = self
                .segments
                .iter()
                .find(|(_, existing)| self.can_merge(existing, &current))
                .map(|(k, _)| k);

            let Some(key) = candidate else {
                tracing::debug!(
                    length = current.length(),
                    openings = current.openings.len(),
                    "wall segment created"
                );
                return self.segments.insert(current);
            };
            if let Some(existing) = self.segments.remove(key) {
                tracing::debug!(
                    existing = existing.length(),
                    incoming = current.length(),
                    "wall segments merged"
                );
                current = merge_segments(&existing, &current);
            }
        }
    }

    /// Parallel, on the same line and within the merge gap along it
    pub fn can_merge(&self, a: &WallSegment, b: &WallSegment) -> bool {
        if a.normal.dot(&b.normal) <= self.config.merge_normal_dot {
            return false;
        }
        if a.line_distance(&b.start) >= self.config.merge_gap || a.line_distance(&b.end) >= self.config.merge_gap {
            return false;
        }
        interval_gap(a, b) < self.config.merge_gap
    }

    // ------------------------------------------------------------------
    // Corners
    // ------------------------------------------------------------------

    /// Corner between two segments, if they are near-perpendicular and
    /// have endpoints within the snap distance. Symmetric in its arguments.
    pub fn find_corner(&self, a: SegmentKey, b: SegmentKey) -> Option<RoomCorner> {
        if a == b {
            return None;
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let sa = self.segments.get(first)?;
        let sb = self.segments.get(second)?;

        if sa.normal.dot(&sb.normal).abs() >= self.config.corner_perpendicular_dot {
            return None;
        }

        let ends_a = [(sa.start, sa.end), (sa.end, sa.start)];
        let ends_b = [(sb.start, sb.end), (sb.end, sb.start)];
        let mut best: Option<(f64, (Point2<f64>, Point2<f64>), (Point2<f64>, Point2<f64>))> = None;
        for ea in ends_a {
            for eb in ends_b {
                let d = (ea.0 - eb.0).norm();
                if best.map_or(true, |(bd, _, _)| d < bd) {
                    best = Some((d, ea, eb));
                }
            }
        }
        let (distance, (pa, far_a), (pb, far_b)) = best?;
        if distance >= self.config.corner_snap_distance {
            return None;
        }

        let mid = Point2::from((pa.coords + pb.coords) * 0.5);
        let da = far_a - pa;
        let db = far_b - pb;
        let angle_deg = (da.dot(&db) / (da.norm() * db.norm()))
            .clamp(-1.0, 1.0)
            .acos()
            .to_degrees();

        Some(RoomCorner {
            position: Point3::new(mid.x, sa.bottom.min(sb.bottom), mid.y),
            angle_deg,
            walls: (first, second),
        })
    }

    /// Corners over every pair of segments
    pub fn corners(&self) -> Vec<RoomCorner> {
        let mut keys: Vec<SegmentKey> = self.segments.keys().collect();
        keys.sort();

        let mut corners = Vec::new();
        for (i, &a) in keys.iter().enumerate() {
            for &b in &keys[i + 1..] {
                if let Some(corner) = self.find_corner(a, b) {
                    corners.push(corner);
                }
            }
        }
        corners
    }

    // ------------------------------------------------------------------
    // Gaps between segments
    // ------------------------------------------------------------------

    /// Segment-level opening rules. Heights are relative to the floor;
    /// `ceiling` is the room height.
    pub fn classify_gap(&self, bottom: f64, top: f64, ceiling: f64) -> Option<OpeningType> {
        let cfg = &self.config;
        let touches_floor = bottom <= cfg.gap_floor_tolerance;
        let below_ceiling = top < ceiling - cfg.ceiling_tolerance;
        let height = top - bottom;

        if touches_floor && !below_ceiling {
            Some(OpeningType::GlassDoor)
        } else if touches_floor && height >= cfg.door_height[0] && height <= cfg.door_height[1] {
            Some(OpeningType::Door)
        } else if bottom >= cfg.window_min_sill && below_ceiling {
            Some(OpeningType::Window)
        } else if bottom > cfg.gap_floor_tolerance && below_ceiling {
            Some(OpeningType::PassThrough)
        } else {
            None
        }
    }

    /// Recompute the openings implied by gaps between collinear segments.
    ///
    /// Gap openings from earlier calls are dropped first, so a gap that has
    /// since been closed or lost a bounding wall leaves nothing behind. The
    /// top of a gap comes from a header wall spanning it when one was seen,
    /// else the ceiling. Returns the number of openings recorded.
    pub fn reconcile_gaps(&self, stats: &mut ScanStatistics) -> usize {
        stats.remove_gap_openings();
        let (Some(floor), Some(room_height)) = (stats.floor_height(), stats.room_height()) else {
            return 0;
        };

        let segments: Vec<&WallSegment> = self.segments.values().collect();
        let mut recorded = 0;
        for (i, a) in segments.iter().enumerate() {
            for b in &segments[i + 1..] {
                let Some((lo, hi)) = self.gap_between(a, b) else {
                    continue;
                };
                let (Some(&left), Some(&right)) = (a.fragments.first(), b.fragments.first()) else {
                    continue;
                };
                let covered = segments
                    .iter()
                    .any(|s| !std::ptr::eq(*s, *a) && !std::ptr::eq(*s, *b) && self.collinear(a, s) && overlaps(a, s, lo, hi));
                if covered {
                    continue;
                }

                let top = self
                    .headers
                    .iter()
                    .map(|(_, h)| h)
                    .filter(|h| self.collinear(a, h) && overlaps(a, h, lo, hi))
                    .map(|h| h.bottom - floor)
                    .reduce(f64::min)
                    .unwrap_or(room_height);

                let Some(kind) = self.classify_gap(0.0, top, room_height) else {
                    continue;
                };

                let axis = a.direction();
                let center = a.start + axis * ((lo + hi) * 0.5);
                let opening = DetectedOpening {
                    kind,
                    position: Point3::new(center.x, floor, center.y),
                    width: hi - lo,
                    bottom: 0.0,
                    top,
                    wall_normal: Vector3::new(a.normal.x, 0.0, a.normal.y),
                    confidence: GAP_OPENING_CONFIDENCE,
                    confirmed: false,
                    source: OpeningSource::Gap(left, right),
                };
                if stats.record_opening(opening) {
                    recorded += 1;
                }
            }
        }
        recorded
    }

    fn collinear(&self, a: &WallSegment, b: &WallSegment) -> bool {
        a.normal.dot(&b.normal).abs() > self.config.merge_normal_dot
            && a.line_distance(&b.start) < self.config.merge_gap
            && a.line_distance(&b.end) < self.config.merge_gap
    }

    /// Interval along `a` between `a` and a collinear `b`, if it is a
    /// plausible opening width
    fn gap_between(&self, a: &WallSegment, b: &WallSegment) -> Option<(f64, f64)> {
        if !self.collinear(a, b) {
            return None;
        }
        let (b_lo, b_hi) = projected_interval(a, b);
        let (lo, hi) = if b_lo >= a.length() {
            (a.length(), b_lo)
        } else if b_hi <= 0.0 {
            (b_hi, 0.0)
        } else {
            return None;
        };
        let width = hi - lo;
        (width >= self.config.merge_gap && width <= self.config.max_gap_width).then_some((lo, hi))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn segments(&self) -> impl Iterator<Item = (SegmentKey, &WallSegment)> {
        self.segments.iter()
    }

    pub fn segment(&self, key: SegmentKey) -> Option<&WallSegment> {
        self.segments.get(key)
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn header_walls(&self) -> impl Iterator<Item = &WallSegment> {
        self.headers.iter().map(|(_, s)| s)
    }

    pub fn reset(&mut self) {
        self.segments.clear();
        self.observations.clear();
        self.headers.clear();
    }
}

/// Plan segment spanned by world points along the wall's horizontal axis.
///
/// `None` when the extent is shorter than `min_length`.
fn plan_segment(world: &[Point3<f64>], facing: Vector2<f64>, min_length: f64) -> Option<WallSegment> {
    let axis = Vector2::new(facing.y, -facing.x);
    let (mut t_min, mut t_max, mut depth) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    for v in world {
        let p = Vector2::new(v.x, v.z);
        let t = p.dot(&axis);
        t_min = t_min.min(t);
        t_max = t_max.max(t);
        depth += p.dot(&facing);
    }
    depth /= world.len() as f64;
    if !(t_max - t_min >= min_length) {
        return None;
    }

    let base = facing * depth;
    Some(WallSegment {
        start: Point2::from(base + axis * t_min),
        end: Point2::from(base + axis * t_max),
        normal: facing,
        height: 0.0,
        bottom: 0.0,
        openings: Vec::new(),
        fragments: Vec::new(),
    })
}

/// World-space opening to an interval along `segment`
fn wall_relative(segment: &WallSegment, opening: &DetectedOpening) -> Option<WallOpening> {
    let center = segment.offset_of(&opening.plan());
    WallOpening {
        kind: opening.kind,
        start_offset: center - opening.width * 0.5,
        width: opening.width,
        bottom: opening.bottom,
        top: opening.top,
    }
    .clamped(segment.length())
}

/// `b`'s endpoints projected on `a`'s axis, sorted
fn projected_interval(a: &WallSegment, b: &WallSegment) -> (f64, f64) {
    let t0 = a.offset_of(&b.start);
    let t1 = a.offset_of(&b.end);
    (t0.min(t1), t0.max(t1))
}

/// Distance between the extents of two segments along `a`; zero when they
/// overlap
fn interval_gap(a: &WallSegment, b: &WallSegment) -> f64 {
    let (lo, hi) = projected_interval(a, b);
    (lo - a.length()).max(-hi).max(0.0)
}

/// Whether `s` projected on `a` overlaps the open interval `(lo, hi)`
fn overlaps(a: &WallSegment, s: &WallSegment, lo: f64, hi: f64) -> bool {
    let (s_lo, s_hi) = projected_interval(a, s);
    s_lo < hi && s_hi > lo
}

/// Merge two collinear segments.
///
/// The result lies on `a`'s line with `a`'s facing and spans the union of
/// both extents projected onto it. Openings are carried over and unioned.
pub fn merge_segments(a: &WallSegment, b: &WallSegment) -> WallSegment {
    let axis = a.direction();
    let (b_lo, b_hi) = projected_interval(a, b);
    let lo = b_lo.min(0.0);
    let hi = b_hi.max(a.length());

    let start = a.start + axis * lo;
    let end = a.start + axis * hi;
    let length = hi - lo;

    let mut openings: Vec<WallOpening> = a
        .openings
        .iter()
        .map(|o| WallOpening {
            start_offset: o.start_offset - lo,
            ..*o
        })
        .collect();

    let b_start = a.offset_of(&b.start) - lo;
    let same_direction = b.direction().dot(&axis) >= 0.0;
    openings.extend(b.openings.iter().map(|o| WallOpening {
        start_offset: if same_direction {
            b_start + o.start_offset
        } else {
            b_start - o.end_offset()
        },
        ..*o
    }));
    let mut openings: Vec<WallOpening> = openings.into_iter().filter_map(|o| o.clamped(length)).collect();
    merge_openings(&mut openings);

    let bottom = a.bottom.min(b.bottom);
    let top = a.top().max(b.top());

    let mut fragments = a.fragments.clone();
    for id in &b.fragments {
        if !fragments.contains(id) {
            fragments.push(*id);
        }
    }

    WallSegment {
        start,
        end,
        normal: a.normal,
        height: top - bottom,
        bottom,
        openings,
        fragments,
    }
}
