// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-scan accumulator
//!
//! One `ScanStatistics` exists per active scan. It is passed explicitly to
//! every stage; the classifier and room builder write to it, the
//! reconstructor and simplifier only read. `Clone` gives the immutable
//! snapshot handed to off-thread reconstruction.

use crate::config::ClassifierConfig;
use crate::fragment::FragmentId;
use crate::height::HeightEstimator;
use crate::surface::SurfaceType;
use crate::types::{CeilingProtrusion, DetectedEdge, DetectedOpening, OpeningSource};
use nalgebra::Point3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// What one fragment added to the running totals
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentContribution {
    pub area_by_type: [f64; SurfaceType::COUNT],
    pub vertex_count: usize,
}

impl Default for FragmentContribution {
    fn default() -> Self {
        Self {
            area_by_type: [0.0; SurfaceType::COUNT],
            vertex_count: 0,
        }
    }
}

/// Running statistics of one scan
#[derive(Debug, Clone)]
pub struct ScanStatistics {
    floor: HeightEstimator,
    ceiling: HeightEstimator,
    contributions: FxHashMap<FragmentId, FragmentContribution>,
    protrusions: Vec<CeilingProtrusion>,
    edges: Vec<DetectedEdge>,
    doors: Vec<DetectedOpening>,
    windows: Vec<DetectedOpening>,
    confirmed_corners: Vec<Point3<f64>>,
    max_edges: usize,
    dedup_distance: f64,
}

impl ScanStatistics {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            floor: HeightEstimator::new(
                config.height_sample_window,
                config.min_height_samples,
                config.floor_percentile,
            ),
            ceiling: HeightEstimator::new(
                config.height_sample_window,
                config.min_height_samples,
                config.ceiling_percentile,
            ),
            contributions: FxHashMap::default(),
            protrusions: Vec::new(),
            edges: Vec::new(),
            doors: Vec::new(),
            windows: Vec::new(),
            confirmed_corners: Vec::new(),
            max_edges: config.max_edges,
            dedup_distance: config.opening_dedup_distance,
        }
    }

    // ------------------------------------------------------------------
    // Heights
    // ------------------------------------------------------------------

    pub fn add_floor_sample(&mut self, y: f64) {
        self.floor.push(y);
    }

    pub fn add_ceiling_sample(&mut self, y: f64) {
        self.ceiling.push(y);
    }

    #[inline]
    pub fn floor_height(&self) -> Option<f64> {
        self.floor.estimate()
    }

    #[inline]
    pub fn ceiling_height(&self) -> Option<f64> {
        self.ceiling.estimate()
    }

    /// Both heights known and in the right order
    pub fn is_calibrated(&self) -> bool {
        self.room_height().is_some()
    }

    /// Ceiling minus floor, once calibrated
    pub fn room_height(&self) -> Option<f64> {
        match (self.floor_height(), self.ceiling_height()) {
            (Some(floor), Some(ceiling)) if floor < ceiling => Some(ceiling - floor),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Per-fragment contributions
    // ------------------------------------------------------------------

    /// Record a fragment's totals, replacing any earlier version of it
    pub fn record_contribution(&mut self, id: FragmentId, contribution: FragmentContribution) {
        self.contributions.insert(id, contribution);
    }

    pub fn contribution(&self, id: FragmentId) -> Option<&FragmentContribution> {
        self.contributions.get(&id)
    }

    /// Drop everything tied to a fragment.
    ///
    /// Height samples stay; the estimators only ever see a bounded window.
    pub fn remove_fragment(&mut self, id: FragmentId) {
        self.contributions.remove(&id);
        self.edges.retain(|e| e.fragment != id);
        self.remove_protrusion(id);
        self.remove_openings_from(id);
    }

    pub fn total_area(&self, surface_type: SurfaceType) -> f64 {
        self.contributions
            .values()
            .map(|c| c.area_by_type[surface_type.index()])
            .sum()
    }

    pub fn total_vertices(&self) -> usize {
        self.contributions.values().map(|c| c.vertex_count).sum()
    }

    #[inline]
    pub fn fragment_count(&self) -> usize {
        self.contributions.len()
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Replace a fragment's edges and keep the sharpest `max_edges` overall
    pub fn record_edges(&mut self, id: FragmentId, edges: impl IntoIterator<Item = DetectedEdge>) {
        self.edges.retain(|e| e.fragment != id);
        self.edges.extend(edges);
        self.edges
            .sort_by(|a, b| b.dihedral_deg.total_cmp(&a.dihedral_deg));
        self.edges.truncate(self.max_edges);
    }

    #[inline]
    pub fn edges(&self) -> &[DetectedEdge] {
        &self.edges
    }

    // ------------------------------------------------------------------
    // Protrusions
    // ------------------------------------------------------------------

    pub fn record_protrusion(&mut self, protrusion: CeilingProtrusion) {
        match self
            .protrusions
            .iter_mut()
            .find(|p| p.fragment == protrusion.fragment)
        {
            Some(existing) => *existing = protrusion,
            None => self.protrusions.push(protrusion),
        }
    }

    pub fn remove_protrusion(&mut self, id: FragmentId) {
        self.protrusions.retain(|p| p.fragment != id);
    }

    #[inline]
    pub fn protrusions(&self) -> &[CeilingProtrusion] {
        &self.protrusions
    }

    // ------------------------------------------------------------------
    // Openings
    // ------------------------------------------------------------------

    /// Record an inferred opening unless one is already known nearby.
    ///
    /// A re-observation from the same source updates the earlier record.
    /// Returns whether anything changed.
    pub fn record_opening(&mut self, opening: DetectedOpening) -> bool {
        let dedup = self.dedup_distance;
        let list = self.openings_mut(&opening);

        let nearby = list
            .iter()
            .position(|o| (o.position - opening.position).norm() < dedup);
        match nearby {
            Some(i) if !list[i].confirmed && list[i].source != OpeningSource::External && list[i].source == opening.source => {
                list[i] = opening;
                true
            }
            Some(_) => false,
            None => {
                tracing::debug!(
                    kind = opening.kind.as_str(),
                    x = opening.position.x,
                    z = opening.position.z,
                    width = opening.width,
                    "opening recorded"
                );
                list.push(opening);
                true
            }
        }
    }

    /// Insert an externally confirmed opening, displacing inferred ones nearby
    pub fn confirm_opening(&mut self, mut opening: DetectedOpening) {
        let dedup = self.dedup_distance;
        opening.confirmed = true;
        opening.confidence = 1.0;

        self.doors
            .retain(|o| o.confirmed || (o.position - opening.position).norm() >= dedup);
        self.windows
            .retain(|o| o.confirmed || (o.position - opening.position).norm() >= dedup);
        self.openings_mut(&opening).push(opening);
    }

    /// Forget inferred openings that depend on a fragment, including gaps
    /// it bounds
    pub fn remove_openings_from(&mut self, id: FragmentId) {
        self.doors.retain(|o| o.confirmed || !o.source.involves(id));
        self.windows.retain(|o| o.confirmed || !o.source.involves(id));
    }

    /// Forget every opening inferred from gaps between segments
    pub fn remove_gap_openings(&mut self) {
        self.doors.retain(|o| o.confirmed || !o.source.is_gap());
        self.windows.retain(|o| o.confirmed || !o.source.is_gap());
    }

    fn openings_mut(&mut self, opening: &DetectedOpening) -> &mut Vec<DetectedOpening> {
        if opening.kind.is_door_like() {
            &mut self.doors
        } else {
            &mut self.windows
        }
    }

    /// Doors, glass doors and pass-throughs
    #[inline]
    pub fn doors(&self) -> &[DetectedOpening] {
        &self.doors
    }

    #[inline]
    pub fn windows(&self) -> &[DetectedOpening] {
        &self.windows
    }

    pub fn openings(&self) -> impl Iterator<Item = &DetectedOpening> {
        self.doors.iter().chain(self.windows.iter())
    }

    // ------------------------------------------------------------------
    // Corners
    // ------------------------------------------------------------------

    pub fn confirm_corner(&mut self, point: Point3<f64>) {
        tracing::debug!(x = point.x, z = point.z, "corner confirmed");
        self.confirmed_corners.push(point);
    }

    #[inline]
    pub fn confirmed_corners(&self) -> &[Point3<f64>] {
        &self.confirmed_corners
    }

    /// Start a new scan
    pub fn reset(&mut self) {
        self.floor.clear();
        self.ceiling.clear();
        self.contributions.clear();
        self.protrusions.clear();
        self.edges.clear();
        self.doors.clear();
        self.windows.clear();
        self.confirmed_corners.clear();
    }

    /// Snapshot for display. Wall and inferred corner counts are filled in
    /// by whoever owns the room builder.
    pub fn summary(&self) -> ScanSummary {
        let room_height = self.room_height();
        let deepest = self
            .protrusions
            .iter()
            .map(|p| p.depth)
            .fold(0.0_f64, f64::max);

        ScanSummary {
            floor_height: self.floor_height(),
            ceiling_height: self.ceiling_height(),
            room_height,
            clearance: room_height.map(|h| h - deepest),
            wall_count: 0,
            door_count: self.doors.len(),
            window_count: self.windows.len(),
            corner_count: self.confirmed_corners.len(),
            protrusion_count: self.protrusions.len(),
            fragment_count: self.contributions.len(),
            vertex_count: self.total_vertices(),
            total_area: self.contributions.values().flat_map(|c| c.area_by_type).sum(),
        }
    }
}

impl Default for ScanStatistics {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

/// Short status of a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub floor_height: Option<f64>,
    pub ceiling_height: Option<f64>,
    pub room_height: Option<f64>,
    /// Room height under the deepest ceiling protrusion
    pub clearance: Option<f64>,
    pub wall_count: usize,
    pub door_count: usize,
    pub window_count: usize,
    pub corner_count: usize,
    pub protrusion_count: usize,
    pub fragment_count: usize,
    pub vertex_count: usize,
    pub total_area: f64,
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.room_height, self.clearance) {
            (Some(height), Some(clearance)) => {
                write!(f, "Room height {height:.2} m, clearance {clearance:.2} m")?
            }
            _ => write!(f, "Calibrating")?,
        }
        write!(
            f,
            ", {}, {}, {}, {}",
            plural(self.wall_count, "wall"),
            plural(self.door_count, "door"),
            plural(self.window_count, "window"),
            plural(self.corner_count, "corner"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{EdgeType, OpeningType, ProtrusionType};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use roomscan_geometry::Aabb3;

    fn calibrated() -> ScanStatistics {
        let mut stats = ScanStatistics::default();
        for _ in 0..10 {
            stats.add_floor_sample(0.0);
            stats.add_ceiling_sample(2.5);
        }
        stats
    }

    fn door_at(x: f64, source: OpeningSource) -> DetectedOpening {
        DetectedOpening {
            kind: OpeningType::Door,
            position: Point3::new(x, 0.0, 0.0),
            width: 0.9,
            bottom: 0.0,
            top: 2.1,
            wall_normal: Vector3::z(),
            confidence: 0.8,
            confirmed: false,
            source,
        }
    }

    fn edge(fragment: u64, dihedral_deg: f64) -> DetectedEdge {
        DetectedEdge {
            start: Point3::origin(),
            end: Point3::new(1.0, 0.0, 0.0),
            edge_type: EdgeType::Other,
            dihedral_deg,
            fragment: FragmentId(fragment),
        }
    }

    #[test]
    fn test_calibration_requires_ordered_heights() {
        let mut stats = ScanStatistics::default();
        assert!(!stats.is_calibrated());
        for _ in 0..10 {
            stats.add_floor_sample(3.0);
            stats.add_ceiling_sample(1.0);
        }
        assert!(!stats.is_calibrated());
        assert!(calibrated().is_calibrated());
        assert_relative_eq!(calibrated().room_height().unwrap(), 2.5);
    }

    #[test]
    fn test_contribution_is_replaced() {
        let mut stats = ScanStatistics::default();
        let mut c = FragmentContribution {
            vertex_count: 10,
            ..Default::default()
        };
        c.area_by_type[SurfaceType::Wall.index()] = 4.0;
        stats.record_contribution(FragmentId(1), c.clone());
        c.vertex_count = 6;
        c.area_by_type[SurfaceType::Wall.index()] = 3.0;
        stats.record_contribution(FragmentId(1), c);

        assert_eq!(stats.total_vertices(), 6);
        assert_relative_eq!(stats.total_area(SurfaceType::Wall), 3.0);

        stats.remove_fragment(FragmentId(1));
        assert_eq!(stats.total_vertices(), 0);
        assert_relative_eq!(stats.total_area(SurfaceType::Wall), 0.0);
    }

    #[test]
    fn test_edges_keep_sharpest() {
        let mut stats = ScanStatistics::new(&ClassifierConfig {
            max_edges: 3,
            ..Default::default()
        });
        stats.record_edges(FragmentId(1), [edge(1, 10.0), edge(1, 90.0)]);
        stats.record_edges(FragmentId(2), [edge(2, 45.0), edge(2, 70.0)]);
        let angles: Vec<f64> = stats.edges().iter().map(|e| e.dihedral_deg).collect();
        assert_eq!(angles, vec![90.0, 70.0, 45.0]);

        // Re-recording a fragment replaces its edges
        stats.record_edges(FragmentId(1), [edge(1, 5.0)]);
        let angles: Vec<f64> = stats.edges().iter().map(|e| e.dihedral_deg).collect();
        assert_eq!(angles, vec![70.0, 45.0, 5.0]);
    }

    #[test]
    fn test_openings_are_deduplicated() {
        let mut stats = ScanStatistics::default();
        assert!(stats.record_opening(door_at(1.0, OpeningSource::Fragment(FragmentId(1)))));
        assert!(!stats.record_opening(door_at(1.3, OpeningSource::Fragment(FragmentId(2)))));
        // Same source updates in place
        assert!(stats.record_opening(door_at(1.2, OpeningSource::Fragment(FragmentId(1)))));
        assert_eq!(stats.doors().len(), 1);
        assert_relative_eq!(stats.doors()[0].position.x, 1.2);
        assert!(stats.record_opening(door_at(2.0, OpeningSource::External)));
        assert_eq!(stats.doors().len(), 2);
    }

    #[test]
    fn test_gap_openings_follow_their_fragments() {
        let gap = OpeningSource::Gap(FragmentId(1), FragmentId(2));
        let mut stats = ScanStatistics::default();
        stats.record_opening(door_at(1.0, gap));
        stats.record_opening(door_at(3.0, OpeningSource::Fragment(FragmentId(3))));

        stats.remove_openings_from(FragmentId(2));
        assert_eq!(stats.doors().len(), 1);
        assert_eq!(stats.doors()[0].source, OpeningSource::Fragment(FragmentId(3)));

        stats.record_opening(door_at(1.0, gap));
        stats.confirm_opening(door_at(5.0, OpeningSource::External));
        stats.remove_gap_openings();
        let sources: Vec<_> = stats.doors().iter().map(|o| o.source).collect();
        assert_eq!(sources, vec![OpeningSource::Fragment(FragmentId(3)), OpeningSource::External]);
    }

    #[test]
    fn test_confirmed_opening_takes_precedence() {
        let mut stats = ScanStatistics::default();
        stats.record_opening(door_at(1.0, OpeningSource::Fragment(FragmentId(1))));
        stats.confirm_opening(door_at(1.2, OpeningSource::External));
        assert_eq!(stats.doors().len(), 1);
        assert!(stats.doors()[0].confirmed);
        assert!(!stats.record_opening(door_at(1.1, OpeningSource::Fragment(FragmentId(1)))));
        assert!(stats.doors()[0].confirmed);
    }

    #[test]
    fn test_summary_reports_clearance() {
        let mut stats = calibrated();
        stats.record_protrusion(CeilingProtrusion {
            fragment: FragmentId(9),
            kind: ProtrusionType::Beam,
            bounds: Aabb3::empty(),
            depth: 0.3,
        });
        stats.record_opening(door_at(1.0, OpeningSource::External));
        let summary = stats.summary();
        assert_relative_eq!(summary.clearance.unwrap(), 2.2);
        assert_eq!(
            summary.to_string(),
            "Room height 2.50 m, clearance 2.20 m, 0 walls, 1 door, 0 windows, 0 corners"
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut stats = calibrated();
        stats.confirm_corner(Point3::origin());
        stats.reset();
        assert!(!stats.is_calibrated());
        assert!(stats.confirmed_corners().is_empty());
        assert_eq!(stats.summary().to_string(), "Calibrating, 0 walls, 0 doors, 0 windows, 0 corners");
    }
}
