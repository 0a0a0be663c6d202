// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scan session: the entry point capture collaborators talk to
//!
//! Owns every pipeline stage and the shared statistics. Each call runs to
//! completion on the calling thread; reconstruction can instead be run on a
//! worker from a [`ScanSession::snapshot`].

use crate::classifier::SurfaceClassifier;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::fragment::{FragmentId, MeshFragment};
use crate::protrusion::detect_protrusion;
use crate::reconstructor::WallReconstructor;
use crate::room_builder::{RoomBuilder, VerticalSurfaceOutcome};
use crate::simplifier::RoomSimplifier;
use crate::statistics::{ScanStatistics, ScanSummary};
use crate::surface::{OpeningType, SurfaceType};
use crate::types::{
    ClassifiedFragment, ClassifiedSurface, DetectedOpening, OpeningSource, RoomCorner, RoomMesh, SimplifiedRoom,
    WallSegment,
};
use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::FxHashMap;

/// What happened to a delivered fragment
#[derive(Debug, Clone)]
pub struct FragmentReport {
    pub surface: ClassifiedSurface,
    /// Set when the fragment went through the room builder
    pub wall: Option<VerticalSurfaceOutcome>,
    /// Malformed faces that were skipped
    pub skipped_faces: usize,
}

/// Incremental room scan
#[derive(Debug, Clone)]
pub struct ScanSession {
    config: ScanConfig,
    classifier: SurfaceClassifier,
    stats: ScanStatistics,
    room_builder: RoomBuilder,
    reconstructor: WallReconstructor,
    simplifier: RoomSimplifier,
    fragments: FxHashMap<FragmentId, ClassifiedFragment>,
    /// Fragment ids in first-arrival order
    arrival: Vec<FragmentId>,
}

impl ScanSession {
    pub fn new(config: ScanConfig) -> Result<Self> {
        let stats = ScanStatistics::new(&config.classifier);
        Self::with_statistics(config, stats)
    }

    /// Resume from previously accumulated statistics
    pub fn with_statistics(config: ScanConfig, stats: ScanStatistics) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: SurfaceClassifier::new(config.classifier.clone()),
            room_builder: RoomBuilder::new(config.room.clone(), config.classifier.clone()),
            reconstructor: WallReconstructor::new(config.reconstruction.clone()),
            simplifier: RoomSimplifier::new(config.simplifier.clone(), config.reconstruction.clone()),
            stats,
            fragments: FxHashMap::default(),
            arrival: Vec::new(),
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Classify a fragment and feed it to the downstream stages.
    ///
    /// A fragment id seen before is treated as an update: its previous
    /// contribution is replaced, never added to.
    pub fn on_fragment_added(&mut self, fragment: &MeshFragment) -> FragmentReport {
        let id = fragment.id;
        let was_calibrated = self.stats.is_calibrated();

        let classification = self.classifier.classify_mesh(fragment, &mut self.stats);
        let surface = classification.surface.clone();

        let holds_protrusion = surface.surface_type == SurfaceType::CeilingProtrusion
            || classification.protrusion_share >= self.classifier.config().protrusion_min_share;
        if holds_protrusion {
            match detect_protrusion(id, &classification.protrusion_vertices, &self.stats, self.classifier.config()) {
                Some(protrusion) => self.stats.record_protrusion(protrusion),
                None => self.stats.remove_protrusion(id),
            }
        } else {
            self.stats.remove_protrusion(id);
        }

        if !self.fragments.contains_key(&id) {
            self.arrival.push(id);
        }
        self.fragments.insert(
            id,
            ClassifiedFragment {
                id,
                world_vertices: classification.world_vertices,
                surface: surface.clone(),
            },
        );

        let wall = if !was_calibrated && self.stats.is_calibrated() {
            tracing::info!(
                floor = self.stats.floor_height(),
                ceiling = self.stats.ceiling_height(),
                "room heights calibrated"
            );
            self.replay_walls();
            self.room_builder.segment_of(id).map(VerticalSurfaceOutcome::Wall)
        } else {
            self.route_vertical(id)
        };

        self.reconcile_gaps();

        FragmentReport {
            surface,
            wall,
            skipped_faces: classification.skipped_faces,
        }
    }

    /// Same as [`ScanSession::on_fragment_added`]; the latest version of a
    /// fragment wins
    #[inline]
    pub fn on_fragment_updated(&mut self, fragment: &MeshFragment) -> FragmentReport {
        self.on_fragment_added(fragment)
    }

    /// Forget a fragment; returns whether it was known
    pub fn on_fragment_removed(&mut self, id: FragmentId) -> bool {
        let known = self.fragments.remove(&id).is_some();
        self.arrival.retain(|fid| *fid != id);
        self.stats.remove_fragment(id);
        self.room_builder.remove_fragment(id);
        self.reconcile_gaps();
        if known {
            tracing::debug!(fragment = %id, "fragment removed");
        }
        known
    }

    fn reconcile_gaps(&mut self) {
        let inferred = self.room_builder.reconcile_gaps(&mut self.stats);
        if inferred > 0 {
            tracing::trace!(inferred, "openings inferred from wall gaps");
        }
    }

    /// Wall-dominant, and not a protrusion whose vertical sides outweigh its
    /// underside
    fn is_wall(&self, fragment: &ClassifiedFragment) -> bool {
        fragment.surface.surface_type == SurfaceType::Wall
            && !self.stats.protrusions().iter().any(|p| p.fragment == fragment.id)
    }

    /// Send a cached fragment through the room builder, or take it out of
    /// the builder when it is no longer a wall
    fn route_vertical(&mut self, id: FragmentId) -> Option<VerticalSurfaceOutcome> {
        let fragment = self.fragments.get(&id)?;
        if !self.is_wall(fragment) {
            if self.room_builder.remove_fragment(id) {
                self.stats.remove_openings_from(id);
            }
            return None;
        }

        let outcome = self.room_builder.process_vertical_surface(
            id,
            &fragment.world_vertices,
            &fragment.surface.average_normal,
            &Matrix4::identity(),
            &mut self.stats,
        );
        tracing::trace!(fragment = %id, ?outcome, "vertical surface processed");
        Some(outcome)
    }

    /// Walls that arrived before calibration are processed once heights
    /// are known
    fn replay_walls(&mut self) {
        let walls: Vec<FragmentId> = self
            .arrival
            .iter()
            .copied()
            .filter(|id| self.fragments.get(id).is_some_and(|f| self.is_wall(f)))
            .collect();
        for id in walls {
            self.route_vertical(id);
        }
    }

    /// Corner supplied from outside the pipeline
    pub fn confirm_corner(&mut self, point: Point3<f64>) {
        self.stats.confirm_corner(point);
    }

    /// Opening supplied from outside the pipeline, sized to the usual
    /// dimensions of its kind
    pub fn confirm_opening(&mut self, kind: OpeningType, point: Point3<f64>, wall_normal: Vector3<f64>) {
        let (width, bottom, top) = nominal_size(kind);
        let floor = self.stats.floor_height().unwrap_or(point.y);
        self.stats.confirm_opening(DetectedOpening {
            kind,
            position: Point3::new(point.x, floor, point.z),
            width,
            bottom,
            top,
            wall_normal,
            confidence: 1.0,
            confirmed: true,
            source: OpeningSource::External,
        });
    }

    #[inline]
    pub fn statistics(&self) -> &ScanStatistics {
        &self.stats
    }

    /// Detached copy of the statistics for reconstruction off the capture
    /// thread
    pub fn snapshot(&self) -> ScanStatistics {
        self.stats.clone()
    }

    #[inline]
    pub fn room_builder(&self) -> &RoomBuilder {
        &self.room_builder
    }

    /// Corners inferred from the current wall segments
    pub fn inferred_corners(&self) -> Vec<RoomCorner> {
        self.room_builder.corners()
    }

    pub fn summary(&self) -> ScanSummary {
        let mut summary = self.stats.summary();
        summary.wall_count = self.room_builder.segment_count();
        summary.corner_count = self.reconstructor.resolve_corners(&self.stats, &self.inferred_corners()).len();
        summary
    }

    /// Idealized walls from the current corners and openings
    pub fn reconstructed_walls(&self) -> Vec<WallSegment> {
        self.reconstructor.reconstruct(&self.stats, &self.inferred_corners())
    }

    /// Watertight idealized room mesh; empty until three corners are known
    pub fn reconstruct(&self) -> RoomMesh {
        self.reconstructor.reconstruct_mesh(&self.stats, &self.inferred_corners())
    }

    pub fn simplified_room(&self) -> SimplifiedRoom {
        let fragments = self.arrival.iter().filter_map(|id| self.fragments.get(id));
        self.simplifier.simplify(fragments, &self.stats)
    }

    pub fn simplified_mesh(&self) -> RoomMesh {
        let room = self.simplified_room();
        self.simplifier.build_mesh(&room, self.config.reconstruction.double_sided)
    }

    /// Drop all accumulated state and start a new scan
    pub fn reset(&mut self) {
        self.stats.reset();
        self.room_builder.reset();
        self.fragments.clear();
        self.arrival.clear();
        tracing::info!("scan reset");
    }
}

/// Width, bottom and top of a typical opening of each kind
fn nominal_size(kind: OpeningType) -> (f64, f64, f64) {
    match kind {
        OpeningType::Door => (0.9, 0.0, 2.1),
        OpeningType::GlassDoor => (1.8, 0.0, 2.1),
        OpeningType::PassThrough => (1.0, 0.0, 2.1),
        OpeningType::Window => (1.2, 0.9, 2.1),
    }
}
