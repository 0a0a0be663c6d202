// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Heuristic thresholds for every pipeline stage, in one place.
//!
//! All distances are meters, angles are degrees unless the field name says
//! otherwise. Every struct is `serde`-serializable so a scan can be tuned from
//! a JSON file, and every field has a default so partial files are accepted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the whole reconstruction pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub classifier: ClassifierConfig,
    pub room: RoomBuilderConfig,
    pub reconstruction: ReconstructionConfig,
    pub simplifier: SimplifierConfig,
}

impl ScanConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ScanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Reject threshold combinations the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()?;
        self.room.validate()?;
        self.reconstruction.validate()?;
        self.simplifier.validate()
    }
}

fn check(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::InvalidConfig(message.to_string()))
    }
}

fn check_range(range: [f64; 2], name: &str) -> Result<()> {
    check(
        range[0] >= 0.0 && range[0] <= range[1],
        &format!("{name} must be an ascending non-negative [min, max] pair"),
    )
}

/// Surface classifier thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// `normal.y` above this is floor, below its negation is ceiling.
    /// Default: 0.9 (~25 degrees from vertical)
    pub horizontal_threshold: f64,

    /// `|normal.y|` below this is wall. Default: 0.3
    pub wall_threshold: f64,

    /// Downward faces deeper than this below the ceiling may be protrusions.
    /// Default: 0.05
    pub protrusion_min_depth: f64,

    /// Downward faces deeper than this below the ceiling are not protrusions.
    /// Default: 1.0
    pub protrusion_max_depth: f64,

    /// Share of a fragment's area that must face down below the ceiling for
    /// the fragment to hold a protrusion, even when its sides dominate.
    /// Default: 0.25
    pub protrusion_min_share: f64,

    /// Number of recent height samples kept per estimator. Default: 100
    pub height_sample_window: usize,

    /// Samples required before an estimate is reported. Default: 10
    pub min_height_samples: usize,

    /// Percentile of the window used as floor height. Default: 0.25
    pub floor_percentile: f64,

    /// Percentile of the window used as ceiling height. Default: 0.75
    pub ceiling_percentile: f64,

    /// Dihedral angle above which an edge between same-typed faces is recorded.
    /// Default: 60
    pub edge_angle_threshold_deg: f64,

    /// Edges retained across the scan, ranked by dihedral angle. Default: 50
    pub max_edges: usize,

    /// Occupancy grid cell size for opening detection. Default: 0.10
    pub occupancy_cell_size: f64,

    /// Empty rectangles smaller than this many cells per side are ignored. Default: 2
    pub min_gap_cells: usize,

    /// Max distance from the floor for a gap to count as a door. Default: 0.05
    pub door_floor_tolerance: f64,

    /// Door width range. Default: [0.6, 1.5]
    pub door_width: [f64; 2],

    /// Door height range. Default: [1.8, 2.5]
    pub door_height: [f64; 2],

    /// Minimum sill height for a window. Default: 0.4
    pub window_min_sill: f64,

    /// Minimum window width and height. Default: 0.3
    pub window_min_size: f64,

    /// Openings closer than this to a recorded one are duplicates. Default: 0.5
    pub opening_dedup_distance: f64,

    /// Protrusions with at least this footprint are dropped ceilings. Default: 4.0 m²
    pub dropped_ceiling_min_area: f64,

    /// Long/short footprint ratio from which a protrusion is a beam. Default: 4.0
    pub beam_min_aspect: f64,

    /// Compact protrusions up to this footprint are fixtures. Default: 0.5 m²
    pub fixture_max_area: f64,

    /// Aspect ratio below which a small protrusion counts as compact. Default: 2.0
    pub fixture_max_aspect: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            horizontal_threshold: 0.9,
            wall_threshold: 0.3,
            protrusion_min_depth: 0.05,
            protrusion_max_depth: 1.0,
            protrusion_min_share: 0.25,
            height_sample_window: 100,
            min_height_samples: 10,
            floor_percentile: 0.25,
            ceiling_percentile: 0.75,
            edge_angle_threshold_deg: 60.0,
            max_edges: 50,
            occupancy_cell_size: 0.10,
            min_gap_cells: 2,
            door_floor_tolerance: 0.05,
            door_width: [0.6, 1.5],
            door_height: [1.8, 2.5],
            window_min_sill: 0.4,
            window_min_size: 0.3,
            opening_dedup_distance: 0.5,
            dropped_ceiling_min_area: 4.0,
            beam_min_aspect: 4.0,
            fixture_max_area: 0.5,
            fixture_max_aspect: 2.0,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<()> {
        check(
            self.horizontal_threshold > 0.0 && self.horizontal_threshold <= 1.0,
            "horizontal_threshold must be in (0, 1]",
        )?;
        check(
            self.wall_threshold > 0.0 && self.wall_threshold <= self.horizontal_threshold,
            "wall_threshold must be in (0, horizontal_threshold]",
        )?;
        check(
            self.protrusion_min_depth >= 0.0 && self.protrusion_min_depth < self.protrusion_max_depth,
            "protrusion depth range is inverted",
        )?;
        check(
            self.protrusion_min_share > 0.0 && self.protrusion_min_share <= 1.0,
            "protrusion_min_share must be in (0, 1]",
        )?;
        check(self.height_sample_window > 0, "height_sample_window must be positive")?;
        check(
            self.min_height_samples > 0 && self.min_height_samples <= self.height_sample_window,
            "min_height_samples must be in [1, height_sample_window]",
        )?;
        check(
            (0.0..=1.0).contains(&self.floor_percentile)
                && (0.0..=1.0).contains(&self.ceiling_percentile),
            "percentiles must be in [0, 1]",
        )?;
        check(self.occupancy_cell_size > 0.0, "occupancy_cell_size must be positive")?;
        check(self.min_gap_cells > 0, "min_gap_cells must be positive")?;
        check_range(self.door_width, "door_width")?;
        check_range(self.door_height, "door_height")
    }
}

/// Room builder thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomBuilderConfig {
    /// A wall must start within this height above the floor. Default: 0.15
    pub floor_contact_tolerance: f64,

    /// A wall must reach this fraction of the room height. Default: 0.85
    pub ceiling_reach_ratio: f64,

    /// Minimum normal dot product for two segments to merge. Default: 0.95
    pub merge_normal_dot: f64,

    /// Maximum endpoint gap (and lateral offset) for two segments to merge.
    /// Default: 0.3
    pub merge_gap: f64,

    /// Maximum `|dot|` of two normals for a corner. Default: 0.3
    pub corner_perpendicular_dot: f64,

    /// Endpoint distance under which two walls meet at a corner. Also the
    /// minimum segment length. Default: 0.3
    pub corner_snap_distance: f64,

    /// Gaps starting within this height above the floor touch the floor. Default: 0.1
    pub gap_floor_tolerance: f64,

    /// Minimum sill height for a segment-level window. Default: 0.5
    pub window_min_sill: f64,

    /// Gaps ending within this distance of the ceiling touch the ceiling. Default: 0.1
    pub ceiling_tolerance: f64,

    /// Door height range for segment-level gaps. Default: [1.8, 2.5]
    pub door_height: [f64; 2],

    /// Widest gap between two collinear segments still treated as an opening.
    /// Default: 3.0
    pub max_gap_width: f64,
}

impl Default for RoomBuilderConfig {
    fn default() -> Self {
        Self {
            floor_contact_tolerance: 0.15,
            ceiling_reach_ratio: 0.85,
            merge_normal_dot: 0.95,
            merge_gap: 0.3,
            corner_perpendicular_dot: 0.3,
            corner_snap_distance: 0.3,
            gap_floor_tolerance: 0.1,
            window_min_sill: 0.5,
            ceiling_tolerance: 0.1,
            door_height: [1.8, 2.5],
            max_gap_width: 3.0,
        }
    }
}

impl RoomBuilderConfig {
    fn validate(&self) -> Result<()> {
        check(
            self.ceiling_reach_ratio > 0.0 && self.ceiling_reach_ratio <= 1.0,
            "ceiling_reach_ratio must be in (0, 1]",
        )?;
        check(
            self.merge_normal_dot > 0.0 && self.merge_normal_dot <= 1.0,
            "merge_normal_dot must be in (0, 1]",
        )?;
        check(
            self.corner_perpendicular_dot > 0.0 && self.corner_perpendicular_dot < 1.0,
            "corner_perpendicular_dot must be in (0, 1)",
        )?;
        check(self.corner_snap_distance > 0.0, "corner_snap_distance must be positive")?;
        check_range(self.door_height, "room.door_height")
    }
}

/// Wall reconstructor thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Room height used when the ceiling is unknown or implausible. Default: 3.5
    pub default_room_height: f64,

    /// Calibrated rooms shorter than this fall back to the default. Default: 1.5
    pub min_room_height: f64,

    /// Confirmed corners suppress inferred ones within twice this. Default: 0.3
    pub corner_snap_distance: f64,

    /// Corners closer than this are averaged into one. Default: 0.15
    pub corner_merge_distance: f64,

    /// Shorter polygon edges produce no wall. Default: 0.3
    pub min_wall_length: f64,

    /// Openings farther than this from every wall are dropped. Default: 0.3
    pub opening_proximity: f64,

    /// Emit every face twice with opposite normals. Default: false
    pub double_sided: bool,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            default_room_height: 3.5,
            min_room_height: 1.5,
            corner_snap_distance: 0.3,
            corner_merge_distance: 0.15,
            min_wall_length: 0.3,
            opening_proximity: 0.3,
            double_sided: false,
        }
    }
}

impl ReconstructionConfig {
    fn validate(&self) -> Result<()> {
        check(self.default_room_height > 0.0, "default_room_height must be positive")?;
        check(self.corner_merge_distance >= 0.0, "corner_merge_distance must be non-negative")?;
        check(self.min_wall_length >= 0.0, "min_wall_length must be non-negative")
    }
}

/// Room simplifier thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifierConfig {
    /// Wall vertices within this height of the floor form the outline. Default: 0.2
    pub base_height_tolerance: f64,

    /// Snap grid for base points. Default: 0.10
    pub grid_size: f64,

    /// Edges shorter than this are collapsed. Default: 0.3
    pub min_wall_length: f64,

    /// Corners turning less than this are removed. Default: 10
    pub collinear_angle_deg: f64,

    /// Corners within this of 90 degrees are squared. Default: 15
    pub right_angle_tolerance_deg: f64,

    /// Non-adjacent corners closer than this merge. Default: 0.25
    pub corner_snap_distance: f64,

    /// Upper bound on simplification passes. Default: 10
    pub max_iterations: usize,
}

impl Default for SimplifierConfig {
    fn default() -> Self {
        Self {
            base_height_tolerance: 0.2,
            grid_size: 0.10,
            min_wall_length: 0.3,
            collinear_angle_deg: 10.0,
            right_angle_tolerance_deg: 15.0,
            corner_snap_distance: 0.25,
            max_iterations: 10,
        }
    }
}

impl SimplifierConfig {
    fn validate(&self) -> Result<()> {
        check(self.grid_size > 0.0, "grid_size must be positive")?;
        check(self.max_iterations > 0, "max_iterations must be positive")?;
        check(
            self.collinear_angle_deg >= 0.0 && self.collinear_angle_deg < 90.0,
            "collinear_angle_deg must be in [0, 90)",
        )
    }
}
