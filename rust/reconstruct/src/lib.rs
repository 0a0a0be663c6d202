// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RoomScan Reconstruction
//!
//! Turns a stream of irregular scanned mesh fragments into a clean room
//! model: per-face surface classification with running floor and ceiling
//! estimates, wall segments and corners from vertical surfaces, door and
//! window detection, and idealized watertight room geometry.
//!
//! ```text
//! MeshFragment -> SurfaceClassifier -> ScanStatistics
//!                        |                   |
//!                   RoomBuilder  ------> WallReconstructor -> RoomMesh
//!                        |
//!               (cached fragments) ----> RoomSimplifier -> SimplifiedRoom
//! ```
//!
//! [`ScanSession`] wires the stages together.

pub mod classifier;
pub mod config;
pub mod edges;
pub mod error;
pub mod fragment;
pub mod height;
pub mod openings;
pub mod protrusion;
pub mod reconstructor;
pub mod room_builder;
pub mod session;
pub mod simplifier;
pub mod statistics;
pub mod surface;
pub mod synthetic;
pub mod types;

pub use classifier::{classify_surface, FragmentClassification, SurfaceClassifier};
pub use config::{ClassifierConfig, ReconstructionConfig, RoomBuilderConfig, ScanConfig, SimplifierConfig};
pub use error::{Error, Result};
pub use fragment::{FragmentId, MeshFragment};
pub use height::HeightEstimator;
pub use reconstructor::WallReconstructor;
pub use room_builder::{RoomBuilder, VerticalSurfaceOutcome};
pub use session::{FragmentReport, ScanSession};
pub use simplifier::RoomSimplifier;
pub use statistics::{ScanStatistics, ScanSummary};
pub use surface::{EdgeType, OpeningType, ProtrusionType, SurfaceType};
pub use types::{
    CeilingProtrusion, ClassifiedFragment, ClassifiedSurface, DetectedEdge, DetectedOpening, OpeningSource,
    RoomCorner, RoomMesh, SegmentKey, SimplifiedProtrusion, SimplifiedRoom, WallOpening, WallSegment,
};
