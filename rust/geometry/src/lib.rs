// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RoomScan Geometry
//!
//! Mesh buffers, bounding boxes, fragment transforms and floor-plan polygon
//! utilities shared by the room reconstruction pipeline. Built on nalgebra.

pub mod bounds;
pub mod error;
pub mod mesh;
pub mod polygon;
pub mod transform;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use bounds::{Aabb2, Aabb3};
pub use error::{Error, Result};
pub use mesh::Mesh;
pub use polygon::{centroid, closest_point_on_segment, convex_hull, order_by_polar_angle, signed_area};
pub use transform::{transform_normal, transform_point};
pub use triangulation::fan_from_centroid;
