// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core data types shared by the pipeline stages

use crate::fragment::FragmentId;
use crate::surface::{EdgeType, OpeningType, ProtrusionType, SurfaceType};
use nalgebra::{Point2, Point3, Vector2, Vector3};
use roomscan_geometry::{Aabb3, Mesh};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Stable handle of a wall segment in the room builder's arena
    pub struct SegmentKey;
}

/// Aggregate classification of one fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSurface {
    /// Type covering the largest area
    pub surface_type: SurfaceType,
    /// Area-weighted average face normal (world space)
    pub average_normal: Vector3<f64>,
    pub area: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub bounds: Aabb3,
    /// Fraction of the area classified as `surface_type`
    pub confidence: f64,
}

impl ClassifiedSurface {
    /// Result for a fragment without a single usable face
    pub fn unknown() -> Self {
        Self {
            surface_type: SurfaceType::Unknown,
            average_normal: Vector3::zeros(),
            area: 0.0,
            min_y: 0.0,
            max_y: 0.0,
            bounds: Aabb3::empty(),
            confidence: 0.0,
        }
    }
}

/// Latest classified state of a fragment, cached by the session
#[derive(Debug, Clone)]
pub struct ClassifiedFragment {
    pub id: FragmentId,
    pub world_vertices: Vec<Point3<f64>>,
    pub surface: ClassifiedSurface,
}

/// A crease between two adjacent faces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedEdge {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    pub edge_type: EdgeType,
    /// Angle between the two face normals
    pub dihedral_deg: f64,
    pub fragment: FragmentId,
}

impl DetectedEdge {
    #[inline]
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }
}

/// Obstruction hanging below the ceiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CeilingProtrusion {
    pub fragment: FragmentId,
    pub kind: ProtrusionType,
    pub bounds: Aabb3,
    /// Distance from the ceiling down to the protrusion's underside
    pub depth: f64,
}

/// Where a detected opening came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpeningSource {
    /// Hole found inside one wall fragment
    Fragment(FragmentId),
    /// Gap between two collinear wall segments, by the fragments bounding it
    Gap(FragmentId, FragmentId),
    /// Supplied from outside the pipeline
    External,
}

impl OpeningSource {
    /// Whether the opening depends on `id` still being part of the scan
    pub fn involves(&self, id: FragmentId) -> bool {
        match *self {
            OpeningSource::Fragment(f) => f == id,
            OpeningSource::Gap(a, b) => a == id || b == id,
            OpeningSource::External => false,
        }
    }

    #[inline]
    pub fn is_gap(&self) -> bool {
        matches!(self, OpeningSource::Gap(..))
    }
}

/// Door or window observed in world space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedOpening {
    pub kind: OpeningType,
    /// Center of the opening's floor line
    pub position: Point3<f64>,
    pub width: f64,
    /// Height above the floor
    pub bottom: f64,
    /// Height above the floor
    pub top: f64,
    pub wall_normal: Vector3<f64>,
    pub confidence: f64,
    /// Supplied from outside the pipeline
    pub confirmed: bool,
    pub source: OpeningSource,
}

impl DetectedOpening {
    #[inline]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Floor-plan position
    #[inline]
    pub fn plan(&self) -> Point2<f64> {
        Point2::new(self.position.x, self.position.z)
    }
}

/// Opening in wall-relative coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallOpening {
    pub kind: OpeningType,
    /// Distance from the wall start along the wall
    pub start_offset: f64,
    pub width: f64,
    /// Height above the wall bottom
    pub bottom: f64,
    /// Height above the wall bottom
    pub top: f64,
}

impl WallOpening {
    #[inline]
    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.width
    }

    /// Clamp the interval into `[0, length]`; `None` when nothing is left
    pub fn clamped(mut self, length: f64) -> Option<Self> {
        let start = self.start_offset.clamp(0.0, length);
        let end = self.end_offset().clamp(0.0, length);
        if end - start <= 1e-9 {
            return None;
        }
        self.start_offset = start;
        self.width = end - start;
        Some(self)
    }
}

/// Union overlapping opening intervals in place.
///
/// The merged opening keeps the kind of the wider input and the vertical
/// union of both. Sorted by start offset afterwards.
pub fn merge_openings(openings: &mut Vec<WallOpening>) {
    if openings.len() < 2 {
        return;
    }
    openings.sort_by(|a, b| a.start_offset.total_cmp(&b.start_offset));

    let mut merged: Vec<WallOpening> = Vec::with_capacity(openings.len());
    for opening in openings.drain(..) {
        match merged.last_mut() {
            Some(last) if opening.start_offset <= last.end_offset() => {
                let end = last.end_offset().max(opening.end_offset());
                if opening.width > last.width {
                    last.kind = opening.kind;
                }
                last.width = end - last.start_offset;
                last.bottom = last.bottom.min(opening.bottom);
                last.top = last.top.max(opening.top);
            }
            _ => merged.push(opening),
        }
    }
    *openings = merged;
}

/// One wall in the floor plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    /// Facing direction in plan
    pub normal: Vector2<f64>,
    pub height: f64,
    /// World Y of the wall's base
    pub bottom: f64,
    pub openings: Vec<WallOpening>,
    /// Fragments that contributed to this segment
    pub fragments: Vec<FragmentId>,
}

impl WallSegment {
    #[inline]
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Unit vector from start to end, zero for a degenerate segment
    pub fn direction(&self) -> Vector2<f64> {
        let d = self.end - self.start;
        let len = d.norm();
        if len < 1e-12 {
            Vector2::zeros()
        } else {
            d / len
        }
    }

    /// Signed distance of `p` along the wall line from `start`
    #[inline]
    pub fn offset_of(&self, p: &Point2<f64>) -> f64 {
        (p - self.start).dot(&self.direction())
    }

    /// Perpendicular distance of `p` from the infinite wall line
    pub fn line_distance(&self, p: &Point2<f64>) -> f64 {
        let d = self.direction();
        let v = p - self.start;
        (v.x * d.y - v.y * d.x).abs()
    }

    #[inline]
    pub fn top(&self) -> f64 {
        self.bottom + self.height
    }
}

/// Where two walls meet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomCorner {
    /// At floor level
    pub position: Point3<f64>,
    /// Angle between the two walls
    pub angle_deg: f64,
    /// Contributing walls, lower key first
    pub walls: (SegmentKey, SegmentKey),
}

impl RoomCorner {
    #[inline]
    pub fn plan(&self) -> Point2<f64> {
        Point2::new(self.position.x, self.position.z)
    }
}

/// Ceiling protrusion reduced to a plan outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedProtrusion {
    pub kind: ProtrusionType,
    pub outline: Vec<Point2<f64>>,
    pub depth: f64,
}

/// Polygon-based room model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedRoom {
    pub floor_height: f64,
    pub ceiling_height: f64,
    /// Floor outline in plan; empty when there was not enough data
    pub outline: Vec<Point2<f64>>,
    pub protrusions: Vec<SimplifiedProtrusion>,
}

impl SimplifiedRoom {
    pub fn empty(floor_height: f64, ceiling_height: f64) -> Self {
        Self {
            floor_height,
            ceiling_height,
            outline: Vec::new(),
            protrusions: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.outline.len() < 3
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.ceiling_height - self.floor_height
    }
}

/// Idealized room mesh with one surface tag per triangle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomMesh {
    pub mesh: Mesh,
    pub triangle_tags: Vec<SurfaceType>,
}

impl RoomMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every triangle added to the mesh since the last call
    pub fn tag_new(&mut self, tag: SurfaceType) {
        let missing = self.mesh.triangle_count().saturating_sub(self.triangle_tags.len());
        self.triangle_tags.extend(std::iter::repeat(tag).take(missing));
    }

    /// Triangles carrying `tag`
    pub fn count(&self, tag: SurfaceType) -> usize {
        self.triangle_tags.iter().filter(|&&t| t == tag).count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn opening(kind: OpeningType, start: f64, width: f64) -> WallOpening {
        WallOpening {
            kind,
            start_offset: start,
            width,
            bottom: 0.0,
            top: 2.1,
        }
    }

    #[test]
    fn test_merge_openings_unions_overlaps() {
        let mut openings = vec![
            opening(OpeningType::Window, 2.0, 0.5),
            opening(OpeningType::Door, 0.5, 1.0),
            opening(OpeningType::Window, 1.2, 0.2),
        ];
        merge_openings(&mut openings);
        assert_eq!(openings.len(), 2);
        assert_eq!(openings[0].kind, OpeningType::Door);
        assert_relative_eq!(openings[0].start_offset, 0.5);
        assert_relative_eq!(openings[0].width, 1.0);
        assert_relative_eq!(openings[1].start_offset, 2.0);

        let once = openings.clone();
        merge_openings(&mut openings);
        assert_eq!(openings, once);
    }

    #[test]
    fn test_clamp_opening_to_wall() {
        let o = opening(OpeningType::Door, -0.2, 1.0).clamped(4.0).unwrap();
        assert_relative_eq!(o.start_offset, 0.0);
        assert_relative_eq!(o.width, 0.8);
        assert!(opening(OpeningType::Door, 5.0, 1.0).clamped(4.0).is_none());
    }

    #[test]
    fn test_segment_projection() {
        let seg = WallSegment {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(4.0, 0.0),
            normal: Vector2::new(0.0, 1.0),
            height: 2.5,
            bottom: 0.0,
            openings: Vec::new(),
            fragments: Vec::new(),
        };
        assert_relative_eq!(seg.offset_of(&Point2::new(1.5, 0.7)), 1.5);
        assert_relative_eq!(seg.line_distance(&Point2::new(1.5, 0.7)), 0.7);
    }

    #[test]
    fn test_room_mesh_tagging() {
        let mut room = RoomMesh::new();
        room.mesh.add_quad(
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            Vector3::z(),
        );
        room.tag_new(SurfaceType::Wall);
        room.tag_new(SurfaceType::Floor);
        assert_eq!(room.count(SurfaceType::Wall), 2);
        assert_eq!(room.count(SurfaceType::Floor), 0);
    }
}
