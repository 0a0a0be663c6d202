// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Semantic tags for classified geometry
//!
//! Closed enumerations with lookup tables; behavior attached to a tag (display
//! color, structural role) is a pure function of the variant.

use serde::{Deserialize, Serialize};

/// Semantic surface type of a face or fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SurfaceType {
    Floor,
    Ceiling,
    CeilingProtrusion,
    Wall,
    WallEdge,
    FloorEdge,
    Door,
    DoorFrame,
    Window,
    WindowFrame,
    Object,
    Unknown,
}

/// RGBA display colors, indexed by `SurfaceType as usize`
const SURFACE_COLORS: [[f32; 4]; SurfaceType::COUNT] = [
    [0.55, 0.45, 0.35, 1.0], // Floor
    [0.92, 0.92, 0.90, 1.0], // Ceiling
    [0.80, 0.60, 0.90, 1.0], // CeilingProtrusion
    [0.85, 0.82, 0.75, 1.0], // Wall
    [0.95, 0.75, 0.20, 1.0], // WallEdge
    [0.90, 0.45, 0.15, 1.0], // FloorEdge
    [0.45, 0.30, 0.15, 1.0], // Door
    [0.35, 0.22, 0.10, 1.0], // DoorFrame
    [0.55, 0.80, 0.95, 0.5], // Window
    [0.30, 0.50, 0.70, 1.0], // WindowFrame
    [0.30, 0.70, 0.40, 1.0], // Object
    [0.50, 0.50, 0.50, 1.0], // Unknown
];

impl SurfaceType {
    pub const COUNT: usize = 12;

    pub const ALL: [SurfaceType; Self::COUNT] = [
        SurfaceType::Floor,
        SurfaceType::Ceiling,
        SurfaceType::CeilingProtrusion,
        SurfaceType::Wall,
        SurfaceType::WallEdge,
        SurfaceType::FloorEdge,
        SurfaceType::Door,
        SurfaceType::DoorFrame,
        SurfaceType::Window,
        SurfaceType::WindowFrame,
        SurfaceType::Object,
        SurfaceType::Unknown,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceType::Floor => "Floor",
            SurfaceType::Ceiling => "Ceiling",
            SurfaceType::CeilingProtrusion => "CeilingProtrusion",
            SurfaceType::Wall => "Wall",
            SurfaceType::WallEdge => "WallEdge",
            SurfaceType::FloorEdge => "FloorEdge",
            SurfaceType::Door => "Door",
            SurfaceType::DoorFrame => "DoorFrame",
            SurfaceType::Window => "Window",
            SurfaceType::WindowFrame => "WindowFrame",
            SurfaceType::Object => "Object",
            SurfaceType::Unknown => "Unknown",
        }
    }

    /// Display color for visualization collaborators
    #[inline]
    pub fn color(self) -> [f32; 4] {
        SURFACE_COLORS[self.index()]
    }

    /// Part of the room shell rather than clutter
    pub fn is_structural(self) -> bool {
        !matches!(self, SurfaceType::Object | SurfaceType::Unknown)
    }
}

impl std::fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a detected crease between two faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    /// Wall meets floor
    FloorWall,
    /// Wall meets ceiling
    CeilingWall,
    /// Two walls meet at a sharp angle; room corner evidence
    VerticalCorner,
    /// Anything touching clutter
    ObjectEdge,
    Other,
}

impl EdgeType {
    /// Classify an edge from the types of its two adjacent faces
    pub fn from_adjacent(a: SurfaceType, b: SurfaceType, sharp: bool) -> EdgeType {
        use SurfaceType::*;

        if a == Object || b == Object {
            return EdgeType::ObjectEdge;
        }
        match (a.min(b), a.max(b)) {
            (Floor, Wall) => EdgeType::FloorWall,
            (Ceiling, Wall) => EdgeType::CeilingWall,
            (Wall, Wall) if sharp => EdgeType::VerticalCorner,
            _ => EdgeType::Other,
        }
    }

    /// The surface tag used when rendering this edge
    pub fn surface_type(self) -> SurfaceType {
        match self {
            EdgeType::FloorWall => SurfaceType::FloorEdge,
            EdgeType::CeilingWall | EdgeType::VerticalCorner => SurfaceType::WallEdge,
            EdgeType::ObjectEdge => SurfaceType::Object,
            EdgeType::Other => SurfaceType::Unknown,
        }
    }
}

/// Heuristic shape class of a ceiling protrusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtrusionType {
    Beam,
    Duct,
    Fixture,
    DroppedCeiling,
}

/// Kind of a wall opening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpeningType {
    Door,
    Window,
    GlassDoor,
    PassThrough,
}

impl OpeningType {
    pub fn as_str(self) -> &'static str {
        match self {
            OpeningType::Door => "Door",
            OpeningType::Window => "Window",
            OpeningType::GlassDoor => "GlassDoor",
            OpeningType::PassThrough => "PassThrough",
        }
    }

    /// Openings that reach the floor are recorded alongside doors
    pub fn is_door_like(self) -> bool {
        !matches!(self, OpeningType::Window)
    }

    pub fn surface_type(self) -> SurfaceType {
        if self.is_door_like() {
            SurfaceType::Door
        } else {
            SurfaceType::Window
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_indexed_in_order() {
        for (i, t) in SurfaceType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
        assert_eq!(SurfaceType::Window.color()[3], 0.5);
    }

    #[test]
    fn test_edge_type_is_symmetric() {
        use SurfaceType::*;
        for a in SurfaceType::ALL {
            for b in SurfaceType::ALL {
                assert_eq!(
                    EdgeType::from_adjacent(a, b, true),
                    EdgeType::from_adjacent(b, a, true)
                );
            }
        }
        assert_eq!(EdgeType::from_adjacent(Wall, Floor, false), EdgeType::FloorWall);
        assert_eq!(EdgeType::from_adjacent(Ceiling, Wall, false), EdgeType::CeilingWall);
        assert_eq!(EdgeType::from_adjacent(Wall, Wall, true), EdgeType::VerticalCorner);
        assert_eq!(EdgeType::from_adjacent(Wall, Wall, false), EdgeType::Other);
        assert_eq!(EdgeType::from_adjacent(Floor, Object, false), EdgeType::ObjectEdge);
    }

    #[test]
    fn test_opening_surface_types() {
        assert_eq!(OpeningType::GlassDoor.surface_type(), SurfaceType::Door);
        assert_eq!(OpeningType::Window.surface_type(), SurfaceType::Window);
        assert!(!SurfaceType::Object.is_structural());
    }
}
