// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scans of synthetic rooms through `ScanSession`.

use approx::assert_relative_eq;
use roomscan_geometry::{signed_area, Mesh, Point2, Point3, Vector3};
use roomscan_reconstruct::reconstructor::emit_wall;
use roomscan_reconstruct::synthetic::{wall_panel, SyntheticRoom, FIRST_WALL_ID};
use roomscan_reconstruct::{
    FragmentId, MeshFragment, OpeningSource, OpeningType, ProtrusionType, ScanConfig, ScanSession,
    SurfaceType, VerticalSurfaceOutcome,
};

fn scan(room: &SyntheticRoom, config: ScanConfig) -> ScanSession {
    let mut session = ScanSession::new(config).unwrap();
    for fragment in room.fragments() {
        session.on_fragment_added(&fragment);
    }
    session
}

#[test]
fn test_box_room_walls_and_corners() {
    let session = scan(&SyntheticRoom::new(4.0, 4.0, 2.5), ScanConfig::default());

    let stats = session.statistics();
    assert_relative_eq!(stats.floor_height().unwrap(), 0.0, epsilon = 1e-9);
    assert_relative_eq!(stats.ceiling_height().unwrap(), 2.5, epsilon = 1e-9);

    assert_eq!(session.room_builder().segment_count(), 4);
    let corners = session.inferred_corners();
    assert_eq!(corners.len(), 4);
    for corner in &corners {
        assert_relative_eq!(corner.angle_deg, 90.0, epsilon = 1e-6);
    }

    let summary = session.summary();
    assert_eq!(summary.wall_count, 4);
    assert_eq!(summary.corner_count, 4);
    assert_eq!(summary.door_count, 0);
    assert_eq!(summary.window_count, 0);
}

#[test]
fn test_confirmed_corner_counts_once() {
    let mut session = scan(&SyntheticRoom::new(4.0, 4.0, 2.5), ScanConfig::default());
    session.confirm_corner(Point3::new(0.05, 0.0, 0.05));
    session.confirm_corner(Point3::new(3.98, 0.0, 0.0));

    let summary = session.summary();
    assert_eq!(summary.corner_count, 4);
    assert!(summary.to_string().contains("4 corners"));
}

#[test]
fn test_box_room_mesh() {
    let session = scan(&SyntheticRoom::new(4.0, 4.0, 2.5), ScanConfig::default());
    let room = session.reconstruct();

    assert_eq!(room.count(SurfaceType::Wall), 8);
    assert_eq!(room.count(SurfaceType::Floor), 4);
    assert_eq!(room.count(SurfaceType::Ceiling), 4);
    assert_eq!(room.triangle_tags.len(), room.mesh.triangle_count());

    let (min, max) = room.mesh.bounds();
    assert_relative_eq!(min.x, 0.0, epsilon = 1e-5);
    assert_relative_eq!(max.x, 4.0, epsilon = 1e-5);
    assert_relative_eq!(max.y, 2.5, epsilon = 1e-5);
}

#[test]
fn test_door_is_detected_and_cut() {
    let room = SyntheticRoom::new(4.0, 4.0, 2.5).with_door(0.55, 1.45, 2.1);
    let session = scan(&room, ScanConfig::default());

    let doors = session.statistics().doors();
    assert_eq!(doors.len(), 1);
    let door = &doors[0];
    assert_eq!(door.kind, OpeningType::Door);
    assert_relative_eq!(door.width, 0.9, epsilon = 1e-6);
    assert_relative_eq!(door.bottom, 0.0, epsilon = 1e-6);
    assert_relative_eq!(door.top, 2.1, epsilon = 1e-6);
    assert_relative_eq!(door.position.x, 1.0, epsilon = 1e-6);
    assert_relative_eq!(door.position.z, 0.0, epsilon = 1e-6);
    assert_eq!(door.source, OpeningSource::Fragment(FragmentId(FIRST_WALL_ID)));

    let walls = session.reconstructed_walls();
    assert_eq!(walls.len(), 4);
    let with_openings: Vec<_> = walls.iter().filter(|w| !w.openings.is_empty()).collect();
    assert_eq!(with_openings.len(), 1);

    // Before, above and after the door
    let mut mesh = Mesh::new();
    assert_eq!(emit_wall(&mut mesh, with_openings[0], false), 3);

    let room_mesh = session.reconstruct();
    assert_eq!(room_mesh.count(SurfaceType::Wall), 3 * 2 + 3 * 2);
}

#[test]
fn test_refed_fragment_replaces_totals() {
    let room = SyntheticRoom::new(4.0, 4.0, 2.5).with_door(0.55, 1.45, 2.1);
    let mut session = scan(&room, ScanConfig::default());

    let wall_area = session.statistics().total_area(SurfaceType::Wall);
    let fragments = session.statistics().fragment_count();

    for fragment in room.walls() {
        session.on_fragment_updated(&fragment);
    }

    let stats = session.statistics();
    assert_relative_eq!(stats.total_area(SurfaceType::Wall), wall_area, epsilon = 1e-9);
    assert_eq!(stats.fragment_count(), fragments);
    assert_eq!(stats.doors().len(), 1);
    assert_eq!(session.room_builder().segment_count(), 4);
}

#[test]
fn test_furniture_does_not_become_a_wall() {
    let mut session = scan(&SyntheticRoom::new(4.0, 4.0, 2.5), ScanConfig::default());

    // A cabinet front at 60% of the room height
    let cabinet = wall_panel(
        FragmentId(50),
        Point2::new(1.0, 2.0),
        Point2::new(3.0, 2.0),
        Point2::new(2.0, 4.0),
        1.5,
        0.05,
        None,
    );
    let report = session.on_fragment_added(&cabinet);
    assert_eq!(report.surface.surface_type, SurfaceType::Wall);
    assert_eq!(report.wall, Some(VerticalSurfaceOutcome::Furniture));
    assert_eq!(session.room_builder().segment_count(), 4);
}

/// Single-quad sides of a 0.3 m deep beam hanging from a 2.5 m ceiling
fn beam(id: FragmentId) -> MeshFragment {
    let quads = [
        // Underside
        ([(1.0, 2.2, 0.5), (1.3, 2.2, 0.5), (1.3, 2.2, 4.5), (1.0, 2.2, 4.5)], -Vector3::y()),
        ([(1.0, 2.2, 0.5), (1.0, 2.5, 0.5), (1.0, 2.5, 4.5), (1.0, 2.2, 4.5)], -Vector3::x()),
        ([(1.3, 2.2, 0.5), (1.3, 2.5, 0.5), (1.3, 2.5, 4.5), (1.3, 2.2, 4.5)], Vector3::x()),
    ];
    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::new();
    for (corners, normal) in quads {
        let base = vertices.len() as u32;
        vertices.extend(corners.iter().map(|&(x, y, z)| Point3::new(x, y, z)));
        normals.extend([normal; 4]);
        faces.push([base, base + 1, base + 2]);
        faces.push([base, base + 2, base + 3]);
    }
    MeshFragment::new(id, vertices, normals, faces)
}

#[test]
fn test_beam_with_sides_is_a_protrusion() {
    let mut session = scan(&SyntheticRoom::new(4.0, 5.0, 2.5), ScanConfig::default());
    let report = session.on_fragment_added(&beam(FragmentId(70)));

    // The sides outweigh the underside
    assert_eq!(report.surface.surface_type, SurfaceType::Wall);
    assert_eq!(report.wall, None);
    assert_eq!(session.room_builder().segment_count(), 4);

    let protrusions = session.statistics().protrusions();
    assert_eq!(protrusions.len(), 1);
    assert_eq!(protrusions[0].kind, ProtrusionType::Beam);
    assert_relative_eq!(protrusions[0].depth, 0.3, epsilon = 1e-9);
    assert_relative_eq!(session.summary().clearance.unwrap(), 2.2, epsilon = 1e-9);

    assert!(session.on_fragment_removed(FragmentId(70)));
    assert!(session.statistics().protrusions().is_empty());
}

#[test]
fn test_walls_before_calibration_are_replayed() {
    let room = SyntheticRoom::new(5.0, 3.0, 2.7);
    let mut session = ScanSession::new(ScanConfig::default()).unwrap();

    for wall in room.walls() {
        let report = session.on_fragment_added(&wall);
        assert_eq!(report.wall, Some(VerticalSurfaceOutcome::Uncalibrated));
    }
    assert_eq!(session.room_builder().segment_count(), 0);

    session.on_fragment_added(&room.floor());
    session.on_fragment_added(&room.ceiling());
    assert_eq!(session.room_builder().segment_count(), 4);
    assert_eq!(session.inferred_corners().len(), 4);
}

#[test]
fn test_removed_wall_leaves_the_room() {
    let mut session = scan(&SyntheticRoom::new(4.0, 4.0, 2.5), ScanConfig::default());
    assert!(session.on_fragment_removed(FragmentId(FIRST_WALL_ID)));

    assert_eq!(session.room_builder().segment_count(), 3);
    assert_eq!(session.inferred_corners().len(), 2);
    // Two corners are not enough for a room
    assert!(session.reconstruct().is_empty());
}

/// Box room whose first wall is scanned as two panels around a 0.9 m gap
fn split_wall_scan() -> ScanSession {
    let room = SyntheticRoom::new(4.0, 4.0, 2.5);
    let mut session = ScanSession::new(ScanConfig::default()).unwrap();
    session.on_fragment_added(&room.floor());
    session.on_fragment_added(&room.ceiling());
    for wall in room.walls().iter().skip(1) {
        session.on_fragment_added(wall);
    }
    session.on_fragment_added(&first_wall_panel(FragmentId(FIRST_WALL_ID), 0.0, 1.5));
    session.on_fragment_added(&first_wall_panel(FragmentId(99), 2.4, 4.0));
    session
}

fn first_wall_panel(id: FragmentId, x0: f64, x1: f64) -> MeshFragment {
    wall_panel(id, Point2::new(x0, 0.0), Point2::new(x1, 0.0), Point2::new(2.0, 2.0), 2.5, 0.05, None)
}

#[test]
fn test_gap_between_panels_becomes_opening() {
    let session = split_wall_scan();
    let openings: Vec<_> = session.statistics().openings().collect();
    assert_eq!(openings.len(), 1);
    assert_eq!(openings[0].kind, OpeningType::GlassDoor);
    assert_relative_eq!(openings[0].width, 0.9, epsilon = 1e-3);
    assert!(openings[0].source.involves(FragmentId(99)));
}

#[test]
fn test_closed_gap_leaves_solid_wall() {
    let mut session = split_wall_scan();
    session.on_fragment_updated(&first_wall_panel(FragmentId(99), 0.0, 4.0));

    assert_eq!(session.room_builder().segment_count(), 4);
    assert_eq!(session.statistics().openings().count(), 0);
    assert!(session.reconstructed_walls().iter().all(|w| w.openings.is_empty()));
    assert_eq!(session.reconstruct().count(SurfaceType::Wall), 8);
}

#[test]
fn test_removing_gap_wall_drops_opening() {
    let mut session = split_wall_scan();
    assert!(session.on_fragment_removed(FragmentId(99)));
    assert_eq!(session.statistics().openings().count(), 0);
}

#[test]
fn test_simplified_room_matches_box() {
    let session = scan(&SyntheticRoom::new(4.0, 3.0, 2.5), ScanConfig::default());
    let room = session.simplified_room();

    assert_eq!(room.outline.len(), 4);
    assert_relative_eq!(signed_area(&room.outline).abs(), 12.0, epsilon = 1e-6);
    assert_relative_eq!(room.height(), 2.5, epsilon = 1e-9);

    let mesh = session.simplified_mesh();
    assert_eq!(mesh.count(SurfaceType::Wall), 8);
    assert_eq!(mesh.count(SurfaceType::Floor), 4);
    assert_eq!(mesh.count(SurfaceType::Ceiling), 4);
}

#[test]
fn test_double_sided_output() {
    let mut config = ScanConfig::default();
    config.reconstruction.double_sided = true;
    let session = scan(&SyntheticRoom::new(4.0, 4.0, 2.5), config);
    let room = session.reconstruct();

    assert_eq!(room.count(SurfaceType::Wall), 16);
    assert_eq!(room.count(SurfaceType::Floor), 8);
    assert_eq!(room.count(SurfaceType::Ceiling), 8);
}
