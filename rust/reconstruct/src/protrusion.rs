// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ceiling protrusion shape heuristics

use crate::config::ClassifierConfig;
use crate::fragment::FragmentId;
use crate::statistics::ScanStatistics;
use crate::surface::ProtrusionType;
use crate::types::CeilingProtrusion;
use nalgebra::Point3;
use roomscan_geometry::Aabb3;

/// Shape class from the plan footprint of a protrusion.
///
/// Rules apply in order: large footprint, then elongation, then small and
/// compact; everything else is a duct.
pub fn classify_protrusion(bounds: &Aabb3, config: &ClassifierConfig) -> ProtrusionType {
    let extent = bounds.footprint().extent();
    let long = extent.x.max(extent.y);
    let short = extent.x.min(extent.y);
    let area = long * short;
    let aspect = if short > 1e-9 { long / short } else { f64::INFINITY };

    if area >= config.dropped_ceiling_min_area {
        ProtrusionType::DroppedCeiling
    } else if aspect >= config.beam_min_aspect {
        ProtrusionType::Beam
    } else if area <= config.fixture_max_area && aspect < config.fixture_max_aspect {
        ProtrusionType::Fixture
    } else {
        ProtrusionType::Duct
    }
}

/// Build a protrusion record for a fragment hanging below the ceiling.
///
/// `None` until the ceiling height is known, or when the fragment does not
/// actually reach below it.
pub fn detect_protrusion(
    fragment: FragmentId,
    world_vertices: &[Point3<f64>],
    stats: &ScanStatistics,
    config: &ClassifierConfig,
) -> Option<CeilingProtrusion> {
    let ceiling = stats.ceiling_height()?;
    let bounds = Aabb3::from_points(world_vertices);
    if !bounds.is_valid() {
        return None;
    }

    let depth = ceiling - bounds.min.y;
    if depth <= 0.0 {
        return None;
    }

    let kind = classify_protrusion(&bounds, config);
    tracing::debug!(fragment = %fragment, ?kind, depth, "ceiling protrusion");
    Some(CeilingProtrusion {
        fragment,
        kind,
        bounds,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn slab(x: f64, z: f64, bottom: f64) -> Aabb3 {
        Aabb3::from_points(&[Point3::new(0.0, bottom, 0.0), Point3::new(x, 2.5, z)])
    }

    #[test]
    fn test_shape_rules() {
        let config = ClassifierConfig::default();
        assert_eq!(classify_protrusion(&slab(3.0, 2.0, 2.2), &config), ProtrusionType::DroppedCeiling);
        assert_eq!(classify_protrusion(&slab(4.0, 0.3, 2.2), &config), ProtrusionType::Beam);
        assert_eq!(classify_protrusion(&slab(0.5, 0.5, 2.2), &config), ProtrusionType::Fixture);
        assert_eq!(classify_protrusion(&slab(1.5, 0.5, 2.2), &config), ProtrusionType::Duct);
        // Small but elongated is not a fixture
        assert_eq!(classify_protrusion(&slab(0.6, 0.2, 2.2), &config), ProtrusionType::Duct);
    }

    #[test]
    fn test_requires_known_ceiling() {
        let config = ClassifierConfig::default();
        let points = [Point3::new(0.0, 2.2, 0.0), Point3::new(4.0, 2.5, 0.3)];
        let mut stats = ScanStatistics::default();
        assert!(detect_protrusion(FragmentId(1), &points, &stats, &config).is_none());

        for _ in 0..10 {
            stats.add_ceiling_sample(2.5);
        }
        let p = detect_protrusion(FragmentId(1), &points, &stats, &config).unwrap();
        assert_eq!(p.kind, ProtrusionType::Beam);
        assert_relative_eq!(p.depth, 0.3, epsilon = 1e-12);
    }
}
