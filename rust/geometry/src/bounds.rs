// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes

use nalgebra::{Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb3 {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb3 {
    /// An inverted box that any point expands
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.expand(p);
        }
        bounds
    }

    #[inline]
    pub fn expand(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// True once at least one point has been added
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn extent(&self) -> Vector3<f64> {
        if !self.is_valid() {
            return Vector3::zeros();
        }
        self.max - self.min
    }

    /// Footprint on the floor plane (x, z)
    pub fn footprint(&self) -> Aabb2 {
        Aabb2 {
            min: Point2::new(self.min.x, self.min.z),
            max: Point2::new(self.max.x, self.max.z),
        }
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}

/// Axis-aligned rectangle on the floor plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Aabb2 {
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::MAX, f64::MAX),
            max: Point2::new(f64::MIN, f64::MIN),
        }
    }

    #[inline]
    pub fn expand(&mut self, p: &Point2<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    pub fn extent(&self) -> Vector2<f64> {
        if !self.is_valid() {
            return Vector2::zeros();
        }
        self.max - self.min
    }

    pub fn area(&self) -> f64 {
        let e = self.extent();
        e.x * e.y
    }

    /// Corners in counter-clockwise order (x right, y up)
    pub fn corners(&self) -> [Point2<f64>; 4] {
        [
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }
}

impl Default for Aabb2 {
    fn default() -> Self {
        Self::empty()
    }
}
