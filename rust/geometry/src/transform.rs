// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local-to-world transform helpers for 4×4 fragment matrices

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Transform a point (w = 1) by a 4x4 matrix, applying the projective divide
/// only when the bottom row is not affine.
#[inline]
pub fn transform_point(transform: &Matrix4<f64>, point: &Point3<f64>) -> Point3<f64> {
    if is_affine(transform) {
        transform.transform_point(point)
    } else {
        let h = transform * point.to_homogeneous();
        if h.w.abs() < 1e-12 {
            return Point3::new(h.x, h.y, h.z);
        }
        Point3::new(h.x / h.w, h.y / h.w, h.z / h.w)
    }
}

/// Transform a normal by the inverse-transpose of the upper 3x3 block and
/// renormalize.
///
/// Falls back to the plain linear part for singular matrices, which is
/// exact for the rigid transforms a tracked sensor produces.
pub fn transform_normal(transform: &Matrix4<f64>, normal: &Vector3<f64>) -> Result<Vector3<f64>> {
    let linear: Matrix3<f64> = transform.fixed_view::<3, 3>(0, 0).into_owned();
    let normal_matrix = linear
        .try_inverse()
        .map(|inv| inv.transpose())
        .unwrap_or(linear);

    let n = normal_matrix * normal;
    let len = n.norm();
    if !len.is_finite() || len < 1e-12 {
        return Err(Error::ZeroLengthVector);
    }
    Ok(n / len)
}

/// Check whether the matrix has an affine bottom row (0, 0, 0, 1)
#[inline]
pub fn is_affine(transform: &Matrix4<f64>) -> bool {
    transform[(3, 0)].abs() < 1e-12
        && transform[(3, 1)].abs() < 1e-12
        && transform[(3, 2)].abs() < 1e-12
        && (transform[(3, 3)] - 1.0).abs() < 1e-12
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translation_moves_points_not_normals() {
        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let p = transform_point(&m, &Point3::origin());
        assert_relative_eq!(p, Point3::new(1.0, 2.0, 3.0));

        let n = transform_normal(&m, &Vector3::y()).unwrap();
        assert_relative_eq!(n, Vector3::y());
    }

    #[test]
    fn test_rotation_rotates_normals() {
        let m = Matrix4::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        let n = transform_normal(&m, &Vector3::x()).unwrap();
        assert_relative_eq!(n, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_non_uniform_scale_keeps_normals_perpendicular() {
        let m = Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 1.0, 1.0));
        // Plane x + y = 0 has normal (1, 1, 0)/sqrt2; after scaling x by 2 the
        // plane becomes x/2 + y = 0 with normal proportional to (1, 2, 0).
        let n = transform_normal(&m, &Vector3::new(1.0, 1.0, 0.0).normalize()).unwrap();
        assert_relative_eq!(n, Vector3::new(1.0, 2.0, 0.0).normalize(), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_normal_is_rejected() {
        let m = Matrix4::identity();
        assert_eq!(
            transform_normal(&m, &Vector3::zeros()),
            Err(Error::ZeroLengthVector)
        );
    }
}
