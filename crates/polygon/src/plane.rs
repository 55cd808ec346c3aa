//! Polygon plane estimation and the 2D parameterization used for simplification.
//!
//! A plane is fitted through three well-separated surface samples. Its
//! tangent basis depends only on the normal, so the local 2D coordinates of a
//! surface stay stable across frames regardless of how the contour was traced.

use glam::{Vec2, Vec3};
use thiserror::Error;

use crate::constants::EPSILON;

/// Reasons a plane cannot be built for a region
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaneError {
    #[error("Plane samples are collinear")]
    Degenerate,
    #[error("Plane is seen at {angle:.1} degrees, limit is {limit:.1}")]
    GrazingAngle { angle: f32, limit: f32 },
}

/// World-space plane with an orthonormal in-plane basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonPlane {
    /// A point on the plane (the first sample)
    pub point: Vec3,
    /// Unit normal facing the camera that produced the samples
    pub normal: Vec3,
    /// First in-plane axis
    pub tangent: Vec3,
    /// Second in-plane axis
    pub bitangent: Vec3,
}

impl PolygonPlane {
    /// Fit a plane through three samples and orient it toward the camera.
    ///
    /// # Arguments
    /// * `samples` - World positions of three non-collinear surface pixels
    /// * `camera_position` - Position of the camera the samples were seen from
    ///
    /// # Returns
    /// The plane, or `PlaneError::Degenerate` if the samples do not span one.
    pub fn from_samples(samples: [Vec3; 3], camera_position: Vec3) -> Result<Self, PlaneError> {
        let [p0, p1, p2] = samples;
        let e0 = (p1 - p0).normalize_or_zero();
        let e1 = (p2 - p0).normalize_or_zero();

        let normal = e0.cross(e1);
        if normal.length_squared() < EPSILON || !normal.is_finite() {
            return Err(PlaneError::Degenerate);
        }
        let mut normal = normal.normalize();

        // Face the camera
        let view = (p0 - camera_position).normalize_or_zero();
        if view.dot(normal) >= 0.0 {
            normal = -normal;
        }

        Ok(Self::from_point_normal(p0, normal))
    }

    /// Build a plane from a point and a normal (will be normalized).
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        let (tangent, bitangent) = build_plane_basis(normal);
        Self {
            point,
            normal,
            tangent,
            bitangent,
        }
    }

    /// Reject planes seen too close to edge-on from `camera_position`.
    ///
    /// `max_angle` is in degrees, measured between the normal and the
    /// direction from the plane point back to the camera.
    pub fn check_view_angle(&self, camera_position: Vec3, max_angle: f32) -> Result<(), PlaneError> {
        let to_camera = (camera_position - self.point).normalize_or_zero();
        let angle = self.normal.dot(to_camera).clamp(-1.0, 1.0).acos().to_degrees();
        if angle > max_angle {
            return Err(PlaneError::GrazingAngle {
                angle,
                limit: max_angle,
            });
        }
        Ok(())
    }

    /// Intersect a ray with the plane.
    ///
    /// Returns `None` if the ray runs parallel to the plane. Hits behind the
    /// ray origin are returned as well; the caller's viewing geometry rules them out.
    pub fn intersect_ray(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        let denom = self.normal.dot(direction);
        if denom.abs() < EPSILON {
            return None;
        }
        let t = -self.normal.dot(origin - self.point) / denom;
        Some(origin + direction * t)
    }

    /// Signed distance of `position` from the plane along the normal.
    pub fn distance(&self, position: Vec3) -> f32 {
        self.normal.dot(position - self.point)
    }

    /// Project a world position into plane-local 2D coordinates.
    pub fn to_local(&self, position: Vec3) -> Vec2 {
        let offset = position - self.point;
        Vec2::new(offset.dot(self.tangent), offset.dot(self.bitangent))
    }

    /// Map plane-local 2D coordinates back to world space.
    pub fn to_world(&self, local: Vec2) -> Vec3 {
        self.point + self.tangent * local.x + self.bitangent * local.y
    }
}

/// Deterministic in-plane basis for a unit normal.
///
/// The tangent seed is the normal's components rotated, `(n.y, n.z, -n.x)`,
/// then orthogonalized: `bitangent = normalize(tangent x n)` and
/// `tangent = normalize(n x bitangent)`.
///
/// # Returns
/// `(tangent, bitangent)`, both unit length and perpendicular to `normal`.
pub fn build_plane_basis(normal: Vec3) -> (Vec3, Vec3) {
    let seed = Vec3::new(normal.y, normal.z, -normal.x);
    let bitangent = seed.cross(normal);
    // The seed is parallel to the normal only for n ~ (1, -1, 1)
    let bitangent = if bitangent.length_squared() < EPSILON {
        normal.any_orthonormal_vector()
    } else {
        bitangent.normalize()
    };
    let tangent = normal.cross(bitangent).normalize();
    (tangent, bitangent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_orthonormal(plane: &PolygonPlane) {
        assert!((plane.normal.length() - 1.0).abs() < 1e-5);
        assert!((plane.tangent.length() - 1.0).abs() < 1e-5);
        assert!((plane.bitangent.length() - 1.0).abs() < 1e-5);
        assert!(plane.normal.dot(plane.tangent).abs() < 1e-5);
        assert!(plane.normal.dot(plane.bitangent).abs() < 1e-5);
        assert!(plane.tangent.dot(plane.bitangent).abs() < 1e-5);
    }

    #[test]
    fn test_normal_faces_camera() {
        let samples = [
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
        ];
        let plane = PolygonPlane::from_samples(samples, Vec3::ZERO).unwrap();
        assert!((plane.normal - Vec3::NEG_Z).length() < 1e-5);

        // Same samples in the other winding give the same orientation
        let swapped = [samples[0], samples[2], samples[1]];
        let plane = PolygonPlane::from_samples(swapped, Vec3::ZERO).unwrap();
        assert!((plane.normal - Vec3::NEG_Z).length() < 1e-5);
        assert_orthonormal(&plane);
    }

    #[test]
    fn test_collinear_samples_are_degenerate() {
        let samples = [
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(3.0, 0.0, 5.0),
        ];
        assert_eq!(
            PolygonPlane::from_samples(samples, Vec3::ZERO),
            Err(PlaneError::Degenerate)
        );
    }

    #[test]
    fn test_basis_depends_only_on_normal() {
        let a = PolygonPlane::from_point_normal(Vec3::ZERO, Vec3::new(0.3, 0.8, -0.2));
        let b = PolygonPlane::from_point_normal(Vec3::new(4.0, 2.0, 1.0), Vec3::new(0.3, 0.8, -0.2));
        assert_eq!(a.tangent, b.tangent);
        assert_eq!(a.bitangent, b.bitangent);
        assert_orthonormal(&a);
    }

    #[test]
    fn test_basis_handles_parallel_seed() {
        let plane = PolygonPlane::from_point_normal(Vec3::ZERO, Vec3::new(1.0, -1.0, 1.0));
        assert_orthonormal(&plane);
        assert_eq!(build_plane_basis(plane.normal), (plane.tangent, plane.bitangent));

        // Neighbors of the degenerate normal take the regular path
        let near = PolygonPlane::from_point_normal(Vec3::ZERO, Vec3::new(1.0, -1.0, 1.2));
        assert_orthonormal(&near);
    }

    #[test]
    fn test_ray_intersection() {
        let plane = PolygonPlane::from_point_normal(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let hit = plane
            .intersect_ray(Vec3::ZERO, Vec3::new(0.5, 0.0, 1.0))
            .unwrap();
        assert!((hit - Vec3::new(2.5, 0.0, 5.0)).length() < 1e-5);
        assert!(plane.distance(hit).abs() < 1e-5);

        // Parallel ray never hits
        assert!(plane.intersect_ray(Vec3::ZERO, Vec3::X).is_none());
    }

    #[test]
    fn test_local_round_trip() {
        let plane = PolygonPlane::from_point_normal(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 1.0, 1.0));
        let world = plane.to_world(Vec2::new(0.75, -1.5));
        assert!(plane.distance(world).abs() < 1e-5);
        let local = plane.to_local(world);
        assert!((local - Vec2::new(0.75, -1.5)).length() < 1e-5);
    }

    #[test]
    fn test_grazing_angle_rejected() {
        let plane = PolygonPlane::from_point_normal(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(plane.check_view_angle(Vec3::ZERO, 80.0).is_ok());

        // Camera almost in the plane
        let camera = Vec3::new(100.0, 0.0, 4.0);
        assert!(matches!(
            plane.check_view_angle(camera, 80.0),
            Err(PlaneError::GrazingAngle { .. })
        ));
    }
}
