//! Offscreen light camera.
//!
//! The camera sits at the primary light and looks along its local `+Z`.
//! Viewport coordinates run from `(0, 0)` at the lower-left corner to
//! `(1, 1)` at the upper-right.

use glam::{Affine3A, Vec2, Vec3};

/// A ray with a unit direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Projection services the reconstruction needs from a camera
pub trait ViewportCamera {
    /// World-space camera position
    fn position(&self) -> Vec3;

    /// Far clip distance; linear depth buffers store `distance / far_clip`
    fn far_clip(&self) -> f32;

    /// Ray from the camera through a viewport point
    fn viewport_point_to_ray(&self, point: Vec2) -> Ray;

    /// World position of the viewport point at `depth` along the view axis
    fn viewport_to_world_point(&self, point: Vec2, depth: f32) -> Vec3;
}

/// Symmetric perspective camera with a square or rectangular viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    /// Vertical field of view in degrees
    fov: f32,
    aspect: f32,
    near_clip: f32,
    far_clip: f32,
}

impl PerspectiveCamera {
    /// Build a camera from a position and view axes.
    ///
    /// # Arguments
    /// * `position` - World-space position
    /// * `forward` - View direction (normalized here)
    /// * `up` - Approximate up vector, re-orthogonalized against `forward`
    /// * `fov` - Vertical field of view in degrees
    /// * `aspect` - Width over height
    /// * `near_clip`, `far_clip` - Clip distances along `forward`
    pub fn new(
        position: Vec3,
        forward: Vec3,
        up: Vec3,
        fov: f32,
        aspect: f32,
        near_clip: f32,
        far_clip: f32,
    ) -> Self {
        let forward = forward.normalize_or(Vec3::Z);
        let mut right = up.cross(forward);
        if right.length_squared() < 1e-12 {
            right = forward.any_orthonormal_vector();
        }
        let right = right.normalize();
        let up = forward.cross(right);

        Self {
            position,
            forward,
            up,
            right,
            fov,
            aspect,
            near_clip,
            far_clip,
        }
    }

    /// Camera looking out of a light transform (local `+Z` forward, `+Y` up)
    pub fn from_transform(transform: &Affine3A, fov: f32, near_clip: f32, far_clip: f32) -> Self {
        Self::new(
            transform.translation.into(),
            transform.transform_vector3(Vec3::Z),
            transform.transform_vector3(Vec3::Y),
            fov,
            1.0,
            near_clip,
            far_clip,
        )
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn near_clip(&self) -> f32 {
        self.near_clip
    }

    /// Direction through a viewport point, scaled so its forward component is 1
    fn unit_depth_direction(&self, point: Vec2) -> Vec3 {
        let ndc = point * 2.0 - Vec2::ONE;
        let half_height = (self.fov.to_radians() * 0.5).tan();
        self.forward
            + self.right * (ndc.x * half_height * self.aspect)
            + self.up * (ndc.y * half_height)
    }
}

impl ViewportCamera for PerspectiveCamera {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn far_clip(&self) -> f32 {
        self.far_clip
    }

    fn viewport_point_to_ray(&self, point: Vec2) -> Ray {
        Ray {
            origin: self.position,
            direction: self.unit_depth_direction(point).normalize(),
        }
    }

    fn viewport_to_world_point(&self, point: Vec2, depth: f32) -> Vec3 {
        self.position + self.unit_depth_direction(point) * depth
    }
}

/// Viewport coordinate of the center of pixel `(x, y)` in a `width` x `height` buffer
pub fn pixel_center_viewport(x: u32, y: u32, width: u32, height: u32) -> Vec2 {
    Vec2::new(
        (x as f32 + 0.5) / width as f32,
        (y as f32 + 0.5) / height as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_camera() -> PerspectiveCamera {
        PerspectiveCamera::from_transform(&Affine3A::IDENTITY, 90.0, 0.1, 50.0)
    }

    #[test]
    fn test_center_ray_points_forward() {
        let camera = identity_camera();
        let ray = camera.viewport_point_to_ray(Vec2::splat(0.5));
        assert_eq!(ray.origin, Vec3::ZERO);
        assert!((ray.direction - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_corners_follow_field_of_view() {
        let camera = identity_camera();
        // 90 degrees: the upper-right corner at depth 1 is one unit off-axis both ways
        let corner = camera.viewport_to_world_point(Vec2::ONE, 1.0);
        assert!((corner - Vec3::new(1.0, 1.0, 1.0)).length() < 1e-5);

        let lower_left = camera.viewport_to_world_point(Vec2::ZERO, 2.0);
        assert!((lower_left - Vec3::new(-2.0, -2.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn test_depth_is_measured_along_forward() {
        let camera = identity_camera();
        let point = camera.viewport_to_world_point(Vec2::new(0.9, 0.2), 5.0);
        assert!((point.z - 5.0).abs() < 1e-5);

        // The ray through the same point passes through it
        let ray = camera.viewport_point_to_ray(Vec2::new(0.9, 0.2));
        let t = point.length();
        assert!((ray.origin + ray.direction * t - point).length() < 1e-4);
    }

    #[test]
    fn test_transform_moves_and_rotates_camera() {
        let transform = Affine3A::from_rotation_translation(
            glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let camera = PerspectiveCamera::from_transform(&transform, 90.0, 0.1, 50.0);
        assert_eq!(camera.position(), Vec3::new(1.0, 2.0, 3.0));
        assert!((camera.forward() - Vec3::X).length() < 1e-5);

        let ahead = camera.viewport_to_world_point(Vec2::splat(0.5), 4.0);
        assert!((ahead - Vec3::new(5.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_pixel_center_viewport() {
        assert_eq!(pixel_center_viewport(0, 0, 4, 4), Vec2::splat(0.125));
        assert_eq!(pixel_center_viewport(3, 1, 4, 4), Vec2::new(0.875, 0.375));
    }
}
