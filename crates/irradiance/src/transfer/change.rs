//! Gate that decides whether a tick needs to recompute anything.

use glam::{Affine3A, Vec3};

use crate::light::PrimaryLight;
use crate::renderer::RenderPass;

/// What changed since the last recompute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Changes {
    /// Light moved or rotated, or the camera FOV changed
    pub transform: bool,
    pub intensity: bool,
}

impl Changes {
    /// The render pass the changes call for, `None` when nothing changed
    pub fn pass(&self) -> Option<RenderPass> {
        if self.transform {
            Some(RenderPass::Full)
        } else if self.intensity {
            Some(RenderPass::IlluminationOnly)
        } else {
            None
        }
    }
}

/// Position of the point `(1, 1, 1)` under a transform.
///
/// Moves whenever the transform translates, rotates or scales.
pub fn transform_fingerprint(transform: &Affine3A) -> Vec3 {
    transform.transform_point3(Vec3::ONE)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Snapshot {
    fingerprint: Vec3,
    fov: f32,
    intensity: f32,
}

/// Remembers the light state of the last successful recompute
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    last: Option<Snapshot>,
}

impl ChangeDetector {
    /// Compare `light` and the configured `fov` against the last recompute.
    ///
    /// Everything counts as changed before the first recompute.
    pub fn detect(&self, light: &PrimaryLight, fov: f32) -> Changes {
        let Some(last) = self.last else {
            return Changes {
                transform: true,
                intensity: true,
            };
        };
        let moved = transform_fingerprint(&light.transform).distance(last.fingerprint) > f32::EPSILON;
        Changes {
            transform: moved || fov != last.fov,
            intensity: (light.intensity - last.intensity).abs() > f32::EPSILON,
        }
    }

    /// Record the state a recompute was done for
    pub fn commit(&mut self, light: &PrimaryLight, fov: f32) {
        self.last = Some(Snapshot {
            fingerprint: transform_fingerprint(&light.transform),
            fov,
            intensity: light.intensity,
        });
    }

    /// Forget the last recompute so the next tick redoes everything
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(translation: Vec3, intensity: f32) -> PrimaryLight {
        PrimaryLight::new(Affine3A::from_translation(translation), Vec3::ONE, intensity)
    }

    #[test]
    fn test_first_update_always_runs() {
        let detector = ChangeDetector::default();
        assert_eq!(
            detector.detect(&light(Vec3::ZERO, 1.0), 145.0).pass(),
            Some(RenderPass::Full)
        );
    }

    #[test]
    fn test_unchanged_light_is_skipped() {
        let mut detector = ChangeDetector::default();
        let l = light(Vec3::new(1.0, 2.0, 3.0), 1.0);
        detector.commit(&l, 145.0);
        let changes = detector.detect(&l, 145.0);
        assert_eq!(changes, Changes::default());
        assert_eq!(changes.pass(), None);
    }

    #[test]
    fn test_intensity_only_change() {
        let mut detector = ChangeDetector::default();
        detector.commit(&light(Vec3::ZERO, 1.0), 145.0);
        let changes = detector.detect(&light(Vec3::ZERO, 1.5), 145.0);
        assert!(changes.intensity && !changes.transform);
        assert_eq!(changes.pass(), Some(RenderPass::IlluminationOnly));
    }

    #[test]
    fn test_movement_and_fov_are_transform_changes() {
        let mut detector = ChangeDetector::default();
        detector.commit(&light(Vec3::ZERO, 1.0), 145.0);
        assert!(detector.detect(&light(Vec3::new(0.0, 0.01, 0.0), 1.0), 145.0).transform);
        assert!(detector.detect(&light(Vec3::ZERO, 1.0), 120.0).transform);

        let rotated = PrimaryLight::new(
            Affine3A::from_rotation_y(0.1),
            Vec3::ONE,
            1.0,
        );
        assert_eq!(detector.detect(&rotated, 145.0).pass(), Some(RenderPass::Full));
    }

    #[test]
    fn test_invalidate_forces_full_pass() {
        let mut detector = ChangeDetector::default();
        let l = light(Vec3::ZERO, 1.0);
        detector.commit(&l, 145.0);
        detector.invalidate();
        assert_eq!(detector.detect(&l, 145.0).pass(), Some(RenderPass::Full));
    }
}
