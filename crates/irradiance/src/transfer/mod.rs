//! Per-light irradiance transfer.
//!
//! An [`IrradianceTransfer`] owns the buffers and scratch state of one
//! primary light. Every tick it checks whether the light changed; if it did,
//! it re-renders, rebuilds its polygons and swaps them into the shared
//! [`PolygonRegistry`]. Either way its lights report in for the frame.

mod change;
mod reconstruct;

pub use change::{ChangeDetector, Changes, transform_fingerprint};

use pal_config::TransferConfig;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate_regions;
use crate::camera::PerspectiveCamera;
use crate::error::TransferError;
use crate::labeling::RegionLabeler;
use crate::light::{FinalizeParams, LightId, PrimaryLight, finalize_light};
use crate::raster::RasterBuffers;
use crate::registry::PolygonRegistry;
use crate::renderer::{BufferRenderer, RenderPass, RenderRequest};

use reconstruct::{ReconstructionScratch, reconstruct_region};

/// What one call to [`IrradianceTransfer::update`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// Pass that was rendered, `None` when nothing changed
    pub pass: Option<RenderPass>,
    /// Regions that passed the illumination threshold
    pub regions: usize,
    /// Lights this instance owns after the tick
    pub lights: usize,
    /// Regions that did not produce a light
    pub dropped: usize,
    /// Whether every registered light has reported for the frame
    pub barrier_satisfied: bool,
}

/// Reconstruction state for one primary light
#[derive(Debug)]
pub struct IrradianceTransfer {
    config: TransferConfig,
    buffers: RasterBuffers,
    labeler: RegionLabeler,
    scratch: ReconstructionScratch,
    change: ChangeDetector,
    owned: Vec<LightId>,
}

impl IrradianceTransfer {
    /// Create a transfer instance after validating `config`
    pub fn new(config: TransferConfig) -> Result<Self, TransferError> {
        config.validate()?;
        Ok(Self {
            buffers: RasterBuffers::new(config.resolution),
            config,
            labeler: RegionLabeler::new(),
            scratch: ReconstructionScratch::default(),
            change: ChangeDetector::default(),
            owned: Vec::new(),
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Replace the configuration; any change forces a full recompute next tick
    pub fn set_config(&mut self, config: TransferConfig) -> Result<(), TransferError> {
        config.validate()?;
        if config == self.config {
            return Ok(());
        }
        if config.resolution != self.config.resolution {
            self.buffers.resize(config.resolution);
        }
        self.config = config;
        self.change.invalidate();
        Ok(())
    }

    /// Lights this instance currently has registered
    pub fn lights(&self) -> &[LightId] {
        &self.owned
    }

    /// Buffers of the last render
    pub fn buffers(&self) -> &RasterBuffers {
        &self.buffers
    }

    /// The offscreen camera for `light` under the current configuration
    pub fn camera_for(&self, light: &PrimaryLight) -> PerspectiveCamera {
        PerspectiveCamera::from_transform(
            &light.transform,
            self.config.offscreen_camera_fov,
            self.config.near_clip,
            self.config.far_clip,
        )
    }

    /// Run one tick for `light`.
    ///
    /// # Arguments
    /// * `light` - Current state of the primary light
    /// * `renderer` - Fills the buffers when a recompute is needed
    /// * `registry` - Shared registry; call `begin_frame` on it before the
    ///   first transfer of a frame
    ///
    /// # Returns
    /// What the tick did. Renderer failures and malformed buffers are errors;
    /// regions that cannot become lights are dropped and counted.
    pub fn update<R: BufferRenderer + ?Sized>(
        &mut self,
        light: &PrimaryLight,
        renderer: &mut R,
        registry: &mut PolygonRegistry,
    ) -> Result<UpdateOutcome, TransferError> {
        let fov = self.config.offscreen_camera_fov;
        let Some(pass) = self.change.detect(light, fov).pass() else {
            let barrier_satisfied = self.report_all(registry)?;
            return Ok(UpdateOutcome {
                lights: self.owned.len(),
                barrier_satisfied,
                ..Default::default()
            });
        };

        self.release(registry);

        let camera = self.camera_for(light);
        let request = RenderRequest {
            camera: &camera,
            light,
            pass,
            illumination_scale: self.config.illumination_buffer_intensity_scale,
        };
        renderer.render(&request, &mut self.buffers)?;
        self.buffers.validate(self.config.resolution)?;
        self.change.commit(light, fov);

        let labels = self
            .labeler
            .label(&self.buffers.depth, &self.buffers.geometry)?;
        let regions = aggregate_regions(
            labels,
            &self.buffers,
            &camera,
            self.config.bounce_intensity_threshold,
            self.config.illumination_buffer_intensity_scale,
        );
        labels.clear_border();

        let params = FinalizeParams {
            vertex_offset: self.config.vertex_offset,
            bias: self.config.irradiance_bias,
            intensity_multiplier: self.config.irradiance_intensity_multiplier,
        };
        let mut dropped = 0;
        for region in &regions {
            match reconstruct_region(&mut self.scratch, labels, region, &camera, &self.config) {
                Ok(polygon) => {
                    debug!(
                        "Region {}: {} -> {} vertices in {} passes",
                        region.label,
                        polygon.report.initial_vertices,
                        polygon.report.final_vertices,
                        polygon.report.passes
                    );
                    let id = registry.allocate_id();
                    let record = finalize_light(
                        id,
                        &polygon.simplified.world,
                        polygon.plane.normal,
                        region,
                        light,
                        &params,
                    );
                    registry.register(record);
                    self.owned.push(id);
                }
                Err(error) if error.is_unexpected() => {
                    warn!("Dropping region: {}", error);
                    dropped += 1;
                }
                Err(error) => {
                    debug!("Dropping region: {}", error);
                    dropped += 1;
                }
            }
        }

        info!(
            "Rebuilt {} secondary lights from {} regions ({:?} pass, {} dropped)",
            self.owned.len(),
            regions.len(),
            pass,
            dropped
        );

        let barrier_satisfied = self.report_all(registry)?;
        Ok(UpdateOutcome {
            pass: Some(pass),
            regions: regions.len(),
            lights: self.owned.len(),
            dropped,
            barrier_satisfied,
        })
    }

    /// Remove every light this instance registered
    pub fn teardown(&mut self, registry: &mut PolygonRegistry) {
        self.release(registry);
        self.change.invalidate();
    }

    fn release(&mut self, registry: &mut PolygonRegistry) {
        for id in self.owned.drain(..) {
            registry.unregister(id);
        }
    }

    /// Report every owned light for this frame
    fn report_all(&mut self, registry: &mut PolygonRegistry) -> Result<bool, TransferError> {
        let before = self.owned.len();
        self.owned.retain(|id| registry.contains(*id));
        if self.owned.len() != before {
            warn!(
                "{} lights were removed from the registry behind this transfer",
                before - self.owned.len()
            );
        }

        let mut satisfied = registry.is_barrier_satisfied();
        for id in &self.owned {
            satisfied = registry.report_update(*id)?;
        }
        Ok(satisfied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ViewportCamera;
    use crate::encoding::{decode_illumination, encode_illumination};
    use crate::raster::Rgba8;
    use crate::registry::RegistryError;
    use crate::test_scene::{Patch, SyntheticScene};
    use glam::{Affine3A, Vec2, Vec3};
    use pal_config::Resolution;

    const DISTANCE: f32 = 5.0;
    const SIZE: f32 = 32.0;

    fn config() -> TransferConfig {
        TransferConfig::new(Resolution::R32)
    }

    fn primary() -> PrimaryLight {
        PrimaryLight::new(Affine3A::IDENTITY, Vec3::new(1.0, 0.5, 0.25), 1.0)
    }

    fn square(illumination: f32) -> Patch {
        Patch {
            x: 11..21,
            y: 11..21,
            albedo: Rgba8::new(200, 100, 50, 255),
            illumination,
        }
    }

    /// The value the pipeline sees after packing
    fn packed(illumination: f32) -> f32 {
        let scale = config().illumination_buffer_intensity_scale;
        decode_illumination(encode_illumination(illumination, scale), scale)
    }

    fn tick(
        transfer: &mut IrradianceTransfer,
        light: &PrimaryLight,
        scene: &mut SyntheticScene,
        registry: &mut PolygonRegistry,
    ) -> UpdateOutcome {
        registry.begin_frame();
        transfer.update(light, scene, registry).unwrap()
    }

    #[test]
    fn test_lit_square_becomes_one_quad() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(DISTANCE, vec![square(0.51)]);
        let light = primary();

        let outcome = tick(&mut transfer, &light, &mut scene, &mut registry);
        assert_eq!(outcome.pass, Some(RenderPass::Full));
        assert_eq!(outcome.regions, 1);
        assert_eq!(outcome.lights, 1);
        assert_eq!(outcome.dropped, 0);
        assert!(outcome.barrier_satisfied);

        assert_eq!(registry.len(), 1);
        let record = &registry.lights()[0];
        assert_eq!(record.vertex_count(), 4);
        assert!((record.normal - Vec3::NEG_Z).length() < 1e-5);
        assert!((record.intensity - packed(0.51)).abs() < 1e-5);
        let expected_color = light.color * Vec3::new(200.0, 100.0, 50.0) / 255.0;
        assert!((record.color - expected_color).length() < 1e-5);

        // Corners sit on the pixel corners of the square, pushed out by the
        // outline offset and lifted toward the light
        let camera = transfer.camera_for(&light);
        let offset = config().outline_offset;
        let lift = Vec3::NEG_Z * config().vertex_offset;
        let expected = [
            Vec2::new(11.0 - offset, 11.0 - offset),
            Vec2::new(11.0 - offset, 21.0 + offset),
            Vec2::new(21.0 + offset, 21.0 + offset),
            Vec2::new(21.0 + offset, 11.0 - offset),
        ];
        for (vertex, corner) in record.vertices.iter().zip(expected) {
            let world = camera.viewport_to_world_point(corner / SIZE, DISTANCE) + lift;
            assert!((*vertex - world).length() < 1e-3, "{vertex} vs {world}");
        }

        let summary = registry.flush().unwrap();
        assert_eq!(summary.num_polygons, 1);
        assert_eq!(summary.num_vertices, 4);
        assert_eq!(summary.buffer_size, 9);
    }

    #[test]
    fn test_dim_square_emits_nothing() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(DISTANCE, vec![square(0.49)]);

        let outcome = tick(&mut transfer, &primary(), &mut scene, &mut registry);
        assert_eq!(outcome.regions, 0);
        assert_eq!(outcome.lights, 0);
        assert!(registry.is_empty());
        assert!(outcome.barrier_satisfied);
    }

    #[test]
    fn test_two_blobs_keep_their_albedo() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let red = Rgba8::new(255, 0, 0, 255);
        let blue = Rgba8::new(0, 0, 255, 255);
        let mut scene = SyntheticScene::new(
            DISTANCE,
            vec![
                Patch {
                    x: 6..12,
                    y: 10..20,
                    albedo: red,
                    illumination: 0.8,
                },
                Patch {
                    x: 18..26,
                    y: 10..20,
                    albedo: blue,
                    illumination: 0.8,
                },
            ],
        );
        let light = PrimaryLight::new(Affine3A::IDENTITY, Vec3::ONE, 1.0);

        let outcome = tick(&mut transfer, &light, &mut scene, &mut registry);
        assert_eq!(outcome.lights, 2);
        assert_eq!(registry.len(), 2);

        for record in registry.lights() {
            assert_eq!(record.vertex_count(), 4);
            let expected = if record.centroid.x < 0.0 { Vec3::X } else { Vec3::Z };
            assert!((record.color - expected).length() < 1e-5);
        }
        assert!(registry.lights()[0].centroid.x * registry.lights()[1].centroid.x < 0.0);
    }

    #[test]
    fn test_line_is_dropped() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(
            DISTANCE,
            vec![Patch {
                x: 11..21,
                y: 15..16,
                albedo: Rgba8::WHITE,
                illumination: 0.8,
            }],
        );

        let outcome = tick(&mut transfer, &primary(), &mut scene, &mut registry);
        assert_eq!(outcome.regions, 1);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.lights, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unchanged_light_only_reports() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(DISTANCE, vec![square(0.8)]);
        let light = primary();

        tick(&mut transfer, &light, &mut scene, &mut registry);
        let first = transfer.lights().to_vec();

        let outcome = tick(&mut transfer, &light, &mut scene, &mut registry);
        assert_eq!(outcome.pass, None);
        assert_eq!(outcome.lights, 1);
        assert!(outcome.barrier_satisfied);
        assert_eq!(transfer.lights(), first.as_slice());
        assert_eq!(scene.passes, vec![RenderPass::Full]);
        assert!(registry.flush().is_ok());
    }

    #[test]
    fn test_intensity_change_renders_illumination_only() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(DISTANCE, vec![square(0.6)]);
        let mut light = primary();

        tick(&mut transfer, &light, &mut scene, &mut registry);
        let first = transfer.lights().to_vec();

        light.intensity = 2.0;
        let outcome = tick(&mut transfer, &light, &mut scene, &mut registry);
        assert_eq!(outcome.pass, Some(RenderPass::IlluminationOnly));
        assert_eq!(outcome.lights, 1);
        assert_ne!(transfer.lights(), first.as_slice());
        assert!(!registry.contains(first[0]));

        let record = &registry.lights()[0];
        assert!((record.intensity - packed(1.2)).abs() < 1e-4);
        assert_eq!(scene.passes, vec![RenderPass::Full, RenderPass::IlluminationOnly]);
    }

    #[test]
    fn test_moving_light_renders_full_pass() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(DISTANCE, vec![square(0.8)]);
        let mut light = primary();

        tick(&mut transfer, &light, &mut scene, &mut registry);
        light.transform = Affine3A::from_translation(Vec3::new(0.0, 0.5, 0.0));
        let outcome = tick(&mut transfer, &light, &mut scene, &mut registry);
        assert_eq!(outcome.pass, Some(RenderPass::Full));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_config_change_forces_recompute() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(DISTANCE, vec![square(0.8)]);
        let light = primary();

        tick(&mut transfer, &light, &mut scene, &mut registry);

        let mut wider = config();
        wider.offscreen_camera_fov = 120.0;
        transfer.set_config(wider).unwrap();
        let outcome = tick(&mut transfer, &light, &mut scene, &mut registry);
        assert_eq!(outcome.pass, Some(RenderPass::Full));

        let mut invalid = config();
        invalid.offscreen_camera_fov = 10.0;
        assert!(transfer.set_config(invalid).is_err());
        assert_eq!(transfer.config().offscreen_camera_fov, 120.0);
    }

    #[test]
    fn test_render_failure_is_retried() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(DISTANCE, vec![square(0.8)]);
        scene.fail = true;
        let light = primary();

        registry.begin_frame();
        assert!(matches!(
            transfer.update(&light, &mut scene, &mut registry),
            Err(TransferError::Render(_))
        ));

        scene.fail = false;
        let outcome = tick(&mut transfer, &light, &mut scene, &mut registry);
        assert_eq!(outcome.pass, Some(RenderPass::Full));
        assert_eq!(outcome.lights, 1);
    }

    #[test]
    fn test_teardown_unregisters_everything() {
        let mut transfer = IrradianceTransfer::new(config()).unwrap();
        let mut registry = PolygonRegistry::new();
        let mut scene = SyntheticScene::new(DISTANCE, vec![square(0.8)]);

        tick(&mut transfer, &primary(), &mut scene, &mut registry);
        assert_eq!(registry.len(), 1);

        transfer.teardown(&mut registry);
        assert!(registry.is_empty());
        assert!(transfer.lights().is_empty());
    }

    #[test]
    fn test_two_transfers_share_the_barrier() {
        let mut registry = PolygonRegistry::new();
        let mut near = IrradianceTransfer::new(config()).unwrap();
        let mut far = IrradianceTransfer::new(config()).unwrap();
        let mut near_scene = SyntheticScene::new(DISTANCE, vec![square(0.8)]);
        let mut far_scene = SyntheticScene::new(2.0 * DISTANCE, vec![square(0.8)]);
        let light = primary();

        registry.begin_frame();
        let first = near.update(&light, &mut near_scene, &mut registry).unwrap();
        assert!(first.barrier_satisfied);
        let second = far.update(&light, &mut far_scene, &mut registry).unwrap();
        assert!(second.barrier_satisfied);
        assert_eq!(registry.len(), 2);

        // Next frame: only one instance has reported
        registry.begin_frame();
        let partial = near.update(&light, &mut near_scene, &mut registry).unwrap();
        assert!(!partial.barrier_satisfied);
        assert!(matches!(
            registry.flush(),
            Err(RegistryError::BarrierNotSatisfied { reported: 1, registered: 2 })
        ));
        far.update(&light, &mut far_scene, &mut registry).unwrap();
        assert!(registry.flush().is_ok());
    }
}
