//! Synthetic renderer for tests: flat patches facing the light at a fixed depth.

use std::ops::Range;

use crate::encoding::{NO_GEOMETRY, encode_depth, encode_illumination};
use crate::raster::{RasterBuffers, Rgba8};
use crate::renderer::{BufferRenderer, RenderError, RenderPass, RenderRequest};
use crate::ViewportCamera;

/// Geometry flags letting a pixel join both its left and lower neighbor
pub(crate) const MERGE_ALL: Rgba8 = Rgba8::new(255, 255, 0, 0);

/// A lit rectangle of pixels
#[derive(Debug, Clone)]
pub(crate) struct Patch {
    pub x: Range<u32>,
    pub y: Range<u32>,
    pub albedo: Rgba8,
    /// Illumination at light intensity 1
    pub illumination: f32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SyntheticScene {
    /// Forward distance of every patch from the light
    pub distance: f32,
    pub patches: Vec<Patch>,
    /// Passes rendered so far
    pub passes: Vec<RenderPass>,
    pub fail: bool,
}

impl SyntheticScene {
    pub fn new(distance: f32, patches: Vec<Patch>) -> Self {
        Self {
            distance,
            patches,
            ..Default::default()
        }
    }
}

impl BufferRenderer for SyntheticScene {
    fn render(&mut self, request: &RenderRequest<'_>, buffers: &mut RasterBuffers) -> Result<(), RenderError> {
        if self.fail {
            return Err(RenderError::Failed("synthetic failure".to_string()));
        }
        self.passes.push(request.pass);

        let full = request.pass == RenderPass::Full;
        if full {
            buffers.depth.fill(NO_GEOMETRY);
            buffers.albedo.fill(Rgba8::TRANSPARENT);
            buffers.geometry.fill(Rgba8::TRANSPARENT);
        }
        buffers.illumination.fill(Rgba8::TRANSPARENT);

        let depth = encode_depth(self.distance, request.camera.far_clip());
        for patch in &self.patches {
            let illumination = encode_illumination(
                patch.illumination * request.light.intensity,
                request.illumination_scale,
            );
            for y in patch.y.clone() {
                for x in patch.x.clone() {
                    if full {
                        buffers.depth.set(x, y, depth);
                        buffers.albedo.set(x, y, patch.albedo);
                        buffers.geometry.set(x, y, MERGE_ALL);
                    }
                    buffers.illumination.set(x, y, illumination);
                }
            }
        }
        Ok(())
    }
}
