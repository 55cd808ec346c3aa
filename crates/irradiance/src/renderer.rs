//! Seam between the reconstruction and whatever rasterizes the light's view.

use thiserror::Error;

use crate::camera::PerspectiveCamera;
use crate::light::PrimaryLight;
use crate::raster::RasterBuffers;

/// Which buffers a render has to refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    /// All four buffers; the light moved or the camera changed
    Full,
    /// Only the illumination buffer; geometry is unchanged
    IlluminationOnly,
}

/// Everything a renderer needs to fill the buffers
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub camera: &'a PerspectiveCamera,
    pub light: &'a PrimaryLight,
    pub pass: RenderPass,
    /// Factor to multiply illumination by before packing it
    pub illumination_scale: f32,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Rendering failed: {0}")]
    Failed(String),
}

/// Trait for backends that render the primary light's view
pub trait BufferRenderer {
    /// Fill `buffers` for `request`.
    ///
    /// Buffers arrive sized to the configured resolution and must keep that
    /// size. With [`RenderPass::IlluminationOnly`] the other buffers still
    /// hold the previous full render.
    fn render(&mut self, request: &RenderRequest<'_>, buffers: &mut RasterBuffers) -> Result<(), RenderError>;
}
