//! Secondary area light reconstruction
//!
//! Each tick, the primary light's view is rendered into four small RGBA8
//! buffers. Connected, sufficiently lit surface regions in those buffers are
//! turned into planar polygonal lights that approximate one bounce of
//! indirect illumination.
//!
//! # Architecture
//!
//! - [`raster`] / [`encoding`] - Buffers and the packed-float pixel format
//! - [`camera::PerspectiveCamera`] - The offscreen camera at the light
//! - [`labeling::RegionLabeler`] - Union-find connected regions
//! - [`aggregate`] - Per-region albedo, illumination, bounds and plane samples
//! - [`contour::ContourTracer`] - Marching-squares outlines
//! - [`registry::PolygonRegistry`] - All live lights, batch slots and the frame barrier
//! - [`transfer::IrradianceTransfer`] - One primary light's pipeline, gated on change
//!
//! Plane fitting and simplification live in the `polygon` crate.

pub mod aggregate;
pub mod camera;
pub mod contour;
pub mod encoding;
pub mod error;
pub mod labeling;
pub mod light;
pub mod raster;
pub mod registry;
pub mod renderer;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_scene;

pub use aggregate::{PlaneSample, Region, aggregate_regions};
pub use camera::{PerspectiveCamera, Ray, ViewportCamera};
pub use contour::{ContourError, ContourTracer};
pub use error::{RegionError, TransferError};
pub use labeling::{BACKGROUND, LabelMap, RegionLabeler};
pub use light::{LightId, PolygonalAreaLight, PrimaryLight, ProjectionMode};
pub use raster::{PixelCoord, RasterBuffer, RasterBuffers, RasterError, Rgba8};
pub use registry::{BatchSummary, PolygonRegistry, RegistryError};
pub use renderer::{BufferRenderer, RenderError, RenderPass, RenderRequest};
pub use transfer::{IrradianceTransfer, UpdateOutcome};

pub use pal_config::{Resolution, TransferConfig};
