//! Error types for the transfer pipeline.

use polygon::{LoopError, PlaneError};
use thiserror::Error;

use crate::contour::ContourError;
use crate::raster::RasterError;
use crate::registry::RegistryError;
use crate::renderer::RenderError;

/// Reasons one region does not become a light; the tick carries on without it
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("Region {label} has {found} usable plane samples, needs 3")]
    InsufficientPlaneSamples { label: i32, found: usize },

    #[error("Region {label}: {source}")]
    Plane { label: i32, source: PlaneError },

    #[error(transparent)]
    Contour(#[from] ContourError),

    #[error("Region {label}: outline point {index} does not hit the plane")]
    MissedPlane { label: i32, index: usize },

    #[error("Region {label}: {source}")]
    Loop { label: i32, source: LoopError },

    #[error("Region {label} simplified to {count} vertices")]
    TooFewVertices { label: i32, count: usize },
}

impl RegionError {
    /// Whether the region's label data broke the outline walk.
    ///
    /// A labeled region always has a closed outline inside its padded box, so
    /// these point at a pipeline fault. Every other variant is an ordinary
    /// rejection such as a grazing plane or a sliver outline.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, RegionError::Contour(_))
    }
}

/// Errors that abort a whole transfer tick
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] pal_config::ConfigError),

    #[error("Renderer failed: {0}")]
    Render(#[from] RenderError),

    #[error("Renderer produced unusable buffers: {0}")]
    Raster(#[from] RasterError),

    #[error("Registry rejected an update: {0}")]
    Registry(#[from] RegistryError),
}
