//! Planar polygon geometry for reconstructed secondary area lights
//!
//! This crate provides the geometry half of the reconstruction pipeline:
//! - [`plane::PolygonPlane`] - Best-fit plane with a deterministic tangent basis
//! - [`area`] - Shoelace polygon area and triplet (triangle) areas
//! - [`vertex_loop::VertexLoop`] - Arena of linked vertex slots with logical deletion
//! - [`simplify`] - Statistical triplet-area reduction of a vertex loop
//!
//! Nothing here knows about raster buffers or cameras; callers hand in world
//! positions and get back reduced loops.

pub mod area;
pub mod constants;
pub mod plane;
pub mod simplify;
pub mod vertex_loop;

pub use area::*;
pub use constants::*;
pub use plane::*;
pub use simplify::*;
pub use vertex_loop::*;
