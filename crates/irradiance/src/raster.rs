//! RGBA8 raster buffers produced by the offscreen light camera.
//!
//! Rows are stored bottom-up: `y = 0` is the lowest row, matching viewport
//! coordinates where `(0, 0)` is the lower-left corner.

use std::cmp::Ordering;

use bytemuck::{Pod, Zeroable};
use pal_config::Resolution;
use thiserror::Error;

/// One RGBA8 pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Rgba8 = Rgba8::new(0, 0, 0, 0);
    pub const WHITE: Rgba8 = Rgba8::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Channels as an array, red first
    pub const fn channels(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Errors raised when buffers do not have the shape the pipeline expects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    #[error("{buffer} buffer is {width}x{height}, expected {expected}x{expected}")]
    SizeMismatch {
        buffer: &'static str,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error("Expected {expected} bytes of RGBA8 data, got {actual}")]
    ByteLength { expected: usize, actual: usize },
}

/// Integer pixel coordinate
///
/// Ordered row-major: by `y` first, then `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelCoord {
    pub x: u32,
    pub y: u32,
}

impl PixelCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl Ord for PixelCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for PixelCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A width x height grid of RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgba8>,
}

impl RasterBuffer {
    /// Create a buffer filled with transparent black
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgba8::TRANSPARENT)
    }

    /// Create a buffer filled with one color
    pub fn filled(width: u32, height: u32, color: Rgba8) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Wrap raw RGBA8 bytes, rows bottom-up
    pub fn from_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(RasterError::ByteLength {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels: bytemuck::cast_slice(bytes).to_vec(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Flat index of `(x, y)`; callers guarantee the coordinate is in range
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x < self.width && y < self.height {
            Some(self.pixels[self.index(x, y)])
        } else {
            None
        }
    }

    /// Write one pixel; out-of-range writes are ignored
    pub fn set(&mut self, x: u32, y: u32, color: Rgba8) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.pixels[index] = color;
        }
    }

    pub fn fill(&mut self, color: Rgba8) {
        self.pixels.fill(color);
    }

    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    /// Raw RGBA8 bytes, rows bottom-up
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Resize to `width` x `height`, clearing the contents
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize(width as usize * height as usize, Rgba8::TRANSPARENT);
    }

    fn check_square(&self, buffer: &'static str, expected: u32) -> Result<(), RasterError> {
        if self.width != expected || self.height != expected || self.pixels.len() != (expected * expected) as usize {
            return Err(RasterError::SizeMismatch {
                buffer,
                width: self.width,
                height: self.height,
                expected,
            });
        }
        Ok(())
    }
}

/// The four buffers rendered from the primary light's point of view
///
/// - `albedo`: surface color, alpha unused
/// - `depth`: linear 0..1 depth (distance / far clip) packed into RGBA; all
///   channels 255 marks a pixel that saw no geometry
/// - `geometry`: merge flags derived from normals and depth discontinuities;
///   `r > 0` lets a pixel join its left neighbor, `g > 0` its lower neighbor
/// - `illumination`: direct irradiance times the buffer scale, packed into RGBA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffers {
    pub albedo: RasterBuffer,
    pub depth: RasterBuffer,
    pub geometry: RasterBuffer,
    pub illumination: RasterBuffer,
}

impl RasterBuffers {
    /// Allocate all four buffers at `resolution`
    pub fn new(resolution: Resolution) -> Self {
        let size = resolution.size();
        Self {
            albedo: RasterBuffer::new(size, size),
            depth: RasterBuffer::new(size, size),
            geometry: RasterBuffer::new(size, size),
            illumination: RasterBuffer::new(size, size),
        }
    }

    /// Reallocate every buffer at a new resolution
    pub fn resize(&mut self, resolution: Resolution) {
        let size = resolution.size();
        self.albedo.resize(size, size);
        self.depth.resize(size, size);
        self.geometry.resize(size, size);
        self.illumination.resize(size, size);
    }

    /// Check that all four buffers are `resolution` square
    pub fn validate(&self, resolution: Resolution) -> Result<(), RasterError> {
        let size = resolution.size();
        self.albedo.check_square("albedo", size)?;
        self.depth.check_square("depth", size)?;
        self.geometry.check_square("geometry", size)?;
        self.illumination.check_square("illumination", size)?;
        Ok(())
    }
}
