//! Packing of floats into RGBA8 pixels.
//!
//! A value in `[0, 1)` is stored as four base-255 digits, red most
//! significant. Decoding is the dot product of the channels with
//! [`DECODE_FACTORS`].

use crate::raster::Rgba8;

/// Channel weights for decoding a packed float
pub const DECODE_FACTORS: [f32; 4] = [
    1.0 / 255.0,
    1.0 / (255.0 * 255.0),
    1.0 / (255.0 * 255.0 * 255.0),
    1.0 / (255.0 * 255.0 * 255.0 * 255.0),
];

/// Depth pixel written where the camera saw no geometry
pub const NO_GEOMETRY: Rgba8 = Rgba8::WHITE;

/// Decode a packed float
#[inline]
pub fn decode_packed_float(pixel: Rgba8) -> f32 {
    pixel.r as f32 * DECODE_FACTORS[0]
        + pixel.g as f32 * DECODE_FACTORS[1]
        + pixel.b as f32 * DECODE_FACTORS[2]
        + pixel.a as f32 * DECODE_FACTORS[3]
}

/// Pack a float in `[0, 1)` into four base-255 digits.
///
/// Values outside the range are clamped.
pub fn encode_packed_float(value: f32) -> Rgba8 {
    let mut rest = (value as f64).clamp(0.0, 1.0 - 1e-9);
    let mut digits = [0u8; 4];
    for digit in &mut digits {
        rest *= 255.0;
        let whole = rest.floor().min(254.0);
        *digit = whole as u8;
        rest -= whole;
    }
    let [r, g, b, a] = digits;
    Rgba8::new(r, g, b, a)
}

/// Decode an illumination pixel, undoing the buffer intensity scale
#[inline]
pub fn decode_illumination(pixel: Rgba8, intensity_scale: f32) -> f32 {
    decode_packed_float(pixel) / intensity_scale
}

/// Encode an illumination value with the buffer intensity scale applied
pub fn encode_illumination(value: f32, intensity_scale: f32) -> Rgba8 {
    encode_packed_float(value * intensity_scale)
}

/// Decode a depth pixel to a forward distance from the camera
#[inline]
pub fn decode_depth(pixel: Rgba8, far_clip: f32) -> f32 {
    decode_packed_float(pixel) * far_clip
}

/// Encode a forward distance as a linear 0..1 depth pixel
pub fn encode_depth(distance: f32, far_clip: f32) -> Rgba8 {
    encode_packed_float(distance / far_clip)
}
