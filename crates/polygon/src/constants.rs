/// Epsilon for floating point comparisons in plane and area math.
pub const EPSILON: f32 = 1e-6;

/// Cosine above which two sample directions count as collinear (about 15 degrees).
pub const COLLINEAR_COSINE: f32 = 0.965_925_8;
