//! Shared configuration for secondary area light reconstruction
//!
//! This crate is the single source of truth for the tunables of the
//! irradiance transfer pipeline: offscreen buffer resolution, thresholds,
//! camera clip planes, marching-squares outline offset and simplifier limits.
//! Registry capacity lives in [`RegistryConfig`], which configures the one
//! registry shared by every transfer instance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "bevy")]
use bevy::prelude::Resource;

/// Default minimum decoded illumination for a pixel to emit bounce light
pub const DEFAULT_BOUNCE_INTENSITY_THRESHOLD: f32 = 0.5;

/// Default offscreen camera vertical field of view in degrees
pub const DEFAULT_OFFSCREEN_CAMERA_FOV: f32 = 145.0;

/// Default near clip distance of the offscreen camera
pub const DEFAULT_NEAR_CLIP: f32 = 0.1;

/// Default far clip distance of the offscreen camera
pub const DEFAULT_FAR_CLIP: f32 = 50.0;

/// Scale applied to illumination before it is packed into the RGBA8 buffer
pub const DEFAULT_ILLUMINATION_BUFFER_INTENSITY_SCALE: f32 = 0.01;

/// Fraction of a pixel the traced outline is pushed away from the region
pub const DEFAULT_OUTLINE_OFFSET: f32 = 0.01;

/// Largest accepted angle between a polygon plane and the view direction
pub const DEFAULT_MAX_PLANE_NORMAL_ANGLE: f32 = 80.0;

/// Distance reconstructed vertices are lifted off their surface
pub const DEFAULT_VERTEX_OFFSET: f32 = 0.001;

/// Default simplifier pass budget
pub const DEFAULT_MAX_PASSES: u32 = 128;

/// Default largest triplet area (as a fraction of polygon area) a vertex may have and still be removed
pub const DEFAULT_AREA_FRACTION: f32 = 0.01;

/// Default fraction of the reference area the simplifier must preserve
pub const DEFAULT_AREA_FLOOR: f32 = 0.995;

/// Default minimum vertex count the simplifier reduces to
pub const DEFAULT_VERTEX_FLOOR: usize = 5;

/// Default number of shader constant slots available to the light batch
pub const DEFAULT_REGISTRY_CAPACITY: usize = 1023;

/// Errors produced when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported buffer resolution: {0}")]
    UnsupportedResolution(u32),
    #[error("{field} = {value} is outside the allowed range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Near clip {near} must be positive and smaller than far clip {far}")]
    InvalidClipPlanes { near: f32, far: f32 },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Square resolution of the offscreen buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Resolution {
    R16,
    R32,
    R48,
    #[default]
    R64,
    R96,
    R128,
    R192,
    R256,
}

impl Resolution {
    /// Every supported resolution, smallest first
    pub const ALL: [Resolution; 8] = [
        Resolution::R16,
        Resolution::R32,
        Resolution::R48,
        Resolution::R64,
        Resolution::R96,
        Resolution::R128,
        Resolution::R192,
        Resolution::R256,
    ];

    /// Edge length in pixels
    pub fn size(self) -> u32 {
        match self {
            Resolution::R16 => 16,
            Resolution::R32 => 32,
            Resolution::R48 => 48,
            Resolution::R64 => 64,
            Resolution::R96 => 96,
            Resolution::R128 => 128,
            Resolution::R192 => 192,
            Resolution::R256 => 256,
        }
    }

    /// Total pixel count of one buffer
    pub fn pixel_count(self) -> usize {
        let size = self.size() as usize;
        size * size
    }
}

impl TryFrom<u32> for Resolution {
    type Error = ConfigError;

    fn try_from(size: u32) -> Result<Self, Self::Error> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.size() == size)
            .ok_or(ConfigError::UnsupportedResolution(size))
    }
}

impl From<Resolution> for u32 {
    fn from(resolution: Resolution) -> Self {
        resolution.size()
    }
}

/// Limits for the statistical triplet-area simplifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyConfig {
    /// Maximum number of removal passes
    pub max_passes: u32,
    /// A vertex is only removable if its triplet area is below this fraction of the polygon area
    pub area_fraction: f32,
    /// Simplification never takes the area below this fraction of the reference area
    pub area_floor: f32,
    /// Simplification stops once this many vertices remain
    pub vertex_floor: usize,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            area_fraction: DEFAULT_AREA_FRACTION,
            area_floor: DEFAULT_AREA_FLOOR,
            vertex_floor: DEFAULT_VERTEX_FLOOR,
        }
    }
}

/// Settings of the light registry batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Constant slots available; each light uses 5 plus one per vertex
    pub capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_REGISTRY_CAPACITY,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("capacity", self.capacity as f32, 8.0, 1_048_576.0)
    }
}

/// Configuration of one irradiance transfer instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "bevy", derive(Resource))]
#[serde(default)]
pub struct TransferConfig {
    /// Offscreen buffer resolution
    pub resolution: Resolution,
    /// Minimum decoded illumination for a pixel to join a region
    pub bounce_intensity_threshold: f32,
    /// Bias copied onto every reconstructed light
    pub irradiance_bias: f32,
    /// Multiplier applied to the average region illumination
    pub irradiance_intensity_multiplier: f32,
    /// Offscreen camera field of view in degrees
    pub offscreen_camera_fov: f32,
    /// Offscreen camera near clip distance
    pub near_clip: f32,
    /// Offscreen camera far clip distance
    pub far_clip: f32,
    /// Compression factor the renderer applied to the illumination buffer
    pub illumination_buffer_intensity_scale: f32,
    /// Outline bias of traced contours, in pixels
    pub outline_offset: f32,
    /// Planes seen at a steeper angle than this (degrees) are rejected
    pub max_plane_normal_angle: f32,
    /// Lift of the final vertices along the plane normal
    pub vertex_offset: f32,
    pub simplify: SimplifyConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            bounce_intensity_threshold: DEFAULT_BOUNCE_INTENSITY_THRESHOLD,
            irradiance_bias: 0.0,
            irradiance_intensity_multiplier: 1.0,
            offscreen_camera_fov: DEFAULT_OFFSCREEN_CAMERA_FOV,
            near_clip: DEFAULT_NEAR_CLIP,
            far_clip: DEFAULT_FAR_CLIP,
            illumination_buffer_intensity_scale: DEFAULT_ILLUMINATION_BUFFER_INTENSITY_SCALE,
            outline_offset: DEFAULT_OUTLINE_OFFSET,
            max_plane_normal_angle: DEFAULT_MAX_PLANE_NORMAL_ANGLE,
            vertex_offset: DEFAULT_VERTEX_OFFSET,
            simplify: SimplifyConfig::default(),
        }
    }
}

impl TransferConfig {
    /// Create a config with the given resolution and default tunables
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    /// Parse a JSON document (missing fields take their defaults) and validate it
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TransferConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every tunable against its supported range
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "bounce_intensity_threshold",
            self.bounce_intensity_threshold,
            0.0,
            2.0,
        )?;
        check_range("irradiance_bias", self.irradiance_bias, 0.0, 2.0)?;
        check_range(
            "irradiance_intensity_multiplier",
            self.irradiance_intensity_multiplier,
            f32::MIN_POSITIVE,
            f32::MAX,
        )?;
        check_range("offscreen_camera_fov", self.offscreen_camera_fov, 90.0, 165.0)?;
        if !(self.near_clip > 0.0 && self.near_clip < self.far_clip && self.far_clip.is_finite()) {
            return Err(ConfigError::InvalidClipPlanes {
                near: self.near_clip,
                far: self.far_clip,
            });
        }
        check_range(
            "illumination_buffer_intensity_scale",
            self.illumination_buffer_intensity_scale,
            f32::MIN_POSITIVE,
            1.0,
        )?;
        check_range("outline_offset", self.outline_offset, 0.0, 0.49)?;
        check_range("max_plane_normal_angle", self.max_plane_normal_angle, 1.0, 90.0)?;
        check_range("vertex_offset", self.vertex_offset, 0.0, 1.0)?;

        let simplify = &self.simplify;
        check_range("simplify.max_passes", simplify.max_passes as f32, 1.0, 65536.0)?;
        check_range(
            "simplify.area_fraction",
            simplify.area_fraction,
            f32::MIN_POSITIVE,
            1.0,
        )?;
        check_range("simplify.area_floor", simplify.area_floor, f32::MIN_POSITIVE, 1.0)?;
        check_range(
            "simplify.vertex_floor",
            simplify.vertex_floor as f32,
            3.0,
            4096.0,
        )?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as f64,
            min: min as f64,
            max: max as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransferConfig::default();
        assert_eq!(config.resolution, Resolution::R64);
        assert_eq!(config.bounce_intensity_threshold, DEFAULT_BOUNCE_INTENSITY_THRESHOLD);
        assert_eq!(config.offscreen_camera_fov, DEFAULT_OFFSCREEN_CAMERA_FOV);
        assert_eq!(config.simplify.vertex_floor, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_registry_config_is_separate() {
        let registry = RegistryConfig::default();
        assert_eq!(registry.capacity, 1023);
        assert!(registry.validate().is_ok());
        assert!(RegistryConfig { capacity: 4 }.validate().is_err());

        // Transfer configs carry no registry settings
        let json = serde_json::to_string(&TransferConfig::default()).unwrap();
        assert!(!json.contains("capacity"));
    }

    #[test]
    fn test_resolution_sizes() {
        let sizes: Vec<u32> = Resolution::ALL.iter().map(|r| r.size()).collect();
        assert_eq!(sizes, vec![16, 32, 48, 64, 96, 128, 192, 256]);
        assert_eq!(Resolution::R32.pixel_count(), 1024);
        assert_eq!(Resolution::try_from(48).ok(), Some(Resolution::R48));
        assert!(matches!(
            Resolution::try_from(100),
            Err(ConfigError::UnsupportedResolution(100))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TransferConfig::from_json_str(
            r#"{ "resolution": 32, "bounce_intensity_threshold": 0.25, "simplify": { "vertex_floor": 6 } }"#,
        )
        .unwrap();
        assert_eq!(config.resolution, Resolution::R32);
        assert_eq!(config.bounce_intensity_threshold, 0.25);
        assert_eq!(config.simplify.vertex_floor, 6);
        assert_eq!(config.simplify.max_passes, DEFAULT_MAX_PASSES);
        assert_eq!(config.far_clip, DEFAULT_FAR_CLIP);
    }

    #[test]
    fn test_json_rejects_unknown_resolution() {
        let result = TransferConfig::from_json_str(r#"{ "resolution": 20 }"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = TransferConfig::default();
        config.offscreen_camera_fov = 170.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "offscreen_camera_fov", .. })
        ));

        let mut config = TransferConfig::default();
        config.near_clip = 60.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidClipPlanes { .. })
        ));

        let mut config = TransferConfig::default();
        config.simplify.vertex_floor = 2;
        assert!(config.validate().is_err());

        let mut config = TransferConfig::default();
        config.bounce_intensity_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = TransferConfig::new(Resolution::R128);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"resolution\":128"));
        let parsed = TransferConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
