//! Viewer configuration parsing and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::customize::{Rgb, DEFAULT_EYE_COLOR, DEFAULT_SKIN_TONE};
use crate::error::{AvatarViewError, ConfigError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub render: RenderConfig,
    pub camera: CameraConfig,
    pub lighting: LightingConfig,
    pub avatar: AvatarConfig,
}

/// Render loop and output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Target frames per second for the render loop
    pub frame_rate: f32,
    /// Scene background color
    pub background: Rgb,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            background: Rgb::new(0xf8 as f32 / 255.0, 0xfa as f32 / 255.0, 0xfc as f32 / 255.0),
        }
    }
}

/// Orbit camera settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Initial camera position
    pub position: [f32; 3],
    /// Orbit target (head height)
    pub target: [f32; 3],
    /// Damping rate for orbit motion, per second. Higher snaps faster.
    pub damping: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            position: [0.0, 1.4, 3.0],
            target: [0.0, 1.4, 0.0],
            damping: 6.0,
        }
    }
}

/// Light tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Position the key light shines from (toward the origin)
    pub key_position: [f32; 3],
    /// Key light intensity
    pub key_intensity: f32,
    /// Hemisphere ambient intensity
    pub ambient_intensity: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            key_position: [3.0, 5.0, 5.0],
            key_intensity: 1.0,
            ambient_intensity: 0.8,
        }
    }
}

/// Avatar proxy geometry and default colors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Head sphere radius
    pub head_radius: f32,
    /// Head center height above the floor
    pub head_height: f32,
    /// Ground plane side length
    pub floor_size: f32,
    /// Ground plane color
    pub floor_color: Rgb,
    /// Skin tone used before any customization arrives
    pub default_skin_tone: Rgb,
    /// Eye color used before any customization arrives
    pub default_eye_color: Rgb,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            head_radius: 0.6,
            head_height: 1.4,
            floor_size: 10.0,
            floor_color: Rgb::new(0xdd as f32 / 255.0, 0xdd as f32 / 255.0, 0xdd as f32 / 255.0),
            default_skin_tone: DEFAULT_SKIN_TONE,
            default_eye_color: DEFAULT_EYE_COLOR,
        }
    }
}

impl ViewerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AvatarViewError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(s: &str) -> Result<Self, AvatarViewError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths, falling back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, AvatarViewError> {
        if let Some(path) = explicit {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let default_path = PathBuf::from("avatarview.toml");
        if default_path.exists() {
            tracing::info!("Loading config from: {}", default_path.display());
            return Self::from_file(default_path);
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AvatarViewError> {
        if !(self.render.frame_rate > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "render.frame_rate".to_string(),
                message: "Frame rate must be greater than 0".to_string(),
            }
            .into());
        }

        if !(0.0..180.0).contains(&self.camera.fov_degrees) || self.camera.fov_degrees == 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "camera.fov_degrees".to_string(),
                message: "Field of view must be in (0, 180)".to_string(),
            }
            .into());
        }

        if !(self.camera.damping > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "camera.damping".to_string(),
                message: "Damping must be greater than 0".to_string(),
            }
            .into());
        }

        if !(self.avatar.head_radius > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "avatar.head_radius".to_string(),
                message: "Head radius must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
