//! Configuration system
//!
//! [`SceneConfig`] carries everything the scene context needs at start-up:
//! window size, camera placement, the fonts to load on first use and the
//! collision settings. It can be read from TOML or RON through [`Config`].

use std::path::{Path, PathBuf};

pub use serde::{Deserialize, Serialize};

use crate::physics::collision::IntersectionFormula;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Try different formats
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values that parse but cannot be used
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Drawable surface size and clear color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA clear color
    pub clear_color: [f32; 4],
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 900,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Initial camera placement and projection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
    /// Eye location
    pub eye: [f32; 3],
    /// Point the camera looks at
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            eye: [0.0, 0.0, 5.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

/// A bitmap font: its metrics table and the atlas image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSource {
    /// Glyph metrics CSV
    pub metrics: PathBuf,
    /// Atlas image
    pub atlas: PathBuf,
}

/// Ray picking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Parallel-ray and minimum-distance threshold
    pub epsilon: f32,
    /// How the hit distance is derived in the ray/triangle test
    pub formula: IntersectionFormula,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            formula: IntersectionFormula::Standard,
        }
    }
}

/// Top-level scene configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Default log filter, used when `RUST_LOG` is unset
    ///
    /// Applied by [`crate::foundation::logging::init_from_config`].
    pub log_level: String,
    /// Surface settings
    pub window: WindowConfig,
    /// Camera settings
    pub camera: CameraConfig,
    /// Fonts loaded the first time a text object is created
    pub fonts: Vec<FontSource>,
    /// Picking settings
    pub collision: CollisionConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            fonts: Vec::new(),
            collision: CollisionConfig::default(),
        }
    }
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// Add a font source
    #[must_use]
    pub fn with_font(mut self, metrics: impl Into<PathBuf>, atlas: impl Into<PathBuf>) -> Self {
        self.fonts.push(FontSource {
            metrics: metrics.into(),
            atlas: atlas.into(),
        });
        self
    }

    /// Set the window size
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        let camera = &self.camera;
        if camera.near <= 0.0 || camera.far <= camera.near {
            return Err(ConfigError::Invalid(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                camera.near, camera.far
            )));
        }
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "field of view must be in (0, 180) degrees, got {}",
                camera.fov_degrees
            )));
        }
        if camera.eye == camera.target {
            return Err(ConfigError::Invalid("camera eye and target coincide".to_string()));
        }

        if self.collision.epsilon < 0.0 {
            return Err(ConfigError::Invalid("collision epsilon must not be negative".to_string()));
        }

        Ok(())
    }
}
