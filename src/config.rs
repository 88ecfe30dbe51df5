//! Configuration parsing and management for furcat

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::avatar::expression::{ExpressionDef, ExpressionTable};
use crate::avatar::presentation::PresentationMode;
use crate::color::Rgb;
use crate::error::{ConfigError, FurcatError};
use crate::fur::FurParams;
use crate::model::ModelStyle;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assets: AssetsConfig,
    pub fur: FurConfig,
    pub appearance: AppearanceConfig,
    pub camera: CameraConfig,
    pub window: WindowConfig,
    pub expressions: Vec<ExpressionDef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets: AssetsConfig::default(),
            fur: FurConfig::default(),
            appearance: AppearanceConfig::default(),
            camera: CameraConfig::default(),
            window: WindowConfig::default(),
            expressions: ExpressionDef::defaults(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FurcatError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, FurcatError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from an explicit path, or the first default path that exists
    pub fn load(explicit: Option<&Path>) -> Result<Self, FurcatError> {
        if let Some(path) = explicit {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let paths = [
            PathBuf::from("furcat.toml"),
            PathBuf::from("config/furcat.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FurcatError> {
        self.fur.params()?;
        self.appearance.style()?;
        self.camera.validate()?;
        self.expression_table()?;

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window".to_string(),
                message: "Window size must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Build the expression lookup table
    pub fn expression_table(&self) -> Result<ExpressionTable, ConfigError> {
        ExpressionTable::new(self.expressions.clone())
    }
}

/// Asset file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// glTF/GLB cat model
    pub model: PathBuf,
    /// Fur strand pattern image
    pub fur_texture: PathBuf,
    /// Optional environment image used for ambient light
    pub environment: Option<PathBuf>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("assets/cat.glb"),
            fur_texture: PathBuf::from("assets/fur.png"),
            environment: Some(PathBuf::from("assets/env.hdr")),
        }
    }
}

/// Fur shell settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FurConfig {
    /// Number of shells drawn over the base surface
    pub shell_count: u32,
    /// Distance of the outermost shell from the surface
    pub extrude: f32,
    /// Pattern UV repeat
    pub tile: f32,
    /// Wind direction (x, y)
    pub wind: [f32; 2],
    /// Sway amplitude
    pub strength: f32,
    /// Fur tint as "#rrggbb"
    pub tint: String,
    /// Blend from white toward the tint (0.0 - 1.0)
    pub tint_mix: f32,
    /// Fragments below this alpha are discarded
    pub alpha_cutoff: f32,
    /// Base surface opacity once shells are added
    pub base_opacity: f32,
}

impl Default for FurConfig {
    fn default() -> Self {
        Self {
            shell_count: 18,
            extrude: 0.02,
            tile: 4.0,
            wind: [0.4, 0.2],
            strength: 0.006,
            tint: "#ffd54f".to_string(),
            tint_mix: 0.65,
            alpha_cutoff: 0.02,
            base_opacity: 0.95,
        }
    }
}

impl FurConfig {
    /// Validated shader parameters
    pub fn params(&self) -> Result<FurParams, ConfigError> {
        if self.shell_count == 0 {
            return Err(invalid("fur.shell_count", "Shell count must be at least 1"));
        }
        if !(self.extrude >= 0.0) {
            return Err(invalid("fur.extrude", "Extrusion must not be negative"));
        }
        if !(self.tile > 0.0) {
            return Err(invalid("fur.tile", "Tile must be greater than 0"));
        }
        for (field, value) in [
            ("fur.tint_mix", self.tint_mix),
            ("fur.alpha_cutoff", self.alpha_cutoff),
            ("fur.base_opacity", self.base_opacity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "Value must be between 0.0 and 1.0"));
            }
        }
        let tint = Rgb::parse(&self.tint).map_err(|e| invalid("fur.tint", &e.to_string()))?;

        Ok(FurParams {
            extrude: self.extrude,
            tile: self.tile,
            wind: Vec2::from(self.wind),
            strength: self.strength,
            tint,
            tint_mix: self.tint_mix,
            alpha_cutoff: self.alpha_cutoff,
            base_opacity: self.base_opacity,
        })
    }
}

/// Look of the cat and the scene
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Coat color as "#rrggbb"
    pub coat_color: String,
    pub roughness: f32,
    pub metalness: f32,
    /// Uniform scale of the loaded model
    pub model_scale: f32,
    pub placeholder_radius: f32,
    pub placeholder_segments: u32,
    pub placeholder_height: f32,
    /// Ambient contribution of the environment image
    pub environment_strength: f32,
    /// Presentation mode at startup
    pub mode: PresentationMode,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            coat_color: "#ffe066".to_string(),
            roughness: 0.6,
            metalness: 0.0,
            model_scale: 0.8,
            placeholder_radius: 0.35,
            placeholder_segments: 48,
            placeholder_height: 0.35,
            environment_strength: 0.25,
            mode: PresentationMode::Normal,
        }
    }
}

impl AppearanceConfig {
    /// Validated model style
    pub fn style(&self) -> Result<ModelStyle, ConfigError> {
        let coat_color = Rgb::parse(&self.coat_color)
            .map_err(|e| invalid("appearance.coat_color", &e.to_string()))?;
        if !(self.model_scale > 0.0) {
            return Err(invalid("appearance.model_scale", "Scale must be greater than 0"));
        }
        if !(self.placeholder_radius > 0.0) {
            return Err(invalid(
                "appearance.placeholder_radius",
                "Radius must be greater than 0",
            ));
        }
        if self.placeholder_segments < 3 {
            return Err(invalid(
                "appearance.placeholder_segments",
                "At least 3 segments are required",
            ));
        }
        if !(0.0..=1.0).contains(&self.roughness) || !(0.0..=1.0).contains(&self.metalness) {
            return Err(invalid(
                "appearance.roughness",
                "Roughness and metalness must be between 0.0 and 1.0",
            ));
        }

        Ok(ModelStyle {
            coat_color,
            roughness: self.roughness,
            metalness: self.metalness,
            scale: self.model_scale,
            placeholder_radius: self.placeholder_radius,
            placeholder_segments: self.placeholder_segments,
            placeholder_height: self.placeholder_height,
        })
    }
}

/// Orbit camera settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Damping factor (0.0 - 1.0]
    pub damping: f32,
    /// Radians per dragged pixel
    pub rotate_speed: f32,
    /// Zoom exponent per scrolled point
    pub zoom_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.8, 0.6, 1.6],
            target: [0.0, 0.35, 0.0],
            fov_degrees: 45.0,
            near: 0.1,
            far: 200.0,
            min_distance: 0.6,
            max_distance: 3.0,
            damping: 0.05,
            rotate_speed: 0.005,
            zoom_speed: 0.001,
        }
    }
}

impl CameraConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(invalid("camera.fov_degrees", "FOV must be between 0 and 180"));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(invalid("camera.near", "Clip planes must satisfy 0 < near < far"));
        }
        if !(self.min_distance > 0.0 && self.max_distance >= self.min_distance) {
            return Err(invalid(
                "camera.min_distance",
                "Distance limits must satisfy 0 < min <= max",
            ));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(invalid("camera.damping", "Damping must be in (0.0, 1.0]"));
        }
        Ok(())
    }
}

/// Native window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "furcat".to_string(),
            width: 1280,
            height: 800,
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("furcat");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/furcat");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/furcat");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("furcat");
        }
    }

    PathBuf::from(".")
}
