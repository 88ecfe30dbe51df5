//! Error types for furcat

use thiserror::Error;

/// Main error type for furcat
#[derive(Error, Debug)]
pub enum FurcatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Fur error: {0}")]
    Fur(#[from] FurError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to load texture: {0}")]
    TextureLoad(String),

    #[error("Failed to load environment image: {0}")]
    EnvironmentLoad(String),

    #[error("Model contains no drawable geometry")]
    NoGeometry,
}

/// Fur shell generation errors
#[derive(Error, Debug, PartialEq)]
pub enum FurError {
    #[error("Shell count must be at least 1, got {0}")]
    InvalidShellCount(u32),

    #[error("Base surface has no vertices")]
    EmptySurface,
}

/// GPU renderer errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("wgpu render state not available")]
    NoRenderState,

    #[error("Renderer not initialized")]
    NotInitialized,
}

/// Result type alias for furcat operations
pub type Result<T> = std::result::Result<T, FurcatError>;
