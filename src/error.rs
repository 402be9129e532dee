//! Error types for avatarview

use thiserror::Error;

/// Main error type for avatarview
#[derive(Error, Debug)]
pub enum AvatarViewError {
    #[error("Initialization error: {0}")]
    Init(#[from] InitError),

    #[error("Texture error: {0}")]
    Texture(#[from] TextureLoadError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Viewer error: {0}")]
    Viewer(#[from] ViewerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renderer/context initialization errors. Fatal to the viewer instance;
/// surfaced to the caller with no automatic retry.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("No GPU adapter available")]
    NoAdapter,

    #[error("Failed to create GPU device: {0}")]
    Device(String),

    #[error("Invalid mount surface size: {width}x{height}")]
    SurfaceSize { width: u32, height: u32 },
}

/// Image decode/bind failures. Recovered locally: the previously bound
/// texture and material state are left fully intact.
#[derive(Error, Debug)]
pub enum TextureLoadError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Decoded image has zero width or height")]
    EmptyImage,

    #[error("Decode task cancelled: {0}")]
    Cancelled(String),
}

/// Frame export errors. The caller may retry after the scene has rendered.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No frame has been rendered yet")]
    NotReady,

    #[error("Failed to read back frame pixels: {0}")]
    Readback(String),

    #[error("Failed to encode PNG: {0}")]
    Encode(String),
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

/// Viewer loop errors
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Viewer has been torn down")]
    TornDown,

    #[error("GPU device failed: {0}")]
    DeviceLost(String),
}

/// Result type alias for avatarview operations
pub type Result<T> = std::result::Result<T, AvatarViewError>;
