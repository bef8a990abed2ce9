//! Error types for the rendering sandbox.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for sandbox operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// GPU-related errors
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    /// Asset loading errors
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Quad batch errors
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),
}

/// GPU-specific errors.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No usable adapter or device
    #[error("GPU initialization failed: {0}")]
    InitFailed(String),

    /// Shader compilation error
    #[error("Shader compilation failed: {0}")]
    ShaderError(String),
}

/// Texture and other asset loading errors.
///
/// These are fatal at startup: assets are loaded once before the first frame.
#[derive(Debug, Error)]
pub enum AssetError {
    /// File does not exist
    #[error("Asset not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File exists but could not be decoded
    #[error("Failed to decode {}: {message}", path.display())]
    Decode {
        /// Path of the asset
        path: PathBuf,
        /// Decoder message
        message: String,
    },

    /// More textures requested than there are slots
    #[error("Too many textures: {count} requested, {max} slots available")]
    TooManyTextures {
        /// Number of textures requested
        count: usize,
        /// Number of bindable slots
        max: usize,
    },
}

/// Quad batch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BatchError {
    /// More quads were written than the batch can hold
    #[error("Batch capacity exceeded: {requested} quads requested, capacity is {capacity}")]
    CapacityExceeded {
        /// Maximum quads the batch holds
        capacity: usize,
        /// Quads that were requested
        requested: usize,
    },

    /// A quad referenced a texture slot that is not bound
    #[error("Invalid texture slot {slot} (max {max})")]
    InvalidTextureSlot {
        /// Slot the quad asked for
        slot: u32,
        /// Number of texture slots
        max: u32,
    },
}

/// Result type alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;
