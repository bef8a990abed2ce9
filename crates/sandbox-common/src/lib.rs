//! # Sandbox Common
//!
//! Shared types for the rendering sandbox.
//!
//! This crate holds the error taxonomy used by the kernel and the engine:
//! - Batch capacity and texture-slot errors
//! - Asset (texture) loading errors
//! - GPU initialization and shader errors

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_batch_error_converts_to_sandbox_error() {
        let err: SandboxError = BatchError::CapacityExceeded {
            capacity: 10,
            requested: 11,
        }
        .into();
        assert!(matches!(
            err,
            SandboxError::Batch(BatchError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_init_failure_converts_to_sandbox_error() {
        let result: SandboxResult<()> = Err(GpuError::InitFailed("no adapter".into()).into());
        let err = result.expect_err("init failure");
        assert!(matches!(err, SandboxError::Gpu(GpuError::InitFailed(_))));
        assert_eq!(
            err.to_string(),
            "GPU error: GPU initialization failed: no adapter"
        );
    }

    #[test]
    fn test_asset_error_message_names_path() {
        let err = AssetError::NotFound(PathBuf::from("textures/missing.png"));
        assert!(err.to_string().contains("textures/missing.png"));
    }
}
