//! GPU validation helpers.
//!
//! This module wires wgpu's validation layer and error scopes into the
//! sandbox's error types:
//! - Instance flags for the validation layer
//! - Adapter and device requests
//! - Uncaptured device error logging
//! - Shader compilation inside a validation error scope

use sandbox_common::GpuError;
use tracing::{error, info};

/// Returns wgpu instance flags for the requested validation level.
///
/// When enabled, this turns on:
/// - `VALIDATION`: GPU API validation to catch errors early
/// - `DEBUG`: debug labels and markers
#[must_use]
pub fn gpu_instance_flags(validation: bool) -> wgpu::InstanceFlags {
    if validation {
        info!("GPU validation layer enabled");
        wgpu::InstanceFlags::VALIDATION | wgpu::InstanceFlags::DEBUG
    } else {
        info!("GPU validation layer disabled");
        wgpu::InstanceFlags::empty()
    }
}

/// Creates a wgpu instance on all backends with the given validation level.
#[must_use]
pub fn create_validated_instance(validation: bool) -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: gpu_instance_flags(validation),
        ..Default::default()
    })
}

/// Wraps an adapter or device failure as [`GpuError::InitFailed`].
fn init_failed(stage: &str, reason: impl std::fmt::Display) -> GpuError {
    error!("GPU initialization failed at {stage}: {reason}");
    GpuError::InitFailed(format!("{stage}: {reason}"))
}

/// Requests a high-performance adapter able to present to `surface`,
/// then a device with default limits.
///
/// The device has [`handle_device_error`] installed.
pub async fn request_device(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| init_failed("adapter", "no compatible adapter found"))?;

    info!("Using GPU adapter: {:?}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Sandbox Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await
        .map_err(|e| init_failed("device", e))?;
    install_error_handler(&device);

    Ok((adapter, device, queue))
}

/// Logs a wgpu device error.
///
/// Use this with `device.on_uncaptured_error()`.
pub fn handle_device_error(error: &wgpu::Error) {
    error!("GPU device error: {error}");
}

/// Installs [`handle_device_error`] as the device's uncaptured error handler.
pub fn install_error_handler(device: &wgpu::Device) {
    device.on_uncaptured_error(Box::new(|e| handle_device_error(&e)));
}

/// Compiles a WGSL module, turning validation failures into [`GpuError`].
///
/// Blocks until the device reports whether the module was valid.
pub fn compile_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        error!("Shader '{label}' failed to compile: {err}");
        return Err(GpuError::ShaderError(format!("{label}: {err}")));
    }

    info!("Compiled shader '{label}'");
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_flags() {
        assert!(gpu_instance_flags(true).contains(wgpu::InstanceFlags::VALIDATION));
        assert!(gpu_instance_flags(true).contains(wgpu::InstanceFlags::DEBUG));
        assert!(gpu_instance_flags(false).is_empty());
    }

    #[test]
    fn test_init_failure_names_stage() {
        let err = init_failed("adapter", "no compatible adapter found");
        assert!(matches!(err, GpuError::InitFailed(_)));
        assert_eq!(
            err.to_string(),
            "GPU initialization failed: adapter: no compatible adapter found"
        );
    }
}
