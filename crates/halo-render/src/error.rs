//! Rendering error types.

use halo_core::HaloError;
use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),

    /// The surface reports no usable format.
    #[error("surface configuration failed")]
    SurfaceConfigurationFailed,

    /// A frame was executed before any pass targets existed.
    #[error("pass targets have not been created")]
    TargetsMissing,

    /// Requested pass targets exceed the device's texture size limit.
    #[error("pass targets of {width}x{height} exceed the device limit of {max}")]
    TargetTooLarge { width: u32, height: u32, max: u32 },

    /// A pass referenced a target of an older generation.
    #[error("stale pass target: expected generation {expected}, got {actual}")]
    StaleTarget { expected: u64, actual: u64 },

    /// Surface lost.
    #[error("surface lost")]
    SurfaceLost,

    /// Surface outdated.
    #[error("surface outdated")]
    SurfaceOutdated,

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU")]
    Timeout,

    /// No frame has been rendered to the capture texture.
    #[error("no capture target")]
    NoCaptureTarget,

    /// Mapping the readback buffer failed.
    #[error("GPU buffer mapping failed")]
    BufferMapFailed,
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for HaloError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::StaleTarget { expected, actual } => {
                HaloError::StaleTarget { expected, actual }
            }
            other => HaloError::Render(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_target_maps_to_core_error() {
        let err: HaloError = RenderError::StaleTarget {
            expected: 3,
            actual: 2,
        }
        .into();
        assert!(matches!(
            err,
            HaloError::StaleTarget {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_target_too_large_message() {
        let err: HaloError = RenderError::TargetTooLarge {
            width: 20000,
            height: 16,
            max: 8192,
        }
        .into();
        assert!(matches!(err, HaloError::Render(msg) if msg.contains("20000x16")));
    }

    #[test]
    fn test_other_errors_map_to_render() {
        let err: HaloError = RenderError::TargetsMissing.into();
        assert!(matches!(err, HaloError::Render(msg) if msg.contains("targets")));
    }
}
