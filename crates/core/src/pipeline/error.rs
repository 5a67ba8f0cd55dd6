use thiserror::Error;

use crate::capture::domain::capture_device::CaptureError;
use crate::config::ConfigError;

/// Failures that end a pipeline. Per-cycle detection and verification
/// errors never reach this level.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("pipeline already started")]
    AlreadyRunning,
    #[error("pipeline already stopped")]
    AlreadyStopped,
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

impl PipelineError {
    pub fn is_device_lost(&self) -> bool {
        matches!(self, PipelineError::Capture(CaptureError::DeviceLost { .. }))
    }
}
