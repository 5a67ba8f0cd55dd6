use thiserror::Error;

use crate::render::compositor::ComposedFrame;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display output failed: {0}")]
    Output(String),
}

/// Where composed frames go: a window, a file, a log.
///
/// Called from the render thread only, outside any shared lock, so an
/// implementation may block for as long as its output needs.
pub trait DisplaySink: Send {
    fn show(&mut self, composed: &ComposedFrame) -> Result<(), DisplayError>;

    /// Releases the output. Default: nothing to release.
    fn close(&mut self) {}
}

/// Discards every frame. Used for headless runs.
pub struct NullDisplaySink;

impl DisplaySink for NullDisplaySink {
    fn show(&mut self, _composed: &ComposedFrame) -> Result<(), DisplayError> {
        Ok(())
    }
}
