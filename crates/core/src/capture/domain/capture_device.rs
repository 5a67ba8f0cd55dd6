use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// The device could not be opened or became unusable. Not retried.
    #[error("capture device unavailable: {0}")]
    Device(String),
    /// A single read failed; the stream continues with the next read.
    #[error("transient capture failure: {0}")]
    Transient(String),
    #[error("capture device lost after {consecutive} consecutive failed reads")]
    DeviceLost { consecutive: u32 },
}

/// Tightly packed RGB24 pixels as delivered by a device.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Domain interface for a frame-producing device (camera, replayed images).
///
/// Only ever driven from the capture thread, hence `&mut self` and `Send`.
/// `read` must return within a bounded time: a device that cannot deliver a
/// frame reports `CaptureError::Transient` instead of blocking forever.
pub trait CaptureDevice: Send {
    fn open(&mut self) -> Result<(), CaptureError>;

    fn read(&mut self) -> Result<RawImage, CaptureError>;

    fn close(&mut self);

    /// Live devices block in `read` until the next frame is ready, so the
    /// capture loop does not add its own pacing on top of them.
    fn is_live(&self) -> bool {
        false
    }

    fn describe(&self) -> String;
}
