use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Debug, Error)]
pub enum ObscureError {
    #[error("cannot obscure frame: {0}")]
    Unsupported(String),
}

/// Makes a whole frame unreadable, in place.
///
/// Works on the render loop's private copy of a frame, never on a published one.
pub trait FrameObscurer: Send {
    fn obscure(&mut self, frame: &mut Frame) -> Result<(), ObscureError>;
}
