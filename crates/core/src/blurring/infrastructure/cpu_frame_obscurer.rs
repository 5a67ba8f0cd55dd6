use crate::blurring::domain::frame_obscurer::{FrameObscurer, ObscureError};
use crate::shared::frame::Frame;

use super::gaussian::GaussianBlur;

/// Dark blue-grey laid over the blurred frame.
pub const PRIVACY_TINT: [u8; 3] = [50, 50, 100];

/// Share of the blurred image kept in the final blend; the rest is tint.
const BLURRED_WEIGHT: f32 = 0.3;

/// Full-frame Gaussian blur followed by a dark tint blend.
///
/// Blur alone can leave large text legible; the tint pushes contrast down far
/// enough that nothing on the captured scene stays readable.
pub struct CpuFrameObscurer {
    blur: GaussianBlur,
    tint: [u8; 3],
}

impl CpuFrameObscurer {
    pub fn new(kernel_size: usize) -> Self {
        Self {
            blur: GaussianBlur::new(kernel_size),
            tint: PRIVACY_TINT,
        }
    }
}

impl FrameObscurer for CpuFrameObscurer {
    fn obscure(&mut self, frame: &mut Frame) -> Result<(), ObscureError> {
        if frame.channels() != 3 {
            return Err(ObscureError::Unsupported(format!(
                "expected RGB frame, got {} channels",
                frame.channels()
            )));
        }
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let data = frame.data_mut();
        self.blur.apply(data, w, h, 3);

        let tint = self.tint.map(|t| t as f32 * (1.0 - BLURRED_WEIGHT));
        for px in data.chunks_exact_mut(3) {
            for (v, t) in px.iter_mut().zip(tint) {
                *v = (*v as f32 * BLURRED_WEIGHT + t).round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(())
    }
}
