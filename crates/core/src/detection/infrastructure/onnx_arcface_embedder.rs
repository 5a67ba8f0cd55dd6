/// ArcFace face embedder using ONNX Runtime.
///
/// Produces L2-normalized 512-d embeddings; two crops of the same person
/// typically score above 0.4 cosine similarity.
use std::path::Path;

use crate::detection::domain::face_embedder::{l2_normalize, FaceEmbedder};
use crate::detection::domain::verifier::VerificationError;
use crate::detection::infrastructure::execution_provider::load_session;
use crate::shared::frame::Frame;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxArcfaceEmbedder {
    session: ort::session::Session,
}

impl OnnxArcfaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, VerificationError> {
        let session = load_session(model_path).map_err(|e| {
            VerificationError::Failed(format!(
                "cannot load embedder model {}: {e}",
                model_path.display()
            ))
        })?;
        log::info!("Loaded face embedder {}", model_path.display());
        Ok(Self { session })
    }

    fn infer(&mut self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(preprocess(face))?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding = outputs[0].try_extract_array::<f32>()?;
        let slice = embedding.as_slice().ok_or("embedding output is not contiguous")?;
        let mut embedding = slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl FaceEmbedder for OnnxArcfaceEmbedder {
    fn embed(&mut self, face: &Frame) -> Result<Vec<f32>, VerificationError> {
        if face.width() == 0 || face.height() == 0 || face.channels() != 3 {
            return Err(VerificationError::Failed(format!(
                "unusable face crop {}x{}x{}",
                face.width(),
                face.height(),
                face.channels()
            )));
        }
        self.infer(face)
            .map_err(|e| VerificationError::Failed(e.to_string()))
    }
}

/// Resize crop to 112x112, normalize to [-1, 1], NCHW layout.
fn preprocess(face: &Frame) -> ndarray::Array4<f32> {
    let src = face.as_ndarray();
    let src_w = face.width() as usize;
    let src_h = face.height() as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(value: u8, w: u32, h: u32) -> Frame {
        Frame::new(vec![value; (w * h * 3) as usize], w, h, 3, 1)
    }

    #[test]
    fn test_preprocess_shape() {
        let tensor = preprocess(&solid(128, 50, 40));
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        assert!((preprocess(&solid(255, 10, 10))[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
        assert!((preprocess(&solid(0, 10, 10))[[0, 2, 5, 5]] + 1.0).abs() < 0.01);
        let mid = preprocess(&solid(127, 10, 10))[[0, 1, 0, 0]];
        assert!((mid - (127.0 - 127.5) / 127.5).abs() < 0.01);
    }
}
