/// Hue/saturation histogram embedder.
///
/// A model-free fallback: two crops of the same face under the same lighting
/// have similar colour distributions. Far weaker than ArcFace, but enough to
/// tell the operator from a differently dressed bystander in a demo setup.
use crate::detection::domain::face_embedder::{l2_normalize, FaceEmbedder};
use crate::detection::domain::verifier::VerificationError;
use crate::shared::frame::Frame;

const HUE_BINS: usize = 16;
const SAT_BINS: usize = 8;

/// Pixels darker than this carry no reliable hue and are skipped.
const MIN_VALUE: f64 = 0.08;

#[derive(Debug, Default)]
pub struct HistogramEmbedder;

impl HistogramEmbedder {
    pub fn new() -> Self {
        Self
    }

    pub fn dimensions() -> usize {
        HUE_BINS * SAT_BINS
    }
}

impl FaceEmbedder for HistogramEmbedder {
    fn embed(&mut self, face: &Frame) -> Result<Vec<f32>, VerificationError> {
        if face.channels() != 3 || face.area() == 0 {
            return Err(VerificationError::Failed(format!(
                "unusable face crop {}x{}x{}",
                face.width(),
                face.height(),
                face.channels()
            )));
        }
        let mut hist = compute_histogram(face.data());
        l2_normalize(&mut hist);
        Ok(hist)
    }
}

fn compute_histogram(rgb: &[u8]) -> Vec<f32> {
    let mut hist = vec![0.0f32; HUE_BINS * SAT_BINS];

    for px in rgb.chunks_exact(3) {
        let (h, s, v) = rgb_to_hsv(
            px[0] as f64 / 255.0,
            px[1] as f64 / 255.0,
            px[2] as f64 / 255.0,
        );
        if v < MIN_VALUE {
            continue;
        }
        let h_bin = ((h / 360.0) * HUE_BINS as f64).min(HUE_BINS as f64 - 1.0) as usize;
        let s_bin = (s * SAT_BINS as f64).min(SAT_BINS as f64 - 1.0) as usize;
        hist[h_bin * SAT_BINS + s_bin] += 1.0;
    }
    hist
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (h, s, max)
}
