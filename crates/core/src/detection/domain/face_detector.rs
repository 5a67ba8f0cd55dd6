use std::time::{Duration, Instant};

use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("malformed input frame: {0}")]
    InvalidInput(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to load detector model {path}: {reason}")]
    Model { path: String, reason: String },
}

/// One detected face: a normalized box and a confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { bbox, confidence }
    }
}

/// Output of one detector call. Boxes may overlap; no dedup is guaranteed.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub frame_sequence: u64,
    pub processing: Duration,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>, frame_sequence: u64, started: Instant) -> Self {
        Self {
            detections,
            frame_sequence,
            processing: started.elapsed(),
        }
    }
}

/// Domain interface for face detection.
///
/// Called repeatedly from the analysis thread only, so implementations
/// may keep per-call state (`&mut self`) and need not be `Sync`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectionError>;
}

/// Rejects frames a detector cannot interpret.
pub fn validate_frame(frame: &Frame) -> Result<(), DetectionError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(DetectionError::InvalidInput(format!(
            "empty frame {}x{}",
            frame.width(),
            frame.height()
        )));
    }
    if frame.channels() != 3 {
        return Err(DetectionError::InvalidInput(format!(
            "expected 3 channels, got {}",
            frame.channels()
        )));
    }
    Ok(())
}
