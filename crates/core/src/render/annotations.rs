use crate::detection::domain::verifier::IdentityLabel;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::latest_slot::Sequenced;

/// One analysed face, kept for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatedFace {
    pub bbox: BoundingBox,
    pub confidence: f64,
    /// `None` when verification is disabled.
    pub label: Option<IdentityLabel>,
}

/// Faces found by the most recent successful analysis cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotations {
    pub frame_sequence: u64,
    pub faces: Vec<AnnotatedFace>,
}

impl Sequenced for Annotations {
    fn sequence(&self) -> u64 {
        self.frame_sequence
    }
}
