use std::fmt;

use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

#[derive(Debug, Error)]
pub enum VerificationError {
    /// No enrollment template is loaded. Callers treat this as
    /// "verification disabled", not as a failure.
    #[error("no enrollment template loaded")]
    NoTemplate,
    #[error("verification failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityLabel {
    /// The enrolled operator.
    Operator,
    Other,
}

impl fmt::Display for IdentityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityLabel::Operator => write!(f, "SELF"),
            IdentityLabel::Other => write!(f, "OTHER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Identity {
    pub label: IdentityLabel,
    /// Similarity to the enrolled template, in `[0, 1]`.
    pub similarity: f64,
    pub bbox: BoundingBox,
}

/// A face cut out of the full-resolution frame, plus where it came from.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    pub crop: Frame,
    pub bbox: BoundingBox,
}

/// Domain interface for deciding whether a face is the operator's.
pub trait Verifier: Send {
    fn verify(&mut self, face: &FaceRegion) -> Result<Identity, VerificationError>;
}
