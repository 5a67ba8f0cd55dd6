use std::fmt;
use std::time::Instant;

use crate::shared::latest_slot::Sequenced;

/// The engine's verdict after one evaluation: the sole externally observable
/// output of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivacyDecision {
    pub on: bool,
    pub reason: String,
    /// Largest qualifying OTHER-face area ratio of the evaluated assessment.
    pub risk_score: f64,
    pub other_faces: usize,
    /// Frame the decision was computed from; `None` for a reset.
    pub frame_sequence: Option<u64>,
    /// Position in the decision stream, strictly increasing for one engine.
    pub sequence: u64,
    pub timestamp: Instant,
    /// Whether this evaluation flipped the state.
    pub changed: bool,
}

impl PrivacyDecision {
    pub fn state_label(&self) -> &'static str {
        if self.on {
            "ON"
        } else {
            "OFF"
        }
    }
}

impl Sequenced for PrivacyDecision {
    fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for PrivacyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "privacy {} ({})", self.state_label(), self.reason)
    }
}
