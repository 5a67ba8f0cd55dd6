use crate::detection::domain::verifier::{Identity, IdentityLabel};
use crate::shared::bounding_box::BoundingBox;

/// A detected face as seen by the risk filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedFace {
    pub bbox: BoundingBox,
    pub confidence: f64,
    /// `None` when verification is disabled; such faces count as OTHER.
    pub identity: Option<Identity>,
}

impl ObservedFace {
    pub fn unverified(bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            bbox,
            confidence,
            identity: None,
        }
    }

    pub fn is_other(&self) -> bool {
        self.identity
            .map_or(true, |identity| identity.label == IdentityLabel::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCriteria {
    /// Faces smaller than this fraction of the frame are too far away to read
    /// the screen and are ignored.
    pub area_ratio_threshold: f64,
    /// With no identities available, treat the largest qualifying face as the
    /// operator and leave it out of the count.
    pub assume_operator_present: bool,
}

/// Per-cycle summary of the faces that could be watching the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// OTHER faces that passed the area filter.
    pub other_faces: usize,
    /// Largest area ratio among those faces; `None` when there are none.
    pub max_area_ratio: Option<f64>,
    /// Every detected face, before filtering.
    pub total_faces: usize,
    pub frame_sequence: u64,
}

impl RiskAssessment {
    pub fn assess(faces: &[ObservedFace], criteria: &RiskCriteria, frame_sequence: u64) -> Self {
        let mut ratios: Vec<f64> = faces
            .iter()
            .filter(|f| f.is_other())
            .map(|f| f.bbox.area_ratio())
            .filter(|&ratio| ratio >= criteria.area_ratio_threshold)
            .collect();

        let unverified = faces.iter().all(|f| f.identity.is_none());
        if criteria.assume_operator_present && unverified && !ratios.is_empty() {
            let largest = ratios
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap_or(0);
            ratios.swap_remove(largest);
        }

        Self {
            other_faces: ratios.len(),
            max_area_ratio: ratios.iter().copied().reduce(f64::max),
            total_faces: faces.len(),
            frame_sequence,
        }
    }

    /// Risky when enough OTHER faces qualify and at least one qualifying area exists.
    pub fn is_risky(&self, face_count_threshold: usize) -> bool {
        self.other_faces >= face_count_threshold && self.max_area_ratio.is_some()
    }

    pub fn risk_score(&self) -> f64 {
        self.max_area_ratio.unwrap_or(0.0)
    }
}

/// What an analysis cycle hands to the decision engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Assessed(RiskAssessment),
    /// Detection or verification failed: neither evidence of risk nor of safety.
    Inconclusive { frame_sequence: u64, cause: String },
}

impl Observation {
    pub fn frame_sequence(&self) -> u64 {
        match self {
            Observation::Assessed(a) => a.frame_sequence,
            Observation::Inconclusive { frame_sequence, .. } => *frame_sequence,
        }
    }
}
