use crate::detection::domain::face_embedder::{cosine_similarity, l2_normalize, FaceEmbedder};
use crate::detection::domain::verifier::{
    FaceRegion, Identity, IdentityLabel, VerificationError, Verifier,
};

/// Verifies faces against one enrolled embedding by cosine similarity.
///
/// A face is the operator when its similarity reaches `threshold`.
pub struct TemplateVerifier {
    embedder: Box<dyn FaceEmbedder>,
    template: Option<Vec<f32>>,
    threshold: f64,
}

impl TemplateVerifier {
    pub fn new(embedder: Box<dyn FaceEmbedder>, mut template: Vec<f32>, threshold: f64) -> Self {
        l2_normalize(&mut template);
        Self {
            embedder,
            template: Some(template),
            threshold,
        }
    }

    /// A verifier with nothing enrolled; every call reports `NoTemplate`.
    pub fn without_template(embedder: Box<dyn FaceEmbedder>, threshold: f64) -> Self {
        Self {
            embedder,
            template: None,
            threshold,
        }
    }
}

impl Verifier for TemplateVerifier {
    fn verify(&mut self, face: &FaceRegion) -> Result<Identity, VerificationError> {
        let template = self.template.as_ref().ok_or(VerificationError::NoTemplate)?;
        let embedding = self.embedder.embed(&face.crop)?;
        if embedding.len() != template.len() {
            return Err(VerificationError::Failed(format!(
                "embedding has {} dimensions, template has {}",
                embedding.len(),
                template.len()
            )));
        }

        let similarity = cosine_similarity(&embedding, template).clamp(0.0, 1.0);
        let label = if similarity >= self.threshold {
            IdentityLabel::Operator
        } else {
            IdentityLabel::Other
        };
        Ok(Identity {
            label,
            similarity,
            bbox: face.bbox,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::frame::Frame;
    use approx::assert_relative_eq;

    /// Embeds a crop as its mean colour.
    struct MeanColour;

    impl FaceEmbedder for MeanColour {
        fn embed(&mut self, face: &Frame) -> Result<Vec<f32>, VerificationError> {
            let mut sums = [0.0f32; 3];
            for px in face.data().chunks_exact(3) {
                for c in 0..3 {
                    sums[c] += px[c] as f32;
                }
            }
            Ok(sums.to_vec())
        }
    }

    fn region(r: u8, g: u8, b: u8) -> FaceRegion {
        FaceRegion {
            crop: Frame::new([r, g, b].repeat(4), 2, 2, 3, 1),
            bbox: BoundingBox::new(0.1, 0.1, 0.3, 0.3),
        }
    }

    #[test]
    fn test_matching_face_is_operator() {
        let mut verifier = TemplateVerifier::new(Box::new(MeanColour), vec![1.0, 0.0, 0.0], 0.6);
        let identity = verifier.verify(&region(200, 0, 0)).unwrap();
        assert_eq!(identity.label, IdentityLabel::Operator);
        assert_relative_eq!(identity.similarity, 1.0, epsilon = 1e-6);
        assert_relative_eq!(identity.bbox.x_min, 0.1);
    }

    #[test]
    fn test_different_face_is_other() {
        let mut verifier = TemplateVerifier::new(Box::new(MeanColour), vec![1.0, 0.0, 0.0], 0.6);
        let identity = verifier.verify(&region(0, 0, 200)).unwrap();
        assert_eq!(identity.label, IdentityLabel::Other);
        assert_relative_eq!(identity.similarity, 0.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // cos = 1/sqrt(2) ≈ 0.707
        let mut verifier = TemplateVerifier::new(Box::new(MeanColour), vec![1.0, 1.0, 0.0], 0.7);
        assert_eq!(
            verifier.verify(&region(100, 0, 0)).unwrap().label,
            IdentityLabel::Operator
        );
        let mut strict = TemplateVerifier::new(Box::new(MeanColour), vec![1.0, 1.0, 0.0], 0.71);
        assert_eq!(
            strict.verify(&region(100, 0, 0)).unwrap().label,
            IdentityLabel::Other
        );
    }

    #[test]
    fn test_without_template_reports_no_template() {
        let mut verifier = TemplateVerifier::without_template(Box::new(MeanColour), 0.6);
        assert!(matches!(
            verifier.verify(&region(1, 2, 3)),
            Err(VerificationError::NoTemplate)
        ));
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let mut verifier = TemplateVerifier::new(Box::new(MeanColour), vec![1.0, 0.0], 0.6);
        assert!(matches!(
            verifier.verify(&region(1, 2, 3)),
            Err(VerificationError::Failed(_))
        ));
    }
}
