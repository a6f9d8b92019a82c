use image::RgbImage;
use std::sync::Arc;
use tracing::warn;

use super::{FaceIdentityProvider, FaceMatch, MatchBand, UNKNOWN};
use crate::error::Result;

/// LBPH-style model: best label plus a distance where lower is closer.
pub trait DistanceModel: Send + Sync {
    fn predict(&self, face: &RgbImage) -> Result<(String, f32)>;
}

/// Embedding classifier returning one raw logit per known identity.
pub trait EmbeddingClassifier: Send + Sync {
    fn logits(&self, face: &RgbImage) -> Result<Vec<(String, f32)>>;
}

impl<T: DistanceModel + ?Sized> DistanceModel for Arc<T> {
    fn predict(&self, face: &RgbImage) -> Result<(String, f32)> {
        (**self).predict(face)
    }
}

impl<T: EmbeddingClassifier + ?Sized> EmbeddingClassifier for Arc<T> {
    fn logits(&self, face: &RgbImage) -> Result<Vec<(String, f32)>> {
        (**self).logits(face)
    }
}

fn too_small(face: &RgbImage, min_size: u32) -> bool {
    let (w, h) = face.dimensions();
    w < min_size || h < min_size
}

pub struct DistanceMatcher<M> {
    model: M,
    min_face_size: u32,
    accept: f32,
    uncertain: f32,
}

impl<M: DistanceModel> DistanceMatcher<M> {
    pub fn new(model: M, min_face_size: u32, accept: f32, uncertain: f32) -> Self {
        Self {
            model,
            min_face_size,
            accept,
            uncertain,
        }
    }

    pub fn classify(&self, label: String, distance: f32) -> FaceMatch {
        let confidence = (100.0 - distance).max(0.0);
        if distance <= self.accept {
            FaceMatch {
                name: label,
                is_authorized: true,
                confidence,
                band: MatchBand::Authorized,
            }
        } else if distance <= self.uncertain {
            FaceMatch {
                name: label,
                is_authorized: false,
                confidence,
                band: MatchBand::Uncertain,
            }
        } else {
            FaceMatch {
                name: UNKNOWN.to_string(),
                is_authorized: false,
                confidence,
                band: MatchBand::Intruder,
            }
        }
    }
}

impl<M: DistanceModel> FaceIdentityProvider for DistanceMatcher<M> {
    fn verify(&self, face_crop: &RgbImage) -> FaceMatch {
        if too_small(face_crop, self.min_face_size) {
            return FaceMatch::rejected();
        }
        match self.model.predict(face_crop) {
            Ok((label, distance)) if distance.is_finite() => self.classify(label, distance),
            Ok((_, distance)) => {
                warn!("Face model returned non-finite distance {}", distance);
                FaceMatch::rejected()
            }
            Err(e) => {
                warn!("Face model failed: {}", e);
                FaceMatch::rejected()
            }
        }
    }
}

pub struct ProbabilityMatcher<C> {
    classifier: C,
    min_face_size: u32,
    threshold: f32,
}

impl<C: EmbeddingClassifier> ProbabilityMatcher<C> {
    pub fn new(classifier: C, min_face_size: u32, threshold: f32) -> Self {
        Self {
            classifier,
            min_face_size,
            threshold,
        }
    }
}

impl<C: EmbeddingClassifier> FaceIdentityProvider for ProbabilityMatcher<C> {
    fn verify(&self, face_crop: &RgbImage) -> FaceMatch {
        if too_small(face_crop, self.min_face_size) {
            return FaceMatch::rejected();
        }
        let logits = match self.classifier.logits(face_crop) {
            Ok(logits) if !logits.is_empty() => logits,
            Ok(_) => return FaceMatch::rejected(),
            Err(e) => {
                warn!("Face classifier failed: {}", e);
                return FaceMatch::rejected();
            }
        };

        let Some((label, probability)) = best_class(&logits) else {
            return FaceMatch::rejected();
        };

        if probability >= self.threshold {
            FaceMatch {
                name: label,
                is_authorized: true,
                confidence: probability * 100.0,
                band: MatchBand::Authorized,
            }
        } else {
            FaceMatch {
                name: UNKNOWN.to_string(),
                is_authorized: false,
                confidence: probability * 100.0,
                band: MatchBand::Intruder,
            }
        }
    }
}

/// Softmax over the logits; returns the top label and its probability.
pub fn best_class(logits: &[(String, f32)]) -> Option<(String, f32)> {
    let max = logits
        .iter()
        .map(|(_, l)| *l)
        .filter(|l| l.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return None;
    }

    let exps: Vec<f32> = logits
        .iter()
        .map(|(_, l)| if l.is_finite() { (l - max).exp() } else { 0.0 })
        .collect();
    let sum: f32 = exps.iter().sum();

    // first label wins ties
    let mut best = 0;
    for (i, e) in exps.iter().enumerate() {
        if *e > exps[best] {
            best = i;
        }
    }
    Some((logits[best].0.clone(), exps[best] / sum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurveillanceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDistance {
        distance: f32,
        calls: AtomicUsize,
    }

    impl FixedDistance {
        fn new(distance: f32) -> Self {
            Self {
                distance,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DistanceModel for FixedDistance {
        fn predict(&self, _face: &RgbImage) -> Result<(String, f32)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(("alice".to_string(), self.distance))
        }
    }

    struct FixedLogits {
        logits: Vec<(String, f32)>,
        calls: AtomicUsize,
    }

    impl EmbeddingClassifier for FixedLogits {
        fn logits(&self, _face: &RgbImage) -> Result<Vec<(String, f32)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.logits.clone())
        }
    }

    struct Broken;

    impl DistanceModel for Broken {
        fn predict(&self, _face: &RgbImage) -> Result<(String, f32)> {
            Err(SurveillanceError::InferenceError("model not trained".to_string()))
        }
    }

    fn face(size: u32) -> RgbImage {
        RgbImage::new(size, size)
    }

    fn distance_matcher(distance: f32) -> DistanceMatcher<Arc<FixedDistance>> {
        DistanceMatcher::new(Arc::new(FixedDistance::new(distance)), 50, 80.0, 100.0)
    }

    #[test]
    fn distance_bands() {
        let authorized = distance_matcher(80.0).verify(&face(64));
        assert!(authorized.is_authorized);
        assert_eq!(authorized.name, "alice");
        assert_eq!(authorized.confidence, 20.0);

        let uncertain = distance_matcher(95.0).verify(&face(64));
        assert_eq!(uncertain.band, MatchBand::Uncertain);
        assert!(!uncertain.is_authorized);

        let intruder = distance_matcher(130.0).verify(&face(64));
        assert_eq!(intruder.band, MatchBand::Intruder);
        assert_eq!(intruder.name, UNKNOWN);
        assert_eq!(intruder.confidence, 0.0);
    }

    #[test]
    fn small_faces_skip_the_model() {
        let model = Arc::new(FixedDistance::new(10.0));
        let matcher = DistanceMatcher::new(model.clone(), 50, 80.0, 100.0);

        let narrow = RgbImage::new(49, 120);
        let result = matcher.verify(&narrow);
        assert_eq!(result.band, MatchBand::Rejected);
        assert!(!result.is_authorized);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);

        let classifier = Arc::new(FixedLogits {
            logits: vec![("alice".to_string(), 5.0)],
            calls: AtomicUsize::new(0),
        });
        let matcher = ProbabilityMatcher::new(classifier.clone(), 50, 0.5);
        assert_eq!(matcher.verify(&RgbImage::new(120, 30)).band, MatchBand::Rejected);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn probability_below_threshold_hides_label() {
        let logits = vec![
            ("alice".to_string(), 0.49f32.ln()),
            ("bob".to_string(), 0.30f32.ln()),
            ("carol".to_string(), 0.21f32.ln()),
        ];
        let matcher = ProbabilityMatcher::new(
            FixedLogits {
                logits,
                calls: AtomicUsize::new(0),
            },
            50,
            0.5,
        );

        let result = matcher.verify(&face(80));
        assert!(!result.is_authorized);
        assert_eq!(result.name, UNKNOWN);
        assert!((result.confidence - 49.0).abs() < 0.01);
    }

    #[test]
    fn probability_at_threshold_authorizes() {
        let logits = vec![("alice".to_string(), 0.0), ("bob".to_string(), 0.0)];
        let matcher = ProbabilityMatcher::new(
            FixedLogits {
                logits,
                calls: AtomicUsize::new(0),
            },
            50,
            0.5,
        );
        let result = matcher.verify(&face(80));
        assert!(result.is_authorized);
        assert_eq!(result.name, "alice");
    }

    #[test]
    fn model_failure_is_benign() {
        let matcher = DistanceMatcher::new(Broken, 50, 80.0, 100.0);
        let result = matcher.verify(&face(64));
        assert_eq!(result.band, MatchBand::Rejected);
        assert!(!result.is_authorized);
    }
}
