use aieyes_common::Detection;
use image::RgbImage;

use crate::error::Result;

pub mod remote;

pub use remote::HttpDetectionProvider;

/// COCO-derived class ids treated as weapons.
pub const WEAPON_CLASS_IDS: [i32; 3] = [34, 43, 76];
pub const WEAPON_NAMES: [&str; 4] = ["knife", "gun", "pistol", "rifle"];
pub const BAG_NAMES: [&str; 3] = ["backpack", "handbag", "suitcase"];
pub const PERSON_NAME: &str = "person";

/// Object detector consulted by the pipeline. Called from camera worker threads.
pub trait DetectionProvider: Send + Sync {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>>;

    fn filter_persons(&self, detections: &[Detection]) -> Vec<Detection> {
        detections.iter().filter(|d| is_person(d)).cloned().collect()
    }

    fn filter_weapons(&self, detections: &[Detection]) -> Vec<Detection> {
        detections.iter().filter(|d| is_weapon(d)).cloned().collect()
    }

    fn filter_bags(&self, detections: &[Detection]) -> Vec<Detection> {
        detections.iter().filter(|d| is_bag(d)).cloned().collect()
    }
}

pub fn is_person(detection: &Detection) -> bool {
    detection.class_name.eq_ignore_ascii_case(PERSON_NAME)
}

pub fn is_weapon(detection: &Detection) -> bool {
    WEAPON_CLASS_IDS.contains(&detection.class_id)
        || WEAPON_NAMES
            .iter()
            .any(|name| detection.class_name.eq_ignore_ascii_case(name))
}

pub fn is_bag(detection: &Detection) -> bool {
    BAG_NAMES
        .iter()
        .any(|name| detection.class_name.eq_ignore_ascii_case(name))
}

/// Drops malformed entries and those under `min_confidence`.
pub fn sanitize(detections: Vec<Detection>, min_confidence: f32) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| {
            !d.class_name.is_empty()
                && d.confidence.is_finite()
                && (0.0..=1.0).contains(&d.confidence)
                && d.confidence >= min_confidence
                && d.bbox.is_valid()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aieyes_common::BBox;

    struct Nothing;

    impl DetectionProvider for Nothing {
        fn detect(&self, _frame: &RgbImage) -> Result<Vec<Detection>> {
            Ok(vec![])
        }
    }

    fn det(name: &str, id: i32) -> Detection {
        Detection::new(name, 0.9, BBox::new(0.0, 0.0, 10.0, 10.0), id)
    }

    #[test]
    fn default_filters_split_classes() {
        let detections = vec![
            det("person", 0),
            det("knife", 43),
            det("Pistol", -1),
            det("scissors", 76),
            det("backpack", 24),
            det("chair", 56),
        ];
        let provider = Nothing;
        assert_eq!(provider.filter_persons(&detections).len(), 1);
        assert_eq!(provider.filter_weapons(&detections).len(), 3);
        assert_eq!(provider.filter_bags(&detections).len(), 1);
    }

    #[test]
    fn sanitize_drops_malformed() {
        let mut inverted = det("person", 0);
        inverted.bbox = BBox::new(10.0, 10.0, 0.0, 0.0);
        let mut weak = det("person", 0);
        weak.confidence = 0.2;
        let mut nan = det("person", 0);
        nan.confidence = f32::NAN;
        let mut over = det("person", 0);
        over.confidence = 1.5;

        let kept = sanitize(vec![det("person", 0), inverted, weak, nan, over, det("", 0)], 0.4);
        assert_eq!(kept.len(), 1);
    }
}
