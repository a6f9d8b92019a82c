use aieyes_common::{ActivityEvent, ActivityKind, Detection, Severity};

use crate::config::PipelineConfig;
use crate::face::FaceVerification;

#[derive(Debug, Clone, Copy)]
pub struct ActivityRules {
    pub crowd_threshold: usize,
    pub high_activity_threshold: usize,
}

impl From<&PipelineConfig> for ActivityRules {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            crowd_threshold: config.crowd_threshold,
            high_activity_threshold: config.high_activity_threshold,
        }
    }
}

impl Default for ActivityRules {
    fn default() -> Self {
        Self {
            crowd_threshold: 3,
            high_activity_threshold: 10,
        }
    }
}

pub struct ActivityInput<'a> {
    pub detections: &'a [Detection],
    pub persons: &'a [Detection],
    pub weapons: &'a [Detection],
    pub bags: &'a [Detection],
    pub loitering: Vec<ActivityEvent>,
    pub faces: &'a [FaceVerification],
}

/// Rules run weapon, crowd, abandoned object, high activity, loitering, then intruder faces.
pub fn evaluate(input: ActivityInput<'_>, rules: &ActivityRules) -> Vec<ActivityEvent> {
    let mut activities = Vec::new();

    if let Some(weapon) = input.weapons.first() {
        activities.push(
            ActivityEvent::new(
                ActivityKind::Weapon,
                Severity::Critical,
                format!("WEAPON DETECTED: {}", weapon.class_name),
            )
            .with_bbox(weapon.bbox),
        );
    }

    if input.persons.len() > rules.crowd_threshold {
        activities.push(ActivityEvent::new(
            ActivityKind::Crowd,
            Severity::Medium,
            format!("CROWD ALERT: {} persons detected", input.persons.len()),
        ));
    }

    if input.persons.is_empty() {
        if let Some(bag) = input.bags.first() {
            activities.push(
                ActivityEvent::new(
                    ActivityKind::AbandonedObject,
                    Severity::Medium,
                    format!("ABANDONED OBJECT: unattended {} detected", bag.class_name),
                )
                .with_bbox(bag.bbox),
            );
        }
    }

    if input.detections.len() > rules.high_activity_threshold {
        activities.push(ActivityEvent::new(
            ActivityKind::HighActivity,
            Severity::Low,
            format!("HIGH ACTIVITY: {} objects in view", input.detections.len()),
        ));
    }

    activities.extend(input.loitering);

    for face in input.faces.iter().filter(|f| f.result.is_intruder()) {
        activities.push(
            ActivityEvent::new(
                ActivityKind::Intruder,
                Severity::High,
                "INTRUDER: unauthorized person detected",
            )
            .with_bbox(face.bbox),
        );
    }

    activities
}
