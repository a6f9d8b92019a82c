use aieyes_common::{Detection, Severity, ThreatType};
use serde::Serialize;

use super::tracker::TrackedPerson;
use crate::config::PipelineConfig;
use crate::face::FaceVerification;

const WEAPON_WEIGHT: f32 = 0.8;
const CROWD_WEIGHT: f32 = 0.3;
const PROXIMITY_WEIGHT: f32 = 0.6;
const MOVEMENT_WEIGHT: f32 = 0.2;
const INTRUDER_CONFIDENCE: f32 = 95.0;

#[derive(Debug, Clone, Copy)]
pub struct ThreatParams {
    pub crowd_threshold: usize,
    pub weapon_proximity_px: f32,
    pub movement_threshold_px: f32,
    pub threshold: f32,
}

impl From<&PipelineConfig> for ThreatParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            crowd_threshold: config.crowd_threshold,
            weapon_proximity_px: config.weapon_proximity_px,
            movement_threshold_px: config.movement_threshold_px,
            threshold: config.suspicious_activity_threshold,
        }
    }
}

impl Default for ThreatParams {
    fn default() -> Self {
        Self {
            crowd_threshold: 3,
            weapon_proximity_px: 100.0,
            movement_threshold_px: 50.0,
            threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreatAssessment {
    pub threat_detected: bool,
    pub threat_type: ThreatType,
    /// 0-100.
    pub confidence: f32,
    pub score: f32,
    pub description: String,
}

impl ThreatAssessment {
    pub fn none() -> Self {
        Self {
            threat_detected: false,
            threat_type: ThreatType::NormalActivity,
            confidence: 0.0,
            score: 0.0,
            description: "Normal activity".to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.threat_type.default_severity()
    }
}

pub fn suspicion_score(
    persons: &[TrackedPerson],
    weapons: &[Detection],
    params: &ThreatParams,
) -> f32 {
    let mut score = 0.0;

    if !weapons.is_empty() {
        score += WEAPON_WEIGHT;
    }
    if persons.len() > params.crowd_threshold {
        score += CROWD_WEIGHT;
    }

    for person in persons {
        for weapon in weapons {
            if person.center.distance(&weapon.bbox.center()) < params.weapon_proximity_px {
                score += PROXIMITY_WEIGHT;
            }
        }
        if person
            .displacement
            .map_or(false, |d| d > params.movement_threshold_px)
        {
            score += MOVEMENT_WEIGHT;
        }
    }

    f32::min(score, 1.0)
}

pub fn assess(
    persons: &[TrackedPerson],
    weapons: &[Detection],
    faces: &[FaceVerification],
    params: &ThreatParams,
) -> ThreatAssessment {
    let score = suspicion_score(persons, weapons, params);
    let description = describe(persons.len(), weapons);

    if score > params.threshold {
        let threat_type = if !weapons.is_empty() && !persons.is_empty() {
            ThreatType::ArmedThreat
        } else if !weapons.is_empty() {
            ThreatType::WeaponDetected
        } else if persons.len() > params.crowd_threshold {
            ThreatType::CrowdFormation
        } else {
            ThreatType::SuspiciousActivity
        };
        return ThreatAssessment {
            threat_detected: true,
            threat_type,
            confidence: score * 100.0,
            score,
            description,
        };
    }

    if faces.iter().any(|f| f.result.is_intruder()) {
        return ThreatAssessment {
            threat_detected: true,
            threat_type: ThreatType::Intruder,
            confidence: INTRUDER_CONFIDENCE,
            score,
            description: "Unauthorized person detected".to_string(),
        };
    }

    ThreatAssessment {
        threat_detected: false,
        threat_type: ThreatType::NormalActivity,
        confidence: score * 100.0,
        score,
        description,
    }
}

fn describe(person_count: usize, weapons: &[Detection]) -> String {
    let mut parts = Vec::new();

    if !weapons.is_empty() {
        let mut kinds: Vec<&str> = weapons.iter().map(|w| w.class_name.as_str()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        parts.push(format!("Weapon detected: {}", kinds.join(", ")));
    }
    match person_count {
        0 => {}
        1 => parts.push("1 person detected".to_string()),
        n => parts.push(format!("{} people detected", n)),
    }
    if !weapons.is_empty() && person_count > 0 {
        parts.push("Armed individual detected - immediate alert required".to_string());
    }

    if parts.is_empty() {
        "Normal activity".to_string()
    } else {
        parts.join(". ")
    }
}
