use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned box in frame-pixel coordinates, `(x1, y1)` top-left.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Finite coordinates with `x2 >= x1` and `y2 >= y1`.
    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite())
            && self.x2 >= self.x1
            && self.y2 >= self.y1
    }

    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BBox,
    #[serde(default)]
    pub class_id: i32,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: BBox, class_id: i32) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
            class_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Severity::Medium)
    }

    pub fn is_info(&self) -> bool {
        matches!(self, Severity::Low)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity: {0}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Weapon,
    Crowd,
    AbandonedObject,
    Loitering,
    HighActivity,
    Intruder,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Weapon => "weapon",
            ActivityKind::Crowd => "crowd",
            ActivityKind::AbandonedObject => "abandoned_object",
            ActivityKind::Loitering => "loitering",
            ActivityKind::HighActivity => "high_activity",
            ActivityKind::Intruder => "intruder",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
}

impl ActivityEvent {
    pub fn new(kind: ActivityKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            severity,
            bbox: None,
            person_id: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_person(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }
}

/// Frame-level classification produced by threat assessment.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    NormalActivity,
    ArmedThreat,
    WeaponDetected,
    CrowdFormation,
    SuspiciousActivity,
    Intruder,
}

impl ThreatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatType::NormalActivity => "normal_activity",
            ThreatType::ArmedThreat => "armed_threat",
            ThreatType::WeaponDetected => "weapon_detected",
            ThreatType::CrowdFormation => "crowd_formation",
            ThreatType::SuspiciousActivity => "suspicious_activity",
            ThreatType::Intruder => "intruder",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ThreatType::ArmedThreat | ThreatType::WeaponDetected => Severity::Critical,
            ThreatType::Intruder => Severity::High,
            ThreatType::CrowdFormation | ThreatType::SuspiciousActivity => Severity::Medium,
            ThreatType::NormalActivity => Severity::Low,
        }
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-level alert pushed to live subscribers and notification sinks.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AlertPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: ThreatType,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    pub confidence: f32,
    pub camera_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Online,
    Offline,
    Degraded,
}

impl CameraStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Online => "online",
            CameraStatus::Offline => "offline",
            CameraStatus::Degraded => "degraded",
        }
    }
}

impl FromStr for CameraStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(CameraStatus::Online),
            "offline" => Ok(CameraStatus::Offline),
            "degraded" => Ok(CameraStatus::Degraded),
            other => Err(format!("unknown camera status: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl From<Severity> for LogLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => LogLevel::Info,
            Severity::Medium => LogLevel::Warning,
            Severity::High | Severity::Critical => LogLevel::Error,
        }
    }
}
