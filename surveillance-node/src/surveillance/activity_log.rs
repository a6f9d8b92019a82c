use aieyes_common::{ActivityEvent, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    /// Output of the activity rules.
    Activity,
    /// Periodic object counts.
    Monitoring,
    /// Camera lifecycle and operational errors. Never counted as alerts.
    System,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogEntry {
    pub time: DateTime<Utc>,
    pub camera: String,
    pub description: String,
    pub severity: Severity,
    pub category: LogCategory,
    pub is_alert: bool,
    pub is_warning: bool,
    pub is_info: bool,
}

impl ActivityLogEntry {
    pub fn new(camera: &str, description: impl Into<String>, severity: Severity, category: LogCategory) -> Self {
        Self {
            time: Utc::now(),
            camera: camera.to_string(),
            description: description.into(),
            severity,
            category,
            is_alert: category == LogCategory::Activity && severity.is_alert(),
            is_warning: severity.is_warning(),
            is_info: severity.is_info(),
        }
    }

    pub fn from_activity(camera: &str, activity: &ActivityEvent) -> Self {
        Self::new(camera, activity.description.clone(), activity.severity, LogCategory::Activity)
    }
}

/// Bounded ring of recent entries; the oldest entry is evicted first.
pub struct ActivityLog {
    capacity: usize,
    entries: RwLock<VecDeque<ActivityLogEntry>>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, entry: ActivityLogEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityLogEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
