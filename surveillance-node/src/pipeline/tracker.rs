use aieyes_common::{ActivityEvent, ActivityKind, BBox, Detection, Point, Severity};
use std::collections::HashMap;

use crate::config::{PipelineConfig, TrackerKind};

#[derive(Debug, Clone, PartialEq)]
pub struct PersonTrackEntry {
    pub person_id: String,
    pub center: Point,
    pub last_seen_frame: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPerson {
    pub person_id: String,
    pub center: Point,
    pub bbox: BBox,
    /// Distance from the previous sighting of the same id; `None` on first sighting.
    pub displacement: Option<f32>,
}

/// Assigns ids to the persons of one analyzed frame.
pub trait PersonTracker: Send {
    fn update(&mut self, persons: &[Detection], frame_index: u64) -> Vec<TrackedPerson>;
    fn last_positions(&self) -> &HashMap<String, PersonTrackEntry>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdScheme {
    Index,
    GridBucket { cell: f32 },
}

/// Positional ids, not re-identification. When people enter, leave or reorder between
/// frames, ids move to other people. Entries are never evicted, so an id that recurs
/// is compared with its last recorded center however old.
#[derive(Debug)]
pub struct NaiveProximityTracker {
    scheme: IdScheme,
    positions: HashMap<String, PersonTrackEntry>,
}

impl NaiveProximityTracker {
    pub fn new(scheme: IdScheme) -> Self {
        Self {
            scheme,
            positions: HashMap::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let scheme = match config.tracker {
            TrackerKind::Index => IdScheme::Index,
            TrackerKind::GridBucket => IdScheme::GridBucket {
                cell: config.grid_cell_px,
            },
        };
        Self::new(scheme)
    }

    fn person_id(&self, index: usize, center: &Point) -> String {
        match self.scheme {
            IdScheme::Index => format!("person_{}", index),
            IdScheme::GridBucket { cell } => format!(
                "{}_{}",
                (center.x / cell).floor() as i64,
                (center.y / cell).floor() as i64
            ),
        }
    }
}

impl PersonTracker for NaiveProximityTracker {
    fn update(&mut self, persons: &[Detection], frame_index: u64) -> Vec<TrackedPerson> {
        let tracked: Vec<TrackedPerson> = persons
            .iter()
            .enumerate()
            .map(|(i, person)| {
                let center = person.bbox.center();
                let person_id = self.person_id(i, &center);
                let displacement = self
                    .positions
                    .get(&person_id)
                    .map(|prev| prev.center.distance(&center));
                TrackedPerson {
                    person_id,
                    center,
                    bbox: person.bbox,
                    displacement,
                }
            })
            .collect();

        for person in &tracked {
            self.positions.insert(
                person.person_id.clone(),
                PersonTrackEntry {
                    person_id: person.person_id.clone(),
                    center: person.center,
                    last_seen_frame: frame_index,
                },
            );
        }

        tracked
    }

    fn last_positions(&self) -> &HashMap<String, PersonTrackEntry> {
        &self.positions
    }
}

/// Consecutive-stationary counters per person id.
#[derive(Debug)]
pub struct LoiteringMonitor {
    threshold: u32,
    movement_threshold: f32,
    dwell_secs: f32,
    counters: HashMap<String, u32>,
}

impl LoiteringMonitor {
    pub fn new(threshold: u32, movement_threshold: f32, dwell_secs: f32) -> Self {
        Self {
            threshold: threshold.max(1),
            movement_threshold,
            dwell_secs,
            counters: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn counter(&self, person_id: &str) -> Option<u32> {
        self.counters.get(person_id).copied()
    }

    /// Fires once per `threshold` stationary observations, then starts counting again.
    pub fn observe(&mut self, tracked: &[TrackedPerson]) -> Vec<ActivityEvent> {
        let mut events = Vec::new();

        for person in tracked {
            let counter = self.counters.entry(person.person_id.clone()).or_insert(0);
            match person.displacement {
                Some(d) if d < self.movement_threshold => *counter += 1,
                Some(_) => *counter = 0,
                None => {}
            }

            if *counter >= self.threshold {
                *counter = 0;
                events.push(
                    ActivityEvent::new(
                        ActivityKind::Loitering,
                        Severity::Medium,
                        format!(
                            "Person loitering detected: stationary for {:.0}s",
                            self.dwell_secs
                        ),
                    )
                    .with_bbox(person.bbox)
                    .with_person(person.person_id.clone()),
                );
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_at(cx: f32, cy: f32) -> Detection {
        Detection::new("person", 0.9, BBox::new(cx - 20.0, cy - 40.0, cx + 20.0, cy + 40.0), 0)
    }

    #[test]
    fn loitering_fires_once_after_threshold_stationary_frames() {
        let mut tracker = NaiveProximityTracker::new(IdScheme::Index);
        let mut monitor = LoiteringMonitor::new(150, 50.0, 5.0);
        let mut fired_at = Vec::new();

        for frame in 1..=151u64 {
            let jitter = (frame % 3) as f32 * 10.0;
            let tracked = tracker.update(&[person_at(300.0 + jitter, 200.0)], frame);
            let events = monitor.observe(&tracked);
            if !events.is_empty() {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].kind, ActivityKind::Loitering);
                assert_eq!(events[0].severity, Severity::Medium);
                assert_eq!(events[0].person_id.as_deref(), Some("person_0"));
                fired_at.push(frame);
                assert_eq!(monitor.counter("person_0"), Some(0));
            }
        }

        // sighting frame plus 150 stationary frames
        assert_eq!(fired_at, vec![151]);
    }

    #[test]
    fn large_move_resets_counter() {
        let mut tracker = NaiveProximityTracker::new(IdScheme::Index);
        let mut monitor = LoiteringMonitor::new(150, 50.0, 5.0);

        for frame in 0..40u64 {
            let tracked = tracker.update(&[person_at(100.0, 100.0)], frame);
            monitor.observe(&tracked);
        }
        assert_eq!(monitor.counter("person_0"), Some(39));

        let tracked = tracker.update(&[person_at(150.0, 100.0)], 40);
        assert_eq!(tracked[0].displacement, Some(50.0));
        monitor.observe(&tracked);
        assert_eq!(monitor.counter("person_0"), Some(0));
    }

    #[test]
    fn index_ids_follow_detection_order() {
        let mut tracker = NaiveProximityTracker::new(IdScheme::Index);
        tracker.update(&[person_at(100.0, 100.0), person_at(500.0, 100.0)], 0);
        let swapped = tracker.update(&[person_at(500.0, 100.0), person_at(100.0, 100.0)], 1);

        // ids stay positional, so a reorder looks like two large moves
        assert_eq!(swapped[0].person_id, "person_0");
        assert_eq!(swapped[0].displacement, Some(400.0));
        assert_eq!(tracker.last_positions().len(), 2);
    }

    #[test]
    fn grid_bucket_ids_and_retained_entries() {
        let mut tracker = NaiveProximityTracker::new(IdScheme::GridBucket { cell: 50.0 });
        let first = tracker.update(&[person_at(120.0, 260.0)], 0);
        assert_eq!(first[0].person_id, "2_5");
        assert_eq!(first[0].displacement, None);

        let moved = tracker.update(&[person_at(320.0, 260.0)], 1);
        assert_eq!(moved[0].person_id, "6_5");
        assert_eq!(tracker.last_positions().len(), 2);
        assert_eq!(tracker.last_positions()["2_5"].last_seen_frame, 0);
    }
}
