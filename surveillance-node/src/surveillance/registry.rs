use aieyes_common::CameraStatus;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::camera::worker::WorkerState;
use crate::config::CameraConfig;
use crate::pipeline::FrameResult;

#[derive(Debug, Clone)]
pub struct CameraRuntimeState {
    pub camera_id: String,
    pub name: String,
    pub location: String,
    pub source_url: String,
    pub is_active: bool,
    pub worker_state: WorkerState,
    pub frame_count: u64,
    pub fps: f32,
    pub total_detections: u64,
    pub last_frame_data: Option<Arc<FrameResult>>,
}

impl CameraRuntimeState {
    pub fn new(camera: &CameraConfig) -> Self {
        Self {
            camera_id: camera.id.clone(),
            name: camera.name.clone(),
            location: camera.location.clone(),
            source_url: camera.source.clone(),
            is_active: true,
            worker_state: WorkerState::Starting,
            frame_count: 0,
            fps: 0.0,
            total_detections: 0,
            last_frame_data: None,
        }
    }

    pub fn status(&self) -> CameraStatus {
        match self.worker_state {
            WorkerState::Running | WorkerState::Starting => CameraStatus::Online,
            WorkerState::Reconnecting => CameraStatus::Degraded,
            WorkerState::Stopped => CameraStatus::Offline,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraStats {
    pub camera_id: String,
    pub name: String,
    pub location: String,
    pub source_url: String,
    pub is_active: bool,
    pub status: CameraStatus,
    pub state: WorkerState,
    pub frame_count: u64,
    pub fps: f32,
    pub total_detections: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub current_objects: usize,
    pub current_persons: usize,
}

impl From<&CameraRuntimeState> for CameraStats {
    fn from(state: &CameraRuntimeState) -> Self {
        let last = state.last_frame_data.as_ref();
        Self {
            camera_id: state.camera_id.clone(),
            name: state.name.clone(),
            location: state.location.clone(),
            source_url: state.source_url.clone(),
            is_active: state.is_active,
            status: state.status(),
            state: state.worker_state,
            frame_count: state.frame_count,
            fps: state.fps,
            total_detections: state.total_detections,
            last_update: last.map(|r| r.timestamp),
            current_objects: last.map_or(0, |r| r.detections().len()),
            current_persons: last.map_or(0, |r| r.persons().len()),
        }
    }
}

/// Latest result per active camera. Written once per frame by that camera's worker.
#[derive(Default)]
pub struct ResultRegistry {
    cameras: DashMap<String, CameraRuntimeState>,
}

impl ResultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: CameraRuntimeState) {
        self.cameras.insert(state.camera_id.clone(), state);
    }

    pub fn remove(&self, camera_id: &str) -> Option<CameraRuntimeState> {
        self.cameras.remove(camera_id).map(|(_, state)| state)
    }

    pub fn publish(&self, result: Arc<FrameResult>, fps: f32, new_detections: u64) {
        if let Some(mut state) = self.cameras.get_mut(&result.camera_id) {
            state.frame_count += 1;
            state.fps = fps;
            state.total_detections += new_detections;
            state.last_frame_data = Some(result);
        }
    }

    pub fn set_worker_state(&self, camera_id: &str, worker_state: WorkerState) {
        if let Some(mut state) = self.cameras.get_mut(camera_id) {
            state.worker_state = worker_state;
        }
    }

    pub fn latest_frame(&self, camera_id: &str) -> Option<Arc<FrameResult>> {
        self.cameras
            .get(camera_id)
            .and_then(|state| state.last_frame_data.clone())
    }

    pub fn contains(&self, camera_id: &str) -> bool {
        self.cameras.contains_key(camera_id)
    }

    pub fn worker_state(&self, camera_id: &str) -> Option<WorkerState> {
        self.cameras.get(camera_id).map(|state| state.worker_state)
    }

    pub fn stats(&self) -> Vec<CameraStats> {
        let mut stats: Vec<CameraStats> = self
            .cameras
            .iter()
            .map(|entry| CameraStats::from(entry.value()))
            .collect();
        stats.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        stats
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FrameAnalysis;
    use chrono::Utc;
    use image::RgbImage;

    fn result(camera_id: &str, frame_index: u64) -> Arc<FrameResult> {
        Arc::new(FrameResult {
            camera_id: camera_id.to_string(),
            frame_index,
            timestamp: Utc::now(),
            annotated_frame: RgbImage::new(4, 4),
            analysis: Arc::new(FrameAnalysis::empty(frame_index)),
            fresh: true,
        })
    }

    #[test]
    fn publish_keeps_latest_result_only() {
        let registry = ResultRegistry::new();
        registry.insert(CameraRuntimeState::new(&CameraConfig::default()));

        registry.publish(result("camera_1", 0), 12.0, 3);
        registry.publish(result("camera_1", 1), 14.5, 2);

        let latest = registry.latest_frame("camera_1").unwrap();
        assert_eq!(latest.frame_index, 1);

        let stats = registry.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].frame_count, 2);
        assert_eq!(stats[0].total_detections, 5);
        assert_eq!(stats[0].fps, 14.5);
    }

    #[test]
    fn unknown_camera_results_are_ignored() {
        let registry = ResultRegistry::new();
        registry.publish(result("ghost", 0), 1.0, 1);
        assert!(registry.is_empty());
        assert!(registry.latest_frame("ghost").is_none());
    }

    #[test]
    fn worker_state_drives_status() {
        let registry = ResultRegistry::new();
        registry.insert(CameraRuntimeState::new(&CameraConfig::default()));
        assert_eq!(registry.stats()[0].status, CameraStatus::Online);

        registry.set_worker_state("camera_1", WorkerState::Reconnecting);
        assert_eq!(registry.stats()[0].status, CameraStatus::Degraded);

        assert!(registry.remove("camera_1").is_some());
        assert!(!registry.contains("camera_1"));
    }
}
