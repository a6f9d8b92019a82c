use aieyes_common::{CameraStatus, LogLevel, Severity};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use super::activity_log::{ActivityLog, ActivityLogEntry, LogCategory};
use super::registry::{CameraStats, ResultRegistry};
use crate::alerts::AlertDispatcher;
use crate::camera::worker::{self, WorkerContext, WorkerHandle, WorkerState};
use crate::camera::SourceFactory;
use crate::config::{CameraConfig, CameraOrigin};
use crate::error::{Result, SurveillanceError};
use crate::metrics::Metrics;
use crate::pipeline::FrameResult;

#[derive(Debug, Clone, Serialize)]
pub struct CameraSummary {
    pub id: String,
    pub name: String,
    pub location: String,
    pub source: String,
    pub origin: CameraOrigin,
    pub state: WorkerState,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub active_cameras: usize,
    pub total_detections: u64,
    pub alert_count: u64,
    pub per_camera_stats: Vec<CameraStats>,
    pub cameras: Vec<CameraSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedStart {
    pub camera_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StartReport {
    pub started: Vec<String>,
    pub already_active: Vec<String>,
    pub failed: Vec<FailedStart>,
}

/// Owns the camera workers. All methods block the caller on camera I/O or thread joins,
/// so async callers go through the blocking pool.
pub struct SurveillanceOrchestrator {
    cameras: Vec<CameraConfig>,
    factory: Arc<dyn SourceFactory>,
    ctx: WorkerContext,
    workers: Mutex<HashMap<String, WorkerHandle>>,
    starting: Mutex<HashSet<String>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SurveillanceOrchestrator {
    pub fn new(cameras: Vec<CameraConfig>, factory: Arc<dyn SourceFactory>, ctx: WorkerContext) -> Self {
        Self {
            cameras,
            factory,
            ctx,
            workers: Mutex::new(HashMap::new()),
            starting: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ResultRegistry> {
        &self.ctx.registry
    }

    pub fn activity_log(&self) -> &Arc<ActivityLog> {
        &self.ctx.activity_log
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.ctx.metrics
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.ctx.dispatcher
    }

    pub fn camera(&self, camera_id: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.id == camera_id)
    }

    pub fn cameras(&self) -> Vec<CameraSummary> {
        self.cameras
            .iter()
            .map(|c| CameraSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                location: c.location.clone(),
                source: c.source.clone(),
                origin: c.origin,
                state: self
                    .ctx
                    .registry
                    .worker_state(&c.id)
                    .unwrap_or(WorkerState::Stopped),
            })
            .collect()
    }

    pub fn is_active(&self, camera_id: &str) -> bool {
        locked(&self.workers).contains_key(camera_id)
    }

    /// `Ok(false)` when the camera already has a worker or is being started by another caller.
    pub fn start_camera(&self, camera_id: &str) -> Result<bool> {
        let camera = self
            .camera(camera_id)
            .cloned()
            .ok_or_else(|| SurveillanceError::CameraNotFound(camera_id.to_string()))?;

        let finished = {
            let mut workers = locked(&self.workers);
            let running = workers.get(camera_id).map(|handle| !handle.is_finished());
            let finished = match running {
                Some(true) => return Ok(false),
                Some(false) => workers.remove(camera_id),
                None => None,
            };
            if !locked(&self.starting).insert(camera_id.to_string()) {
                return Ok(false);
            }
            finished
        };
        if let Some(handle) = finished {
            warn!(camera = %camera_id, "Reaping exited worker");
            handle.join();
            self.ctx.registry.remove(camera_id);
        }

        let started = self
            .factory
            .create(&camera)
            .and_then(|source| worker::start(camera, source, self.ctx.clone()));

        let mut workers = locked(&self.workers);
        locked(&self.starting).remove(camera_id);
        let handle = started?;
        workers.insert(camera_id.to_string(), handle);
        self.ctx.metrics.active_cameras.set(workers.len() as i64);
        info!(camera = %camera_id, "Surveillance started");
        Ok(true)
    }

    /// `Ok(false)` when the camera is known but not running.
    pub fn stop_camera(&self, camera_id: &str) -> Result<bool> {
        if self.camera(camera_id).is_none() {
            return Err(SurveillanceError::CameraNotFound(camera_id.to_string()));
        }

        let handle = {
            let mut workers = locked(&self.workers);
            let handle = workers.remove(camera_id);
            self.ctx.metrics.active_cameras.set(workers.len() as i64);
            handle
        };

        match handle {
            Some(handle) => {
                handle.join();
                self.cleanup(camera_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn start_all(&self) -> StartReport {
        let ids: Vec<String> = self
            .cameras
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.id.clone())
            .collect();

        let outcomes: Vec<(String, Result<bool>)> = std::thread::scope(|scope| {
            let pending: Vec<_> = ids
                .iter()
                .map(|id| (id, scope.spawn(move || self.start_camera(id))))
                .collect();
            pending
                .into_iter()
                .map(|(id, join)| {
                    let outcome = join.join().unwrap_or_else(|_| {
                        Err(SurveillanceError::ProcessingError("start thread panicked".to_string()))
                    });
                    (id.clone(), outcome)
                })
                .collect()
        });

        let mut report = StartReport::default();
        for (camera_id, outcome) in outcomes {
            match outcome {
                Ok(true) => report.started.push(camera_id),
                Ok(false) => report.already_active.push(camera_id),
                Err(e) => report.failed.push(FailedStart {
                    camera_id,
                    reason: e.to_string(),
                }),
            }
        }

        info!(
            "Start all: {} started, {} already active, {} failed",
            report.started.len(),
            report.already_active.len(),
            report.failed.len()
        );
        report
    }

    /// Signals every worker first, then waits for each, so slow cameras stop in parallel.
    pub fn stop_all(&self) -> usize {
        let mut handles: Vec<WorkerHandle> = {
            let mut workers = locked(&self.workers);
            let handles = workers.drain().map(|(_, handle)| handle).collect();
            self.ctx.metrics.active_cameras.set(0);
            handles
        };

        for handle in handles.iter_mut() {
            handle.signal_stop();
        }

        let stopped = handles.len();
        for handle in handles {
            let camera_id = handle.camera_id().to_string();
            handle.join();
            self.cleanup(&camera_id);
        }

        if stopped > 0 {
            info!("Stopped {} camera workers", stopped);
        }
        stopped
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            active_cameras: locked(&self.workers).len(),
            total_detections: self.ctx.metrics.total_detections(),
            alert_count: self.ctx.metrics.alert_count(),
            per_camera_stats: self.ctx.registry.stats(),
            cameras: self.cameras(),
        }
    }

    pub fn recent_activities(&self, limit: usize) -> Vec<ActivityLogEntry> {
        self.ctx.activity_log.recent(limit)
    }

    pub fn latest_frame(&self, camera_id: &str) -> Option<Arc<FrameResult>> {
        self.ctx.registry.latest_frame(camera_id)
    }

    fn cleanup(&self, camera_id: &str) {
        self.ctx.registry.remove(camera_id);
        self.ctx.metrics.forget_camera(camera_id);
        self.ctx.dispatcher.camera_status(camera_id, CameraStatus::Offline);
        self.ctx
            .dispatcher
            .log(camera_id, "surveillance_stopped", "Surveillance stopped", LogLevel::Info);
        self.ctx.activity_log.push(ActivityLogEntry::new(
            camera_id,
            "Surveillance stopped",
            Severity::Low,
            LogCategory::System,
        ));
        info!(camera = %camera_id, "Surveillance stopped");
    }
}
