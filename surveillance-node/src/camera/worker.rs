use aieyes_common::utils::format_duration;
use aieyes_common::{CameraStatus, LogLevel, Severity};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::VideoSource;
use crate::alerts::{AlertDispatcher, AlertRequest};
use crate::config::{CameraConfig, CameraOrigin, WorkerConfig};
use crate::error::{Result, SurveillanceError};
use crate::metrics::Metrics;
use crate::pipeline::{FrameProcessingPipeline, FrameResult, PerCameraState};
use crate::surveillance::activity_log::{ActivityLog, ActivityLogEntry, LogCategory};
use crate::surveillance::registry::{CameraRuntimeState, ResultRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Reconnecting,
}

/// Everything a camera worker shares with the rest of the node.
#[derive(Clone)]
pub struct WorkerContext {
    pub pipeline: Arc<FrameProcessingPipeline>,
    pub registry: Arc<ResultRegistry>,
    pub activity_log: Arc<ActivityLog>,
    pub metrics: Arc<Metrics>,
    pub dispatcher: AlertDispatcher,
    pub config: WorkerConfig,
    pub loitering_frames: u32,
}

/// Owner side of a running worker. Dropping the stop sender wakes the worker out of its pacing sleep.
pub struct WorkerHandle {
    camera_id: String,
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn signal_stop(&mut self) {
        self.stop_tx.take();
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    pub fn join(mut self) {
        self.signal_stop();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!(camera = %self.camera_id, "Camera worker panicked");
            }
        }
    }
}

/// Opens the source and reads the first frame, then hands the rest of the run to a new thread.
///
/// Manual cameras get `initial_read_attempts` tries with a fixed back-off; auto-detected
/// cameras get one. On failure the camera is reported offline and no thread is started.
pub fn start(camera: CameraConfig, mut source: Box<dyn VideoSource>, ctx: WorkerContext) -> Result<WorkerHandle> {
    let attempts = match camera.origin {
        CameraOrigin::Manual => ctx.config.initial_read_attempts.max(1),
        CameraOrigin::AutoDetected => 1,
    };

    let mut last_error = None;
    let mut first_frame = None;
    for attempt in 1..=attempts {
        match source.open().and_then(|_| source.read()) {
            Ok(frame) => {
                first_frame = Some(frame);
                break;
            }
            Err(e) => {
                warn!(
                    camera = %camera.id,
                    "Start attempt {}/{} on {} failed: {}",
                    attempt,
                    attempts,
                    source.describe(),
                    e
                );
                source.release();
                last_error = Some(e);
                if attempt < attempts {
                    thread::sleep(ctx.config.initial_retry());
                }
            }
        }
    }

    let Some(first_frame) = first_frame else {
        let reason = last_error.map_or_else(|| "no frame".to_string(), |e| e.to_string());
        let message = format!("Camera unreachable: {}", reason);
        ctx.activity_log.push(ActivityLogEntry::new(
            &camera.id,
            message.clone(),
            Severity::Medium,
            LogCategory::System,
        ));
        ctx.dispatcher.camera_status(&camera.id, CameraStatus::Offline);
        ctx.dispatcher.log(&camera.id, "camera_unreachable", &message, LogLevel::Error);
        return Err(SurveillanceError::CameraUnreachable(format!("{}: {}", camera.id, reason)));
    };

    let mut runtime = CameraRuntimeState::new(&camera);
    runtime.worker_state = WorkerState::Running;
    ctx.registry.insert(runtime);
    ctx.dispatcher.camera_status(&camera.id, CameraStatus::Online);
    ctx.dispatcher.log(&camera.id, "surveillance_started", "Surveillance started", LogLevel::Info);
    ctx.activity_log.push(ActivityLogEntry::new(
        &camera.id,
        "Surveillance started",
        Severity::Low,
        LogCategory::System,
    ));

    let (stop_tx, stop_rx) = channel::bounded(1);
    let camera_id = camera.id.clone();
    let state = PerCameraState::new(ctx.pipeline.config(), ctx.loitering_frames);
    let worker = CameraWorker {
        camera,
        source,
        ctx,
        state,
        stop_rx,
        frame_index: 0,
        failures: 0,
        last_summary: None,
    };

    let join = thread::Builder::new()
        .name(format!("camera-{}", camera_id))
        .spawn(move || worker.run(first_frame))?;

    info!(camera = %camera_id, "Camera worker started");
    Ok(WorkerHandle {
        camera_id,
        stop_tx: Some(stop_tx),
        join: Some(join),
    })
}

struct CameraWorker {
    camera: CameraConfig,
    source: Box<dyn VideoSource>,
    ctx: WorkerContext,
    state: PerCameraState,
    stop_rx: Receiver<()>,
    frame_index: u64,
    failures: u32,
    last_summary: Option<Instant>,
}

impl CameraWorker {
    fn run(mut self, first_frame: RgbImage) {
        let started = Instant::now();
        let mut pending = Some(first_frame);

        loop {
            let read = match pending.take() {
                Some(frame) => Ok(frame),
                None => self.source.read(),
            };

            let pause = match read {
                Ok(frame) => {
                    self.on_frame(&frame);
                    self.ctx.config.frame_interval()
                }
                Err(e) => {
                    self.on_read_failure(e);
                    self.ctx.config.read_retry()
                }
            };

            if self.stop_requested(pause) {
                break;
            }
        }

        self.source.release();
        info!(
            camera = %self.camera.id,
            frames = self.state.frame_count,
            "Camera worker stopped after {}",
            format_duration(started.elapsed())
        );
    }

    fn stop_requested(&self, pause: Duration) -> bool {
        !matches!(self.stop_rx.recv_timeout(pause), Err(RecvTimeoutError::Timeout))
    }

    fn on_frame(&mut self, frame: &RgbImage) {
        let camera_id = self.camera.id.as_str();

        if self.failures > 0 {
            info!(camera = %camera_id, "Camera recovered after {} failed reads", self.failures);
            self.failures = 0;
            self.ctx.registry.set_worker_state(camera_id, WorkerState::Running);
            self.ctx.dispatcher.camera_status(camera_id, CameraStatus::Online);
        }

        self.ctx.metrics.frames_captured.with_label_values(&[camera_id]).inc();

        let result = self
            .ctx
            .pipeline
            .process(frame, camera_id, self.frame_index, &mut self.state);
        self.frame_index += 1;

        let fps = self.state.fps.tick();
        self.ctx.metrics.camera_fps.with_label_values(&[camera_id]).set(f64::from(fps));

        let new_detections = if result.fresh {
            self.record(&result);
            result.detections().len() as u64
        } else {
            0
        };

        self.ctx.registry.publish(Arc::new(result), fps, new_detections);
    }

    /// Logs, counts and alerts on a freshly analyzed frame.
    fn record(&mut self, result: &FrameResult) {
        let camera_id = self.camera.id.as_str();
        let metrics = &self.ctx.metrics;

        metrics.frames_analyzed.with_label_values(&[camera_id]).inc();
        if result.analysis.degraded {
            metrics.inference_failures.with_label_values(&[camera_id]).inc();
        }
        metrics.detections_total.inc_by(result.detections().len() as u64);

        for activity in result.activities() {
            let entry = ActivityLogEntry::from_activity(camera_id, activity);
            if entry.is_alert {
                metrics.alerts_total.inc();
                warn!(camera = %camera_id, "ALERT: {}", activity.description);
            } else {
                debug!(camera = %camera_id, "{}", activity.description);
            }
            self.ctx.activity_log.push(entry);
            self.ctx.dispatcher.log(
                camera_id,
                activity.kind.as_str(),
                &activity.description,
                LogLevel::from(activity.severity),
            );
        }

        if result.activities().is_empty() && !result.detections().is_empty() {
            let due = self
                .last_summary
                .map_or(true, |at| at.elapsed() >= self.ctx.config.summary_interval());
            if due {
                self.last_summary = Some(Instant::now());
                self.ctx.activity_log.push(ActivityLogEntry::new(
                    camera_id,
                    format!(
                        "Monitoring: {} objects, {} persons",
                        result.detections().len(),
                        result.persons().len()
                    ),
                    Severity::Low,
                    LogCategory::Monitoring,
                ));
            }
        }

        let threat = result.threat();
        if threat.threat_detected {
            self.ctx.dispatcher.alert(AlertRequest {
                camera_id: camera_id.to_string(),
                location: self.camera.location.clone(),
                threat: threat.clone(),
                frame: Some(result.annotated_frame.clone()),
                detected_at: result.timestamp,
            });
        }
    }

    fn on_read_failure(&mut self, e: SurveillanceError) {
        let camera_id = self.camera.id.as_str();
        self.failures += 1;
        self.ctx.metrics.read_failures.with_label_values(&[camera_id]).inc();
        warn!(camera = %camera_id, "Frame read failed ({} in a row): {}", self.failures, e);

        if self.failures == 1 {
            self.ctx.registry.set_worker_state(camera_id, WorkerState::Reconnecting);
            self.ctx.dispatcher.camera_status(camera_id, CameraStatus::Degraded);
            self.ctx.activity_log.push(ActivityLogEntry::new(
                camera_id,
                format!("Frame read failed: {}", e),
                Severity::Medium,
                LogCategory::System,
            ));
        }

        let reopen_every = self.ctx.config.reopen_after_failures;
        if reopen_every > 0 && self.failures % reopen_every == 0 {
            info!(camera = %camera_id, "Re-opening {}", self.source.describe());
            self.source.release();
            if let Err(e) = self.source.open() {
                warn!(camera = %camera_id, "Re-open failed: {}", e);
            }
        }
    }
}
