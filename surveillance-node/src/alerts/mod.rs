pub mod notifier;
pub mod snapshots;

use aieyes_common::utils::current_timestamp_ms;
use aieyes_common::{AlertPayload, CameraStatus, LogLevel, Severity};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use image::RgbImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::AlertConfig;
use crate::metrics::Metrics;
use crate::pipeline::threat::ThreatAssessment;
use crate::storage::{NewAlert, NewLog, Storage};

pub use notifier::{compose, template_for, EmailMessage, NotificationSink, WebhookNotifier};
pub use snapshots::SnapshotStore;

#[derive(Debug, Clone)]
pub struct AlertRequest {
    pub camera_id: String,
    pub location: String,
    pub threat: ThreatAssessment,
    pub frame: Option<RgbImage>,
    pub detected_at: DateTime<Utc>,
}

enum DispatchEvent {
    Alert(AlertRequest),
    Log(NewLog),
    CameraStatus { camera_id: String, status: CameraStatus },
}

/// Cloneable front of the alert task. Every method is non-blocking and safe to call from
/// camera worker threads; events that do not fit in the queue are dropped.
#[derive(Clone)]
pub struct AlertDispatcher {
    tx: mpsc::Sender<DispatchEvent>,
    live: broadcast::Sender<AlertPayload>,
    cooldowns: Arc<DashMap<(String, aieyes_common::ThreatType), Instant>>,
    cooldown: Duration,
    metrics: Arc<Metrics>,
}

impl AlertDispatcher {
    /// Spawns the dispatch and notification tasks on the current runtime.
    pub fn start(
        config: &AlertConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn NotificationSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (notify_tx, notify_rx) = mpsc::channel(config.notification_queue_capacity);
        let (live, _) = broadcast::channel(config.broadcast_capacity);

        let task = DispatchTask {
            storage,
            snapshots: config.snapshot_dir.clone().map(SnapshotStore::new),
            live: live.clone(),
            notify_tx,
            notify_min_severity: config.notify_min_severity,
            metrics: metrics.clone(),
        };
        tokio::spawn(task.run(rx));
        tokio::spawn(run_notifications(notifier, notify_rx));

        Self {
            tx,
            live,
            cooldowns: Arc::new(DashMap::new()),
            cooldown: Duration::from_secs(config.cooldown_secs),
            metrics,
        }
    }

    /// Queues an alert unless the same camera raised the same threat type within the cooldown.
    /// The cooldown only starts once the alert is actually queued.
    pub fn alert(&self, request: AlertRequest) -> bool {
        let key = (request.camera_id.clone(), request.threat.threat_type);
        let now = Instant::now();
        let cooling = self
            .cooldowns
            .get(&key)
            .map_or(false, |last| now.duration_since(*last) < self.cooldown);
        if cooling {
            debug!(
                camera = %request.camera_id,
                "Suppressing {} alert inside cooldown",
                request.threat.threat_type
            );
            return false;
        }

        if !self.enqueue(DispatchEvent::Alert(request)) {
            return false;
        }
        self.cooldowns.insert(key, now);
        true
    }

    pub fn log(&self, camera_id: &str, action: &str, description: &str, level: LogLevel) -> bool {
        self.enqueue(DispatchEvent::Log(NewLog {
            camera_id: camera_id.to_string(),
            action: action.to_string(),
            description: description.to_string(),
            level,
            timestamp: Utc::now(),
        }))
    }

    pub fn camera_status(&self, camera_id: &str, status: CameraStatus) -> bool {
        self.enqueue(DispatchEvent::CameraStatus {
            camera_id: camera_id.to_string(),
            status,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertPayload> {
        self.live.subscribe()
    }

    fn enqueue(&self, event: DispatchEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.dropped_events.inc();
                warn!("Alert queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.dropped_events.inc();
                warn!("Alert task stopped, dropping event");
                false
            }
        }
    }
}

struct DispatchTask {
    storage: Arc<dyn Storage>,
    snapshots: Option<SnapshotStore>,
    live: broadcast::Sender<AlertPayload>,
    notify_tx: mpsc::Sender<AlertPayload>,
    notify_min_severity: Severity,
    metrics: Arc<Metrics>,
}

impl DispatchTask {
    async fn run(self, mut rx: mpsc::Receiver<DispatchEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                DispatchEvent::Alert(request) => self.handle_alert(request).await,
                DispatchEvent::Log(log) => {
                    if let Err(e) = self.storage.create_log(log).await {
                        self.metrics.storage_failures.inc();
                        warn!("Failed to persist log entry: {}", e);
                    }
                }
                DispatchEvent::CameraStatus { camera_id, status } => {
                    match self.storage.update_camera_status(&camera_id, status).await {
                        Ok(true) => debug!(camera = %camera_id, "Camera status {}", status.as_str()),
                        Ok(false) => debug!(camera = %camera_id, "No stored camera record to update"),
                        Err(e) => {
                            self.metrics.storage_failures.inc();
                            warn!(camera = %camera_id, "Failed to persist camera status: {}", e);
                        }
                    }
                }
            }
        }
        debug!("Alert dispatcher stopped");
    }

    async fn handle_alert(&self, request: AlertRequest) {
        let AlertRequest {
            camera_id,
            location,
            threat,
            frame,
            detected_at,
        } = request;
        let severity = threat.severity();

        let image_path = match (&self.snapshots, frame) {
            (Some(store), Some(frame)) => match store.save_frame(&camera_id, frame, detected_at).await {
                Ok(path) => Some(path.display().to_string()),
                Err(e) => {
                    warn!(camera = %camera_id, "Failed to save alert snapshot: {}", e);
                    None
                }
            },
            _ => None,
        };

        let record = NewAlert {
            camera_id: camera_id.clone(),
            alert_type: threat.threat_type,
            message: threat.description.clone(),
            severity,
            image_path: image_path.clone(),
            timestamp: detected_at,
        };
        let id = match self.storage.create_alert(record).await {
            Ok(id) => id,
            Err(e) => {
                self.metrics.storage_failures.inc();
                error!(camera = %camera_id, "Failed to persist alert: {}", e);
                current_timestamp_ms().to_string()
            }
        };

        let payload = AlertPayload {
            id,
            alert_type: threat.threat_type,
            timestamp: detected_at,
            severity,
            description: threat.description,
            location,
            confidence: threat.confidence,
            camera_id,
            image_path,
        };
        info!(
            camera = %payload.camera_id,
            "Alert sent: {} at {} ({})",
            payload.alert_type,
            payload.location,
            payload.severity
        );

        // no live subscribers is fine
        let _ = self.live.send(payload.clone());

        if severity >= self.notify_min_severity {
            if let Err(e) = self.notify_tx.try_send(payload) {
                self.metrics.dropped_events.inc();
                warn!("Notification queue rejected alert: {}", e);
            }
        }
    }
}

async fn run_notifications(notifier: Arc<dyn NotificationSink>, mut rx: mpsc::Receiver<AlertPayload>) {
    while let Some(alert) = rx.recv().await {
        if let Err(e) = notifier.notify(&alert).await {
            warn!("Alert {} notification failed: {}", alert.id, e);
        }
    }
}
