pub mod database;
pub mod memory;

use aieyes_common::{CameraStatus, LogLevel, Severity, ThreatType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{CameraConfig, SourceKind, StorageBackend, StorageConfig};
use crate::error::Result;

pub use database::PgStorage;
pub use memory::InMemoryStorage;

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub camera_id: String,
    pub alert_type: ThreatType,
    pub message: String,
    pub severity: Severity,
    pub image_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertRecord {
    pub id: String,
    pub camera_id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub message: String,
    pub severity: Severity,
    pub image_path: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub acknowledged: bool,
}

#[derive(Debug, Clone)]
pub struct NewLog {
    pub camera_id: String,
    pub action: String,
    pub description: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogRecord {
    pub id: String,
    pub camera_id: String,
    pub action: String,
    pub description: String,
    pub level: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CameraRecord {
    pub id: String,
    pub name: String,
    pub location: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: CameraStatus,
    pub last_seen: DateTime<Utc>,
}

impl From<&CameraConfig> for CameraRecord {
    fn from(camera: &CameraConfig) -> Self {
        Self {
            id: camera.id.clone(),
            name: camera.name.clone(),
            location: camera.location.clone(),
            url: camera.source.clone(),
            kind: match camera.kind {
                SourceKind::Mjpeg => "mjpeg",
                SourceKind::Snapshot => "snapshot",
            }
            .to_string(),
            status: CameraStatus::Offline,
            last_seen: Utc::now(),
        }
    }
}

/// Alert, log and camera persistence. Every call may fail on its own; callers log and carry on.
#[async_trait]
pub trait Storage: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn create_alert(&self, alert: NewAlert) -> Result<String>;
    async fn acknowledge_alert(&self, alert_id: &str) -> Result<bool>;
    async fn resolve_alert(&self, alert_id: &str) -> Result<bool>;
    /// Newest first.
    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>>;
    /// Alerts since 00:00 UTC.
    async fn alerts_today(&self) -> Result<u64>;

    async fn create_log(&self, log: NewLog) -> Result<String>;
    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogRecord>>;

    async fn upsert_camera(&self, camera: CameraRecord) -> Result<()>;
    async fn find_all_cameras(&self) -> Result<Vec<CameraRecord>>;
    async fn get_online_cameras(&self) -> Result<Vec<CameraRecord>>;
    async fn update_camera_status(&self, camera_id: &str, status: CameraStatus) -> Result<bool>;
}

/// Picks the backend once at startup.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage ({} rows per table)", config.memory_capacity);
            Ok(Arc::new(InMemoryStorage::with_capacity(config.memory_capacity)))
        }
        StorageBackend::Postgres => match PgStorage::connect(&config.database_url, config.max_connections).await {
            Ok(storage) => {
                info!("Connected to Postgres storage");
                Ok(Arc::new(storage))
            }
            Err(e) if config.fallback_to_memory => {
                warn!("Postgres unavailable ({}), falling back to in-memory storage", e);
                Ok(Arc::new(InMemoryStorage::with_capacity(config.memory_capacity)))
            }
            Err(e) => Err(e),
        },
    }
}

pub(crate) fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}
