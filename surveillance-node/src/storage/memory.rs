use aieyes_common::CameraStatus;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use tokio::sync::RwLock;

use super::{start_of_day, AlertRecord, CameraRecord, LogRecord, NewAlert, NewLog, Storage};
use crate::error::Result;

pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

#[derive(Default)]
struct Tables {
    alerts: VecDeque<AlertRecord>,
    logs: VecDeque<LogRecord>,
    cameras: Vec<CameraRecord>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// Process-local stand-in for the database. Ids are sequential; nothing survives a restart.
/// Alerts and logs are each kept up to `capacity` rows, oldest evicted first.
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
    capacity: usize,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            capacity: capacity.max(1),
        }
    }
}

fn push_bounded<T>(rows: &mut VecDeque<T>, row: T, capacity: usize) {
    while rows.len() >= capacity {
        rows.pop_front();
    }
    rows.push_back(row);
}

#[async_trait]
impl Storage for InMemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create_alert(&self, alert: NewAlert) -> Result<String> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = AlertRecord {
            id: id.clone(),
            camera_id: alert.camera_id,
            alert_type: alert.alert_type.as_str().to_string(),
            message: alert.message,
            severity: alert.severity,
            image_path: alert.image_path,
            timestamp: alert.timestamp,
            resolved: false,
            acknowledged: false,
        };
        push_bounded(&mut tables.alerts, record, self.capacity);
        Ok(id)
    }

    async fn acknowledge_alert(&self, alert_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        })
    }

    async fn resolve_alert(&self, alert_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.resolved = true;
                true
            }
            None => false,
        })
    }

    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>> {
        let tables = self.tables.read().await;
        let mut alerts: Vec<AlertRecord> = tables.alerts.iter().cloned().collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn alerts_today(&self) -> Result<u64> {
        let since = start_of_day(Utc::now());
        let tables = self.tables.read().await;
        Ok(tables.alerts.iter().filter(|a| a.timestamp >= since).count() as u64)
    }

    async fn create_log(&self, log: NewLog) -> Result<String> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = LogRecord {
            id: id.clone(),
            camera_id: log.camera_id,
            action: log.action,
            description: log.description,
            level: log.level.as_str().to_string(),
            timestamp: log.timestamp,
        };
        push_bounded(&mut tables.logs, record, self.capacity);
        Ok(id)
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.logs.iter().rev().take(limit).cloned().collect())
    }

    async fn upsert_camera(&self, camera: CameraRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.cameras.iter_mut().find(|c| c.id == camera.id) {
            Some(existing) => *existing = camera,
            None => tables.cameras.push(camera),
        }
        Ok(())
    }

    async fn find_all_cameras(&self) -> Result<Vec<CameraRecord>> {
        Ok(self.tables.read().await.cameras.clone())
    }

    async fn get_online_cameras(&self) -> Result<Vec<CameraRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cameras
            .iter()
            .filter(|c| c.status == CameraStatus::Online)
            .cloned()
            .collect())
    }

    async fn update_camera_status(&self, camera_id: &str, status: CameraStatus) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.cameras.iter_mut().find(|c| c.id == camera_id) {
            Some(camera) => {
                camera.status = status;
                camera.last_seen = Utc::now();
                true
            }
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aieyes_common::{LogLevel, Severity, ThreatType};
    use chrono::Duration;

    fn alert(camera: &str, minutes_ago: i64) -> NewAlert {
        NewAlert {
            camera_id: camera.to_string(),
            alert_type: ThreatType::WeaponDetected,
            message: "Weapon detected: knife".to_string(),
            severity: Severity::Critical,
            image_path: None,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn camera(id: &str, status: CameraStatus) -> CameraRecord {
        CameraRecord {
            id: id.to_string(),
            name: id.to_string(),
            location: "Lobby".to_string(),
            url: format!("http://10.0.0.1:8080/{}", id),
            kind: "mjpeg".to_string(),
            status,
            last_seen: Utc::now(),
        }
    }

    #[tokio::test]
    async fn alerts_sorted_newest_first_and_mutable() {
        let storage = InMemoryStorage::new();
        let old = storage.create_alert(alert("cam1", 5)).await.unwrap();
        let new = storage.create_alert(alert("cam2", 0)).await.unwrap();
        assert_ne!(old, new);

        let recent = storage.recent_alerts(10).await.unwrap();
        assert_eq!(recent[0].id, new);
        assert_eq!(recent[0].alert_type, "weapon_detected");
        assert_eq!(storage.recent_alerts(1).await.unwrap().len(), 1);

        assert!(storage.acknowledge_alert(&old).await.unwrap());
        assert!(storage.resolve_alert(&old).await.unwrap());
        assert!(!storage.resolve_alert("missing").await.unwrap());

        let recent = storage.recent_alerts(10).await.unwrap();
        let updated = recent.iter().find(|a| a.id == old).unwrap();
        assert!(updated.acknowledged && updated.resolved);
    }

    #[tokio::test]
    async fn alerts_today_skips_yesterday() {
        let storage = InMemoryStorage::new();
        storage.create_alert(alert("cam1", 0)).await.unwrap();
        storage.create_alert(alert("cam1", 60 * 30)).await.unwrap();
        assert_eq!(storage.alerts_today().await.unwrap(), 1);
    }

    fn log(action: &str) -> NewLog {
        NewLog {
            camera_id: "cam1".to_string(),
            action: action.to_string(),
            description: action.to_string(),
            level: LogLevel::Info,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn tables_evict_oldest_rows_at_capacity() {
        let storage = InMemoryStorage::with_capacity(3);
        for n in 0..5 {
            storage.create_log(log(&format!("crowd_{}", n))).await.unwrap();
            storage.create_alert(alert("cam1", 5 - n)).await.unwrap();
        }

        let logs = storage.recent_logs(10).await.unwrap();
        let actions: Vec<&str> = logs.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(actions, vec!["crowd_4", "crowd_3", "crowd_2"]);

        let alerts = storage.recent_alerts(10).await.unwrap();
        assert_eq!(alerts.len(), 3);
        // the two oldest alerts were evicted and can no longer be acknowledged
        assert!(!storage.acknowledge_alert("2").await.unwrap());
        assert!(storage.acknowledge_alert(&alerts[0].id).await.unwrap());
    }

    #[tokio::test]
    async fn logs_newest_first() {
        let storage = InMemoryStorage::new();
        for action in ["started", "loitering", "stopped"] {
            storage.create_log(log(action)).await.unwrap();
        }
        let logs = storage.recent_logs(2).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, "stopped");
        assert_eq!(logs[1].level, "info");
    }

    #[tokio::test]
    async fn camera_upsert_and_status_filter() {
        let storage = InMemoryStorage::new();
        storage.upsert_camera(camera("cam1", CameraStatus::Online)).await.unwrap();
        storage.upsert_camera(camera("cam2", CameraStatus::Offline)).await.unwrap();
        storage.upsert_camera(camera("cam2", CameraStatus::Online)).await.unwrap();
        assert_eq!(storage.find_all_cameras().await.unwrap().len(), 2);
        assert_eq!(storage.get_online_cameras().await.unwrap().len(), 2);

        assert!(storage.update_camera_status("cam1", CameraStatus::Degraded).await.unwrap());
        assert!(!storage.update_camera_status("cam9", CameraStatus::Online).await.unwrap());
        let online = storage.get_online_cameras().await.unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].id, "cam2");
    }
}
