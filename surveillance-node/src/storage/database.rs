use aieyes_common::{CameraStatus, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use super::{start_of_day, AlertRecord, CameraRecord, LogRecord, NewAlert, NewLog, Storage};
use crate::error::{Result, SurveillanceError};

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

fn alert_from_row(row: &PgRow) -> Result<AlertRecord> {
    let id: Uuid = row.try_get("id")?;
    let severity: String = row.try_get("severity")?;
    Ok(AlertRecord {
        id: id.to_string(),
        camera_id: row.try_get("camera_id")?,
        alert_type: row.try_get("alert_type")?,
        message: row.try_get("message")?,
        severity: severity
            .parse::<Severity>()
            .map_err(|e| SurveillanceError::StorageError(e.to_string()))?,
        image_path: row.try_get("image_path")?,
        timestamp: row.try_get("created_at")?,
        resolved: row.try_get("resolved")?,
        acknowledged: row.try_get("acknowledged")?,
    })
}

fn log_from_row(row: &PgRow) -> Result<LogRecord> {
    let id: Uuid = row.try_get("id")?;
    Ok(LogRecord {
        id: id.to_string(),
        camera_id: row.try_get("camera_id")?,
        action: row.try_get("action")?,
        description: row.try_get("description")?,
        level: row.try_get("level")?,
        timestamp: row.try_get("created_at")?,
    })
}

fn camera_from_row(row: &PgRow) -> Result<CameraRecord> {
    let status: String = row.try_get("status")?;
    Ok(CameraRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        location: row.try_get("location")?,
        url: row.try_get("url")?,
        kind: row.try_get("kind")?,
        status: status.parse().map_err(SurveillanceError::StorageError)?,
        last_seen: row.try_get::<DateTime<Utc>, _>("last_seen")?,
    })
}

fn parse_id(alert_id: &str) -> Option<Uuid> {
    Uuid::parse_str(alert_id).ok()
}

#[async_trait]
impl Storage for PgStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn create_alert(&self, alert: NewAlert) -> Result<String> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO alerts (id, camera_id, alert_type, message, severity, image_path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(&alert.camera_id)
        .bind(alert.alert_type.as_str())
        .bind(&alert.message)
        .bind(alert.severity.as_str())
        .bind(&alert.image_path)
        .bind(alert.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(id.to_string())
    }

    async fn acknowledge_alert(&self, alert_id: &str) -> Result<bool> {
        let Some(id) = parse_id(alert_id) else {
            return Ok(false);
        };
        let result = sqlx::query("UPDATE alerts SET acknowledged = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn resolve_alert(&self, alert_id: &str) -> Result<bool> {
        let Some(id) = parse_id(alert_id) else {
            return Ok(false);
        };
        let result = sqlx::query("UPDATE alerts SET resolved = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM alerts
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(alert_from_row).collect()
    }

    async fn alerts_today(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE created_at >= $1")
            .bind(start_of_day(Utc::now()))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn create_log(&self, log: NewLog) -> Result<String> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO logs (id, camera_id, action, description, level, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&log.camera_id)
        .bind(&log.action)
        .bind(&log.description)
        .bind(log.level.as_str())
        .bind(log.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(id.to_string())
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(log_from_row).collect()
    }

    async fn upsert_camera(&self, camera: CameraRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cameras (id, name, location, url, kind, status, last_seen)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                location = EXCLUDED.location,
                url = EXCLUDED.url,
                kind = EXCLUDED.kind,
                status = EXCLUDED.status,
                last_seen = EXCLUDED.last_seen,
                updated_at = NOW()
            "#,
        )
        .bind(&camera.id)
        .bind(&camera.name)
        .bind(&camera.location)
        .bind(&camera.url)
        .bind(&camera.kind)
        .bind(camera.status.as_str())
        .bind(camera.last_seen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_all_cameras(&self) -> Result<Vec<CameraRecord>> {
        let rows = sqlx::query("SELECT * FROM cameras ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(camera_from_row).collect()
    }

    async fn get_online_cameras(&self) -> Result<Vec<CameraRecord>> {
        let rows = sqlx::query("SELECT * FROM cameras WHERE status = $1 ORDER BY id")
            .bind(CameraStatus::Online.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(camera_from_row).collect()
    }

    async fn update_camera_status(&self, camera_id: &str, status: CameraStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cameras
            SET status = $2, last_seen = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(camera_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
