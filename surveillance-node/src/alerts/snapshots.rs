use chrono::{DateTime, Utc};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::camera::encode_jpeg;
use crate::error::{Result, SurveillanceError};

const SNAPSHOT_QUALITY: u8 = 90;

/// Alert snapshots on local disk, one JPEG per alert.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub async fn save_file(&self, content: &[u8], filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_path).await?;

        let file_path = self.base_path.join(filename);
        fs::write(&file_path, content).await?;

        Ok(file_path)
    }

    pub async fn save_frame(&self, camera_id: &str, frame: RgbImage, taken_at: DateTime<Utc>) -> Result<PathBuf> {
        let bytes = tokio::task::spawn_blocking(move || encode_jpeg(&frame, SNAPSHOT_QUALITY))
            .await
            .map_err(|e| SurveillanceError::ProcessingError(e.to_string()))??;
        self.save_file(&bytes, &snapshot_filename(camera_id, taken_at)).await
    }

    pub async fn read_file(&self, filename: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.base_path.join(filename)).await?)
    }

    pub async fn list_files(&self) -> Result<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut filenames = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if let Ok(file_type) = entry.file_type().await {
                if file_type.is_file() {
                    if let Some(filename) = entry.file_name().to_str() {
                        filenames.push(filename.to_string());
                    }
                }
            }
        }

        filenames.sort();
        Ok(filenames)
    }
}

pub fn snapshot_filename(camera_id: &str, taken_at: DateTime<Utc>) -> String {
    let safe: String = camera_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_{}.jpg", safe, taken_at.format("%Y%m%d_%H%M%S_%3f"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgb;

    #[test]
    fn filename_is_path_safe() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 5).unwrap();
        assert_eq!(snapshot_filename("cam/1 lobby", at), "cam_1_lobby_20240601_123005_000.jpg");
    }

    #[tokio::test]
    async fn saves_and_lists_frames() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("alert_images"));
        assert!(store.list_files().await.unwrap().is_empty());

        let frame = RgbImage::from_pixel(32, 24, Rgb([10, 200, 30]));
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 5).unwrap();
        let path = store.save_frame("cam1", frame, at).await.unwrap();
        assert!(path.exists());

        let files = store.list_files().await.unwrap();
        assert_eq!(files, vec!["cam1_20240601_123005_000.jpg".to_string()]);

        let bytes = store.read_file(&files[0]).await.unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
