use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurveillanceError {
    #[error("Camera error: {0}")]
    CameraError(String),

    #[error("Camera unreachable: {0}")]
    CameraUnreachable(String),

    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for SurveillanceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            SurveillanceError::Timeout(error.to_string())
        } else {
            SurveillanceError::NetworkError(error.to_string())
        }
    }
}

impl From<image::ImageError> for SurveillanceError {
    fn from(error: image::ImageError) -> Self {
        SurveillanceError::ImageError(error.to_string())
    }
}

impl From<sqlx::Error> for SurveillanceError {
    fn from(error: sqlx::Error) -> Self {
        SurveillanceError::StorageError(error.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SurveillanceError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        SurveillanceError::StorageError(error.to_string())
    }
}

impl From<serde_json::Error> for SurveillanceError {
    fn from(error: serde_json::Error) -> Self {
        SurveillanceError::SerializationError(error.to_string())
    }
}

impl From<serde_yaml::Error> for SurveillanceError {
    fn from(error: serde_yaml::Error) -> Self {
        SurveillanceError::SerializationError(error.to_string())
    }
}

impl From<config::ConfigError> for SurveillanceError {
    fn from(error: config::ConfigError) -> Self {
        SurveillanceError::ConfigError(error.to_string())
    }
}

impl From<validator::ValidationErrors> for SurveillanceError {
    fn from(error: validator::ValidationErrors) -> Self {
        SurveillanceError::ConfigError(error.to_string())
    }
}

impl From<prometheus::Error> for SurveillanceError {
    fn from(error: prometheus::Error) -> Self {
        SurveillanceError::MetricsError(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for SurveillanceError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        SurveillanceError::Timeout(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SurveillanceError>;
