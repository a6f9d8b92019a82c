use aieyes_common::{BBox, Detection};
use image::RgbImage;
use serde::Deserialize;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::{sanitize, DetectionProvider};
use crate::camera::encode_jpeg;
use crate::config::DetectorConfig;
use crate::error::{Result, SurveillanceError};

const UPLOAD_QUALITY: u8 = 85;

#[derive(Debug, Deserialize)]
struct WireDetection {
    #[serde(alias = "class")]
    class_name: String,
    confidence: f32,
    bbox: [f32; 4],
    #[serde(default)]
    class_id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Wrapped { detections: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

/// Detector served over HTTP: the frame is POSTed as JPEG and a JSON list comes back.
pub struct HttpDetectionProvider {
    endpoint: String,
    client: reqwest::Client,
    handle: Handle,
    confidence_threshold: f32,
}

impl HttpDetectionProvider {
    pub fn new(config: &DetectorConfig, handle: Handle) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
            handle,
            confidence_threshold: config.confidence_threshold,
        })
    }
}

impl DetectionProvider for HttpDetectionProvider {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let body = encode_jpeg(frame, UPLOAD_QUALITY)?;
        let request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send();

        let text = self.handle.block_on(async {
            let response = request.await?.error_for_status()?;
            Ok::<_, SurveillanceError>(response.text().await?)
        })?;

        let detections = parse_detections(&text)?;
        debug!("Detector returned {} detections", detections.len());
        Ok(sanitize(detections, self.confidence_threshold))
    }
}

/// Parses a detector reply, skipping entries that do not match the wire shape.
pub fn parse_detections(body: &str) -> Result<Vec<Detection>> {
    let values = match serde_json::from_str::<WireResponse>(body) {
        Ok(WireResponse::Wrapped { detections }) => detections,
        Ok(WireResponse::Bare(values)) => values,
        Err(e) => {
            return Err(SurveillanceError::InferenceError(format!(
                "malformed detector response: {}",
                e
            )))
        }
    };

    let mut detections = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<WireDetection>(value) {
            Ok(wire) => {
                let [x1, y1, x2, y2] = wire.bbox;
                detections.push(Detection::new(
                    wire.class_name,
                    wire.confidence,
                    BBox::new(x1, y1, x2, y2),
                    wire.class_id,
                ));
            }
            Err(e) => warn!("Skipping malformed detection: {}", e),
        }
    }
    Ok(detections)
}
