use aieyes_common::BBox;
use image::RgbImage;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::runtime::Handle;

use super::strategies::{DistanceModel, EmbeddingClassifier};
use super::FaceDetector;
use crate::camera::encode_jpeg;
use crate::config::FaceConfig;
use crate::error::{Result, SurveillanceError};

#[derive(Debug, Deserialize)]
struct LocatedFaces {
    faces: Vec<[f32; 4]>,
}

#[derive(Debug, Deserialize)]
struct DistancePrediction {
    label: String,
    distance: f32,
}

#[derive(Debug, Deserialize)]
struct ClassLogits {
    labels: Vec<String>,
    logits: Vec<f32>,
}

/// Face service exposing `/faces/detect`, `/faces/predict` and `/faces/classify`.
pub struct RemoteFaceService {
    base_url: String,
    client: reqwest::Client,
    handle: Handle,
}

impl RemoteFaceService {
    pub fn new(config: &FaceConfig, handle: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            client,
            handle,
        })
    }

    fn post<T: DeserializeOwned>(&self, path: &str, image: &RgbImage) -> Result<T> {
        let body = encode_jpeg(image, 90)?;
        let request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send();

        self.handle.block_on(async {
            let response = request.await?.error_for_status()?;
            Ok::<_, SurveillanceError>(response.json::<T>().await?)
        })
    }
}

impl FaceDetector for RemoteFaceService {
    fn locate(&self, frame: &RgbImage) -> Result<Vec<BBox>> {
        let located: LocatedFaces = self.post("/faces/detect", frame)?;
        Ok(located
            .faces
            .into_iter()
            .map(|[x1, y1, x2, y2]| BBox::new(x1, y1, x2, y2))
            .collect())
    }
}

impl DistanceModel for RemoteFaceService {
    fn predict(&self, face: &RgbImage) -> Result<(String, f32)> {
        let prediction: DistancePrediction = self.post("/faces/predict", face)?;
        Ok((prediction.label, prediction.distance))
    }
}

impl EmbeddingClassifier for RemoteFaceService {
    fn logits(&self, face: &RgbImage) -> Result<Vec<(String, f32)>> {
        let reply: ClassLogits = self.post("/faces/classify", face)?;
        if reply.labels.len() != reply.logits.len() {
            return Err(SurveillanceError::InferenceError(format!(
                "{} labels for {} logits",
                reply.labels.len(),
                reply.logits.len()
            )));
        }
        Ok(reply.labels.into_iter().zip(reply.logits).collect())
    }
}
