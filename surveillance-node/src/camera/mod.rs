use image::{codecs::jpeg::JpegEncoder, ImageFormat, RgbImage};
use std::time::Duration;
use tokio::runtime::Handle;

use crate::config::{CameraConfig, SourceKind};
use crate::error::Result;

pub mod discovery;
pub mod mjpeg;
pub mod worker;

pub use mjpeg::{MjpegSource, SnapshotSource};

/// Blocking frame source driven by one camera worker thread.
pub trait VideoSource: Send {
    fn open(&mut self) -> Result<()>;
    fn read(&mut self) -> Result<RgbImage>;
    fn release(&mut self);
    fn describe(&self) -> &str;
}

pub trait SourceFactory: Send + Sync {
    fn create(&self, camera: &CameraConfig) -> Result<Box<dyn VideoSource>>;
}

/// Builds HTTP camera sources. Requests run on the given runtime from the calling thread.
pub struct HttpSourceFactory {
    client: reqwest::Client,
    handle: Handle,
    read_timeout: Duration,
}

impl HttpSourceFactory {
    pub fn new(handle: Handle, read_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(read_timeout)
            .build()?;

        Ok(Self {
            client,
            handle,
            read_timeout,
        })
    }
}

impl SourceFactory for HttpSourceFactory {
    fn create(&self, camera: &CameraConfig) -> Result<Box<dyn VideoSource>> {
        let source: Box<dyn VideoSource> = match camera.kind {
            SourceKind::Mjpeg => Box::new(MjpegSource::new(
                camera.source.clone(),
                self.client.clone(),
                self.handle.clone(),
                self.read_timeout,
            )),
            SourceKind::Snapshot => Box::new(SnapshotSource::new(
                camera.source.clone(),
                self.client.clone(),
                self.handle.clone(),
                self.read_timeout,
            )),
        };
        Ok(source)
    }
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buffer)
}

pub fn decode_jpeg(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
    Ok(image.to_rgb8())
}
