use image::RgbImage;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

use super::{decode_jpeg, VideoSource};
use crate::error::{Result, SurveillanceError};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const MAX_BUFFER: usize = 8 * 1024 * 1024;

/// Pulls complete JPEG images out of a multipart byte stream by their start/end markers.
#[derive(Debug, Default)]
pub struct JpegScanner {
    buffer: Vec<u8>,
}

impl JpegScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > MAX_BUFFER {
            // keep only the newest partial image
            match rfind(&self.buffer, &SOI) {
                Some(last) if last > 0 => {
                    self.buffer.drain(..last);
                }
                _ => self.buffer.clear(),
            }
        }
    }

    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let start = match find(&self.buffer, &SOI) {
            Some(start) => start,
            None => {
                // a trailing 0xFF may be the first half of the next marker
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                let cut = self.buffer.len() - keep;
                self.buffer.drain(..cut);
                return None;
            }
        };

        let end = find(&self.buffer[start + 2..], &EOI)? + start + 2;
        let frame = self.buffer[start..end + 2].to_vec();
        self.buffer.drain(..end + 2);
        Some(frame)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).rposition(|w| w == needle)
}

/// HTTP multipart MJPEG stream, e.g. `http://<phone>:8080/video`.
pub struct MjpegSource {
    url: String,
    client: reqwest::Client,
    handle: Handle,
    read_timeout: Duration,
    response: Option<reqwest::Response>,
    scanner: JpegScanner,
}

impl MjpegSource {
    pub fn new(url: String, client: reqwest::Client, handle: Handle, read_timeout: Duration) -> Self {
        Self {
            url,
            client,
            handle,
            read_timeout,
            response: None,
            scanner: JpegScanner::new(),
        }
    }
}

impl VideoSource for MjpegSource {
    fn open(&mut self) -> Result<()> {
        let request = self.client.get(&self.url).send();
        let response = self
            .handle
            .block_on(async { tokio::time::timeout(self.read_timeout, request).await })??
            .error_for_status()?;

        debug!(url = %self.url, "MJPEG stream opened");
        self.response = Some(response);
        self.scanner = JpegScanner::new();
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage> {
        loop {
            if let Some(jpeg) = self.scanner.next_frame() {
                return decode_jpeg(&jpeg);
            }

            let response = self
                .response
                .as_mut()
                .ok_or_else(|| SurveillanceError::CameraError(format!("{} is not open", self.url)))?;
            let timeout = self.read_timeout;
            let chunk = self
                .handle
                .block_on(async { tokio::time::timeout(timeout, response.chunk()).await })??;

            match chunk {
                Some(bytes) => self.scanner.push(&bytes),
                None => {
                    self.response = None;
                    return Err(SurveillanceError::CameraError(format!(
                        "stream {} ended",
                        self.url
                    )));
                }
            }
        }
    }

    fn release(&mut self) {
        self.response = None;
        self.scanner = JpegScanner::new();
    }

    fn describe(&self) -> &str {
        &self.url
    }
}

/// One HTTP GET per frame, e.g. `http://<phone>:8080/shot.jpg`.
pub struct SnapshotSource {
    url: String,
    client: reqwest::Client,
    handle: Handle,
    read_timeout: Duration,
    opened: bool,
}

impl SnapshotSource {
    pub fn new(url: String, client: reqwest::Client, handle: Handle, read_timeout: Duration) -> Self {
        Self {
            url,
            client,
            handle,
            read_timeout,
            opened: false,
        }
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        let request = self.client.get(&self.url).timeout(self.read_timeout).send();
        self.handle.block_on(async {
            let response = request.await?.error_for_status()?;
            Ok::<_, SurveillanceError>(response.bytes().await?.to_vec())
        })
    }
}

impl VideoSource for SnapshotSource {
    fn open(&mut self) -> Result<()> {
        self.fetch()?;
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage> {
        if !self.opened {
            return Err(SurveillanceError::CameraError(format!("{} is not open", self.url)));
        }
        decode_jpeg(&self.fetch()?)
    }

    fn release(&mut self) {
        self.opened = false;
    }

    fn describe(&self) -> &str {
        &self.url
    }
}
