use aieyes_common::utils::host_suffix;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::SourceFactory;
use crate::config::{CameraConfig, CameraOrigin, DiscoveryConfig, SourceKind};

pub trait CameraProbe: Send + Sync {
    fn reachable(&self, base_url: &str) -> bool;
}

/// Answers whether a base URL responds 2xx within the probe timeout.
pub struct HttpProbe {
    client: reqwest::Client,
    handle: Handle,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(handle: Handle, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            handle,
            timeout,
        }
    }
}

impl CameraProbe for HttpProbe {
    fn reachable(&self, base_url: &str) -> bool {
        let request = self.client.get(base_url).timeout(self.timeout).send();
        match self.handle.block_on(request) {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Probe of {} failed: {}", base_url, e);
                false
            }
        }
    }
}

pub struct CameraDiscovery {
    config: DiscoveryConfig,
    probe: Arc<dyn CameraProbe>,
    factory: Arc<dyn SourceFactory>,
}

impl CameraDiscovery {
    pub fn new(config: DiscoveryConfig, probe: Arc<dyn CameraProbe>, factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            config,
            probe,
            factory,
        }
    }

    /// Candidates that answer the probe and deliver one decodable frame.
    pub fn discover(&self) -> Vec<CameraConfig> {
        let mut found = Vec::new();

        for base in &self.config.candidates {
            if !self.probe.reachable(base) {
                continue;
            }

            let index = found.len() + 1;
            let suffix = host_suffix(base).unwrap_or("x");
            let camera = CameraConfig {
                id: format!("camera_{}_{}", index, suffix),
                name: format!("Camera {} ({})", index, suffix),
                location: base.clone(),
                source: format!("{}{}", base.trim_end_matches('/'), self.config.video_path),
                kind: SourceKind::Mjpeg,
                origin: CameraOrigin::AutoDetected,
                enabled: true,
            };

            if self.test_read(&camera) {
                info!("Discovered camera {} at {}", camera.id, camera.source);
                found.push(camera);
            }
        }

        found
    }

    fn test_read(&self, camera: &CameraConfig) -> bool {
        let mut source = match self.factory.create(camera) {
            Ok(source) => source,
            Err(e) => {
                warn!("Cannot build source for {}: {}", camera.source, e);
                return false;
            }
        };

        let ok = match source.open().and_then(|_| source.read()) {
            Ok(_) => true,
            Err(e) => {
                debug!("Test read from {} failed: {}", camera.source, e);
                false
            }
        };
        source.release();
        ok
    }
}

/// Discovered cameras win; otherwise the enabled manual entries are used.
pub fn resolve_cameras(manual: &[CameraConfig], discovered: Vec<CameraConfig>) -> Vec<CameraConfig> {
    if discovered.is_empty() {
        manual.iter().filter(|c| c.enabled).cloned().collect()
    } else {
        discovered
    }
}
