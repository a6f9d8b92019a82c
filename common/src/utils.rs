use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

pub fn validate_url(url: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("rtsp://") {
        Ok(())
    } else {
        Err("URL must start with http://, https://, or rtsp://".to_string())
    }
}

/// Last dotted segment of a URL host, used to name discovered cameras.
pub fn host_suffix(url: &str) -> Option<&str> {
    let rest = url.split("://").nth(1)?;
    let host = rest.split(['/', ':']).next()?;
    host.rsplit('.').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m 0s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m");
    }

    #[test]
    fn validates_camera_urls() {
        assert!(validate_url("http://192.168.1.10:8080/video").is_ok());
        assert!(validate_url("rtsp://cam").is_ok());
        assert!(validate_url("/dev/video0").is_err());
    }

    #[test]
    fn extracts_host_suffix() {
        assert_eq!(host_suffix("http://192.168.1.9:8080"), Some("9"));
        assert_eq!(host_suffix("http://10.0.0.42/video"), Some("42"));
        assert_eq!(host_suffix("not a url"), None);
    }
}
