use aieyes_common::{AlertPayload, Severity, ThreatType};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, SurveillanceError};

/// Receives alerts that passed the notification severity floor.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, alert: &AlertPayload) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailTemplate {
    pub subject: &'static str,
    pub priority: Severity,
}

pub fn template_for(alert_type: ThreatType) -> EmailTemplate {
    match alert_type {
        ThreatType::Intruder => EmailTemplate {
            subject: "SECURITY ALERT: Unauthorized Person Detected",
            priority: Severity::High,
        },
        ThreatType::WeaponDetected => EmailTemplate {
            subject: "CRITICAL ALERT: Weapon Detected",
            priority: Severity::Critical,
        },
        ThreatType::ArmedThreat => EmailTemplate {
            subject: "EMERGENCY: Armed Threat Detected",
            priority: Severity::Critical,
        },
        ThreatType::SuspiciousActivity | ThreatType::CrowdFormation | ThreatType::NormalActivity => {
            EmailTemplate {
                subject: "SECURITY ALERT: Suspicious Activity Detected",
                priority: Severity::Medium,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub priority: Severity,
    pub x_priority: u8,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub alert: AlertPayload,
}

pub fn compose(alert: &AlertPayload, recipients: &[String]) -> EmailMessage {
    let template = template_for(alert.alert_type);
    let body = format!(
        "Alert type: {}\nLocation: {}\nCamera: {}\nTime: {}\nSeverity: {}\nConfidence: {:.1}%\n\n{}",
        alert.alert_type,
        alert.location,
        alert.camera_id,
        alert.timestamp.to_rfc3339(),
        alert.severity,
        alert.confidence,
        alert.description
    );

    EmailMessage {
        to: recipients.to_vec(),
        subject: template.subject.to_string(),
        priority: template.priority,
        x_priority: if template.priority == Severity::Critical { 1 } else { 2 },
        body,
        image_path: alert.image_path.clone(),
        alert: alert.clone(),
    }
}

/// Posts composed alert mails as JSON to each relay endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoints: Vec<String>,
    recipients: Vec<String>,
}

impl WebhookNotifier {
    pub fn new(endpoints: Vec<String>, recipients: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoints,
            recipients,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, alert: &AlertPayload) -> Result<()> {
        if self.endpoints.is_empty() {
            debug!("No notification endpoints configured, skipping alert {}", alert.id);
            return Ok(());
        }

        let message = compose(alert, &self.recipients);
        let sends = self.endpoints.iter().map(|endpoint| {
            let request = self.client.post(endpoint).json(&message);
            async move {
                let sent = request
                    .send()
                    .await
                    .and_then(|response| response.error_for_status());
                if let Err(e) = &sent {
                    warn!("Notification to {} failed: {}", endpoint, e);
                }
                sent.is_ok()
            }
        });
        let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();

        if delivered == 0 {
            return Err(SurveillanceError::NotificationError(format!(
                "alert {} not delivered to any of {} endpoints",
                alert.id,
                self.endpoints.len()
            )));
        }
        Ok(())
    }
}
