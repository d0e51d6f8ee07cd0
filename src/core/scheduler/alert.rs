//! Operator channel for failures nobody will retry
//!
//! Every alert is emitted as an `error` event on the
//! [`ALERT_TARGET`](crate::logging::ALERT_TARGET) tracing target. When a
//! webhook is configured the alert is also POSTed there as JSON. Delivery
//! failures are logged and swallowed.

use crate::config::AlertConfig;
use crate::domain::{OperationId, OperationKind, Result, SyncError, TaskId};
use crate::logging::ALERT_TARGET;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// A terminal task failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub task_id: TaskId,
    pub kind: OperationKind,
    pub attempts: u32,
    pub error: String,
    pub operation_id: Option<OperationId>,
    pub raised_at: DateTime<Utc>,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise(&self, alert: &Alert);
}

fn emit(alert: &Alert) {
    tracing::error!(
        target: ALERT_TARGET,
        task_id = %alert.task_id,
        kind = %alert.kind,
        attempts = alert.attempts,
        operation_id = ?alert.operation_id,
        error = %alert.error,
        "Sync task failed permanently"
    );
}

/// Logs alerts on the alert target only
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn raise(&self, alert: &Alert) {
        emit(alert);
    }
}

/// Logs alerts and POSTs them to a webhook
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to build alert client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn raise(&self, alert: &Alert) {
        emit(alert);
        match self.client.post(&self.url).json(alert).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(task_id = %alert.task_id, "Alert delivered to webhook");
            }
            Ok(response) => {
                tracing::warn!(
                    task_id = %alert.task_id,
                    status = response.status().as_u16(),
                    "Alert webhook rejected the alert"
                );
            }
            Err(e) => {
                tracing::warn!(task_id = %alert.task_id, error = %e, "Alert webhook unreachable");
            }
        }
    }
}

/// Sink for the configured channel
pub fn alert_sink(config: &AlertConfig) -> Result<Arc<dyn AlertSink>> {
    match config.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(WebhookAlertSink::new(
            url,
            Duration::from_secs(config.timeout_seconds),
        )?)),
        _ => Ok(Arc::new(TracingAlertSink)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> Alert {
        Alert {
            task_id: TaskId::new(),
            kind: OperationKind::InventorySync,
            attempts: 3,
            error: "Transport error: request timed out: 30s".to_string(),
            operation_id: None,
            raised_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_webhook_receives_alert() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hooks/sync")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "kind": "inventory_sync",
                "attempts": 3
            })))
            .with_status(204)
            .create_async()
            .await;

        let sink = WebhookAlertSink::new(
            format!("{}/hooks/sync", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        sink.raise(&alert()).await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_swallowed() {
        let sink = WebhookAlertSink::new("http://127.0.0.1:9/hook", Duration::from_millis(200)).unwrap();
        sink.raise(&alert()).await;
    }

    #[test]
    fn test_alert_sink_selection() {
        assert!(alert_sink(&AlertConfig::default()).is_ok());
        let config = AlertConfig {
            webhook_url: Some("https://alerts.example.com/sync".into()),
            ..AlertConfig::default()
        };
        assert!(alert_sink(&config).is_ok());
    }
}
