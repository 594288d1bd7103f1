//! Outbound notifications.
//!
//! Delivery is best effort: callers log a failed publish and carry on.

use async_trait::async_trait;
use serde_json::json;

/// Errors that can occur while publishing a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Notification endpoint rejected the message with status {0}")]
    Rejected(reqwest::StatusCode),
}

/// Publish-only message sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no delivery endpoint is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(subject, body, "Notification");
        Ok(())
    }
}

/// POSTs each notification as `{"subject": ..., "body": ...}` to a webhook.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[tracing::instrument(skip(self, body))]
    async fn publish(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "subject": subject, "body": body }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    /// Serves `/ok` (200) and `/fail` (500) on an ephemeral port.
    async fn webhook_endpoint() -> String {
        let app = axum::Router::new()
            .route("/ok", axum::routing::post(|| async { StatusCode::OK }))
            .route(
                "/fail",
                axum::routing::post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{}", address)
    }

    #[tokio::test]
    async fn can_publish_to_log() {
        assert!(LogNotifier.publish("Subject", "Body").await.is_ok());
    }

    #[tokio::test]
    async fn can_publish_to_webhook() {
        let base = webhook_endpoint().await;
        let notifier = WebhookNotifier::new(format!("{}/ok", base));

        assert!(notifier.publish("Subject", "Body").await.is_ok());
    }

    #[tokio::test]
    async fn can_report_rejected_webhook() {
        let base = webhook_endpoint().await;
        let notifier = WebhookNotifier::new(format!("{}/fail", base));

        let result = notifier.publish("Subject", "Body").await;

        assert!(matches!(
            result,
            Err(NotifyError::Rejected(status)) if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }
}
