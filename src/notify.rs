use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::notification::Notification;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification has no transport address")]
    MissingAddress,

    #[error("transport request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected message with status {0}")]
    Rejected(u16),
}

/// Outbound transport for notifications that leave the process.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    message: &'a str,
    reference: String,
}

/// Posts SMS messages as JSON to an HTTP gateway.
pub struct SmsGateway {
    client: reqwest::Client,
    url: String,
}

impl SmsGateway {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for SmsGateway {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let to = notification
            .address
            .as_deref()
            .ok_or(NotifyError::MissingAddress)?;

        let payload = SmsPayload {
            to,
            message: &notification.message,
            reference: notification.id.to_string(),
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}
