//! HTTP JSON webhook notifier

use std::time::Duration;

use async_trait::async_trait;

use super::{Notifier, NotifyError, PaymentNotification};
use crate::config::NotifierConfig;

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| NotifyError::NotConfigured("notifier.url is empty".to_string()))?;
        Self::new(url, Duration::from_millis(config.timeout_ms))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &PaymentNotification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
