//! Gotify notifier

use super::{NotifyReceipt, Notifier};
use crate::error::BridgeError;
use async_trait::async_trait;
use bridge_shared::Alert;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Default Gotify server
pub const DEFAULT_GOTIFY_URL: &str = "https://gotify.azaurus.dev";

/// Configuration for the Gotify endpoint
#[derive(Clone)]
pub struct NotifierConfig {
    /// Server root, e.g. `https://gotify.example.org`
    pub base_url: String,
    /// Application token, sent as the `token` query parameter
    pub token: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GOTIFY_URL.into(),
            token: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

// Keeps the token out of debug output
impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NotifierConfig {
    /// Message endpoint without the token
    pub fn message_url(&self) -> String {
        format!("{}/message", self.base_url.trim_end_matches('/'))
    }
}

/// Posts alerts to `POST <base>/message?token=<token>`
pub struct GotifyNotifier {
    config: NotifierConfig,
    client: Client,
}

impl GotifyNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Notifier for GotifyNotifier {
    async fn notify(&self, alert: &Alert) -> Result<NotifyReceipt, BridgeError> {
        let url = self.config.message_url();
        let response = self
            .client
            .post(&url)
            .query(&[("token", self.config.token.as_str())])
            .form(&alert.form_fields())
            .send()
            .await
            .map_err(|e| BridgeError::Notify {
                reason: e.without_url().to_string(),
                fatal: false,
            })?;

        let receipt = NotifyReceipt {
            status: response.status().as_u16(),
        };
        if receipt.is_success() {
            info!("Notification '{}' delivered: status={}", alert.title, receipt.status);
        } else {
            warn!(
                "Notification '{}' rejected by {}: status={}",
                alert.title, url, receipt.status
            );
        }
        Ok(receipt)
    }
}
