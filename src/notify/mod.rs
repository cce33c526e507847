//! Notification delivery
//!
//! Alerts are delivered through the [`Notifier`] seam. The production
//! implementation posts form-encoded messages to a Gotify server.

mod gotify;

pub use gotify::{GotifyNotifier, NotifierConfig, DEFAULT_GOTIFY_URL};

use crate::error::BridgeError;
use async_trait::async_trait;
use bridge_shared::Alert;

/// What the notification endpoint answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyReceipt {
    /// HTTP status code
    pub status: u16,
}

impl NotifyReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Delivers alerts to an external endpoint
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert.
    ///
    /// Transport failures are returned as a recoverable `BridgeError::Notify`;
    /// the caller decides whether to escalate.
    async fn notify(&self, alert: &Alert) -> Result<NotifyReceipt, BridgeError>;
}
