//! Payload dispatcher - classifies inbound payloads and raises alerts

use crate::error::BridgeError;
use crate::notify::Notifier;
use bridge_shared::{classify, Classification, ClassifierMode};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// What to do when an alert cannot be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPolicy {
    /// Log the failure and keep bridging events
    #[default]
    LogAndContinue,
    /// Stop the bridge with a fatal error
    FailFast,
}

/// Classifies payloads and forwards matching ones to the notifier
pub struct Dispatcher {
    mode: ClassifierMode,
    policy: NotifyPolicy,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(mode: ClassifierMode, policy: NotifyPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            mode,
            policy,
            notifier,
        }
    }

    /// Handle one inbound payload.
    ///
    /// Only returns an error for a notification failure under
    /// [`NotifyPolicy::FailFast`]; the error is then fatal.
    pub async fn handle_payload(&self, payload: &str) -> Result<Classification, BridgeError> {
        let classification = classify(payload, self.mode);
        let alert = match classification.alert() {
            Some(alert) => alert,
            None => {
                trace!("recv: {}", payload);
                return Ok(classification);
            }
        };

        match classification {
            Classification::DoorOpen => info!("Door open detected"),
            Classification::Vibration => info!("Vibration detected"),
            Classification::None => {}
        }

        match self.notifier.notify(&alert).await {
            Ok(receipt) => {
                debug!("Notifier answered status={}", receipt.status);
            }
            Err(e) => match self.policy {
                NotifyPolicy::LogAndContinue => {
                    warn!("{}; continuing", e);
                }
                NotifyPolicy::FailFast => {
                    error!("{}; stopping bridge", e);
                    return Err(e.escalate());
                }
            },
        }

        Ok(classification)
    }
}
