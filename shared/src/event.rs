//! Sensor event model
//!
//! Inbound payloads loosely follow the gateway's change notification shape:
//! ```text
//! {"e":"changed","r":"sensors","id":"7","state":{"lastupdated":"...","open":true}}
//! ```
//! Every field is optional; vibration sensors may report the flag either
//! inside `state` or at the top level.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while decoding a payload
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Payload is empty")]
    Empty,
}

/// A notification-worthy occurrence reported by the event source
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SensorEvent {
    /// Event name
    #[serde(rename = "e", alias = "event", default)]
    pub event: Option<String>,
    /// Resource identifier
    #[serde(rename = "r", default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub state: Option<State>,
    #[serde(default)]
    pub vibration: Option<bool>,
}

/// Binary sensor state
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct State {
    #[serde(default)]
    pub lastupdated: Option<String>,
    #[serde(default)]
    pub open: Option<bool>,
    #[serde(default)]
    pub vibration: Option<bool>,
}

impl SensorEvent {
    /// Decode a raw payload
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        if payload.trim().is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(serde_json::from_str(payload)?)
    }

    /// True when the state reports the contact as open
    pub fn is_open(&self) -> bool {
        self.state.as_ref().and_then(|s| s.open).unwrap_or(false)
    }

    /// True when vibration is reported in the state or at the top level
    pub fn has_vibration(&self) -> bool {
        let in_state = self.state.as_ref().and_then(|s| s.vibration).unwrap_or(false);
        in_state || self.vibration.unwrap_or(false)
    }
}
