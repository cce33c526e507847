//! Sensor Bridge Shared Types
//!
//! This crate provides the event model, payload classifier and connection
//! state machine shared by the bridge binary and the development echo server.

pub mod classifier;
pub mod event;
pub mod state_machine;

pub use classifier::{classify, classify_substring, classify_typed, Classification, ClassifierMode};
pub use event::{PayloadError, SensorEvent, State};

/// Timing parameters for the bridge event loop
pub mod timing {
    /// Keepalive interval in milliseconds
    pub const KEEPALIVE_INTERVAL_MS: u64 = 1000;

    /// How long to wait for the peer after sending a close message
    pub const CLOSE_GRACE_MS: u64 = 1000;

    /// WebSocket handshake timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 45;
}

/// Priority attached to every alert sent by the bridge
pub const ALERT_PRIORITY: u8 = 5;

/// A notification ready to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: &'static str,
    pub message: &'static str,
    pub priority: u8,
}

impl Alert {
    /// Alert raised when the front door reports open
    pub const DOOR_OPENED: Alert = Alert {
        title: "Door opened",
        message: "The front door is open",
        priority: ALERT_PRIORITY,
    };

    /// Alert raised when the vibration sensor trips
    pub const VIBRATION: Alert = Alert {
        title: "Vibration detected- websocket",
        message: "There is vibration at the front door",
        priority: ALERT_PRIORITY,
    };

    /// Form fields in the order the notification endpoint expects them
    pub fn form_fields(&self) -> [(&'static str, String); 3] {
        [
            ("title", self.title.to_string()),
            ("message", self.message.to_string()),
            ("priority", self.priority.to_string()),
        ]
    }
}

impl Classification {
    /// The alert to send for this classification, if any
    pub fn alert(&self) -> Option<Alert> {
        match self {
            Classification::DoorOpen => Some(Alert::DOOR_OPENED),
            Classification::Vibration => Some(Alert::VIBRATION),
            Classification::None => None,
        }
    }
}
