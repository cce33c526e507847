//! Payload classifier
//!
//! The default mode matches literal substrings against the raw payload text,
//! so `"open" : true` (with spaces) does not match. The typed mode decodes
//! the payload into a [`SensorEvent`] and inspects its fields instead.

use crate::event::SensorEvent;
use std::fmt;
use std::str::FromStr;

const DOOR_OPEN_MARKER: &str = "\"open\":true";
const VIBRATION_MARKER: &str = "\"vibration\":true";

/// What an inbound payload represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    DoorOpen,
    Vibration,
    None,
}

/// How payloads are classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierMode {
    /// Literal substring match on the raw text
    #[default]
    Substring,
    /// Decode as JSON and branch on typed fields
    Typed,
}

impl fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierMode::Substring => write!(f, "substring"),
            ClassifierMode::Typed => write!(f, "typed"),
        }
    }
}

impl FromStr for ClassifierMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "substring" => Ok(ClassifierMode::Substring),
            "typed" | "json" => Ok(ClassifierMode::Typed),
            other => Err(format!("unknown classifier mode: {}", other)),
        }
    }
}

/// Classify a payload with the given mode
pub fn classify(payload: &str, mode: ClassifierMode) -> Classification {
    match mode {
        ClassifierMode::Substring => classify_substring(payload),
        ClassifierMode::Typed => classify_typed(payload),
    }
}

/// Door open is checked first; if both markers are present it wins.
pub fn classify_substring(payload: &str) -> Classification {
    if payload.contains(DOOR_OPEN_MARKER) {
        Classification::DoorOpen
    } else if payload.contains(VIBRATION_MARKER) {
        Classification::Vibration
    } else {
        Classification::None
    }
}

/// Payloads that fail to decode classify as `None`.
pub fn classify_typed(payload: &str) -> Classification {
    match SensorEvent::parse(payload) {
        Ok(event) if event.is_open() => Classification::DoorOpen,
        Ok(event) if event.has_vibration() => Classification::Vibration,
        _ => Classification::None,
    }
}
