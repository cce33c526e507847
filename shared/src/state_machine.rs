//! Bridge State Machine
//!
//! Tracks the connection lifecycle: `Connecting -> Running -> Closing -> Closed`.

/// Lifecycle state of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Connecting,
    Running,
    Closing,
    Closed,
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// Dial succeeded
    Connected,
    /// Dial failed
    ConnectFailed,
    /// Inbound read failed or the peer closed the connection
    ReadFailed,
    /// Keepalive write failed
    WriteFailed,
    /// External interrupt received
    Interrupted,
    /// Connection released
    Released,
}

/// How the connection should be torn down when entering `Closing`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Send a close message and wait (bounded) for the peer
    Handshake,
    /// Drop the connection without a handshake
    Immediate,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(BridgeState),
    /// Entered `Closing`; the connection must be closed as described
    Closing(CloseMode),
    /// Transition was invalid from current state
    Invalid { from: BridgeState, event: LoopEvent },
}

/// The lifecycle state machine for a single bridge run
#[derive(Debug)]
pub struct BridgeStateMachine {
    current_state: BridgeState,
}

impl Default for BridgeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeStateMachine {
    /// Create a new state machine in Connecting state
    pub fn new() -> Self {
        Self {
            current_state: BridgeState::Connecting,
        }
    }

    /// Get current state
    pub fn state(&self) -> BridgeState {
        self.current_state
    }

    /// Whether the run has finished
    pub fn is_closed(&self) -> bool {
        self.current_state == BridgeState::Closed
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LoopEvent) -> TransitionResult {
        use BridgeState::*;
        use LoopEvent::*;

        let (next, result) = match (self.current_state, event) {
            (Connecting, Connected) => (Running, TransitionResult::Success(Running)),
            // Dial failure skips Closing: there is nothing to release
            (Connecting, ConnectFailed) => (Closed, TransitionResult::Success(Closed)),

            (Running, Interrupted) => (Closing, TransitionResult::Closing(CloseMode::Handshake)),
            (Running, ReadFailed | WriteFailed) => {
                (Closing, TransitionResult::Closing(CloseMode::Immediate))
            }

            (Closing, Released) => (Closed, TransitionResult::Success(Closed)),

            (from, event) => return TransitionResult::Invalid { from, event },
        };

        self.current_state = next;
        result
    }
}
