//! Transport trait abstraction for the duplex event connection

use crate::error::BridgeError;
use async_trait::async_trait;

/// Write half of a duplex connection
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Send a text payload
    async fn send_text(&mut self, text: String) -> Result<(), BridgeError>;

    /// Send a normal-closure close message
    async fn send_close(&mut self) -> Result<(), BridgeError>;

    /// Release the write half. Safe to call more than once.
    async fn close(&mut self);
}

/// Read half of a duplex connection
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Wait for the next inbound payload.
    ///
    /// Returns `BridgeError::Read` once the connection is closed or broken.
    async fn recv_text(&mut self) -> Result<String, BridgeError>;
}

/// Factory for creating duplex connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    type Sink: FrameSink;
    type Source: FrameSource;

    /// Dial the endpoint, returning the split connection on success
    async fn connect(&self, url: &str) -> Result<(Self::Sink, Self::Source), BridgeError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
