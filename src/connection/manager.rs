//! Connection manager for the event source

use crate::error::BridgeError;
use crate::transport::TransportConnector;
use bridge_shared::timing;
use std::time::Duration;
use tracing::{error, info};

/// Configuration for the event source connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// `host:port` of the event source
    pub address: String,
    /// Request path on the event source
    pub path: String,
    /// Handshake timeout
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".into(),
            path: "/echo".into(),
            connect_timeout: Duration::from_secs(timing::CONNECT_TIMEOUT_SECS),
        }
    }
}

impl ConnectionConfig {
    /// Full URI of the event source, e.g. `ws://10.0.0.2:443/echo`
    pub fn endpoint_url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("ws://{}{}", self.address, path)
    }
}

/// An established connection, not yet split between tasks
pub struct Connection<S, R> {
    url: String,
    sink: S,
    source: R,
}

impl<S, R> Connection<S, R> {
    /// URI the connection was dialed with
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Split into the write half (keepalive owner) and the read half
    pub fn into_split(self) -> (S, R) {
        (self.sink, self.source)
    }
}

/// Dials the event source through a pluggable transport
pub struct ConnectionManager<C> {
    config: ConnectionConfig,
    connector: C,
}

impl<C: TransportConnector> ConnectionManager<C> {
    pub fn new(config: ConnectionConfig, connector: C) -> Self {
        Self { config, connector }
    }

    /// Dial the event source once. Failure is returned as `BridgeError::Connection`.
    pub async fn connect(&self) -> Result<Connection<C::Sink, C::Source>, BridgeError> {
        let url = self.config.endpoint_url();
        info!("Connecting to {} via {}", url, self.connector.name());

        match self.connector.connect(&url).await {
            Ok((sink, source)) => {
                info!("Connected to {}", url);
                Ok(Connection { url, sink, source })
            }
            Err(e) => {
                error!("Dial failed: {}", e);
                Err(e)
            }
        }
    }
}
