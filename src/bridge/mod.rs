//! Event bridge
//!
//! This module handles:
//! - Dialing the event source once
//! - Dispatching inbound payloads to the notifier
//! - Keepalive writes and coordinated shutdown

mod dispatch;
pub mod event_loop;

pub use dispatch::{Dispatcher, NotifyPolicy};

use crate::connection::ConnectionManager;
use crate::error::BridgeError;
use crate::transport::TransportConnector;
use bridge_shared::state_machine::{BridgeStateMachine, LoopEvent};
use bridge_shared::timing;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Timing of the event loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Interval between keepalive writes
    pub keepalive_interval: Duration,
    /// How long to wait for the peer after sending a close message
    pub close_grace: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_millis(timing::KEEPALIVE_INTERVAL_MS),
            close_grace: Duration::from_millis(timing::CLOSE_GRACE_MS),
        }
    }
}

/// Why the event loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// External interrupt
    Interrupted,
    /// The connection stopped delivering payloads
    ReadFailed,
    /// A keepalive could not be written
    WriteFailed,
}

/// Connects to the event source and runs the event loop over it
pub struct Bridge<C> {
    manager: ConnectionManager<C>,
    dispatcher: Arc<Dispatcher>,
    config: LoopConfig,
}

impl<C: TransportConnector> Bridge<C> {
    pub fn new(manager: ConnectionManager<C>, dispatcher: Dispatcher, config: LoopConfig) -> Self {
        Self {
            manager,
            dispatcher: Arc::new(dispatcher),
            config,
        }
    }

    /// Run one connection from dial to release.
    ///
    /// A dial failure is returned as a fatal `BridgeError::Connection`.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<LoopExit, BridgeError> {
        let mut fsm = BridgeStateMachine::new();

        let conn = match self.manager.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                event_loop::transition(&mut fsm, LoopEvent::ConnectFailed);
                return Err(e);
            }
        };
        event_loop::transition(&mut fsm, LoopEvent::Connected);

        debug!("Running event loop on {}", conn.url());
        let (sink, source) = conn.into_split();
        event_loop::run(
            &mut fsm,
            sink,
            source,
            self.dispatcher.clone(),
            &self.config,
            shutdown,
        )
        .await
    }
}
