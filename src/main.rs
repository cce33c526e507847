mod bridge;
mod config;
mod connection;
mod error;
mod notify;
mod transport;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use bridge::{Bridge, Dispatcher, LoopExit};
use clap::Parser;
use config::{BridgeConfig, Cli, EnvVars};
use connection::ConnectionManager;
use notify::GotifyNotifier;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use transport::WsConnector;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvVars::load();
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = BridgeConfig::resolve(&cli, &env).context("Error resolving configuration")?;
    config.log_summary();

    let notifier = GotifyNotifier::new(config.notifier.clone())?;
    let dispatcher = Dispatcher::new(config.classifier, config.notify_policy, Arc::new(notifier));
    let manager = ConnectionManager::new(
        config.connection.clone(),
        WsConnector::new(config.connection.connect_timeout),
    );
    let bridge = Bridge::new(manager, dispatcher, config.event_loop.clone());

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => interrupt.cancel(),
            Err(e) => warn!("Unable to listen for interrupt: {}", e),
        }
    });

    match bridge.run(shutdown).await {
        Ok(LoopExit::Interrupted) => info!("Bridge stopped after interrupt"),
        Ok(exit) => info!("Bridge stopped: {:?}", exit),
        Err(e) => {
            error!("Bridge failed ({:?}): {}", e.severity(), e);
            return Err(e.into());
        }
    }

    Ok(())
}
