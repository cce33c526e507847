//! Startup configuration
//!
//! Values come from the environment (optionally seeded from a `.env` file)
//! and command-line flags, and are resolved once into an immutable
//! [`BridgeConfig`].

use crate::bridge::{LoopConfig, NotifyPolicy};
use crate::connection::ConnectionConfig;
use crate::notify::{NotifierConfig, DEFAULT_GOTIFY_URL};
use anyhow::{bail, ensure, Context, Result};
use bridge_shared::{timing, ClassifierMode};
use clap::Parser;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Forwards door and vibration sensor events to Gotify", long_about = None)]
pub struct Cli {
    /// Event source address as host:port (default: $IP_ADDRESS:$PORT)
    #[arg(long)]
    pub addr: Option<String>,

    /// Request path on the event source
    #[arg(long, default_value = "/echo")]
    pub path: String,

    /// Gotify server root (default: $GOTIFY_URL or the built-in server)
    #[arg(long)]
    pub gotify_url: Option<String>,

    /// Payload classifier: substring or typed
    #[arg(long, default_value_t = ClassifierMode::Substring)]
    pub classifier: ClassifierMode,

    /// Stop the bridge when a notification cannot be delivered
    #[arg(long)]
    pub fail_fast_notify: bool,

    /// Keepalive interval in milliseconds
    #[arg(long, default_value_t = timing::KEEPALIVE_INTERVAL_MS)]
    pub keepalive_ms: u64,

    /// Wait for the peer after sending a close message, in milliseconds
    #[arg(long, default_value_t = timing::CLOSE_GRACE_MS)]
    pub close_grace_ms: u64,

    /// WebSocket handshake timeout in seconds
    #[arg(long, default_value_t = timing::CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
}

/// Raw environment inputs
#[derive(Default)]
pub struct EnvVars {
    pub ip_address: Option<String>,
    pub port: Option<String>,
    pub gotify_api_key: String,
    pub gotify_url: Option<String>,
}

impl EnvVars {
    /// Read the process environment, after loading `.env` if present
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            ip_address: non_empty("IP_ADDRESS"),
            port: non_empty("PORT"),
            gotify_api_key: lookup("GOTIFY_API_KEY").unwrap_or_default(),
            gotify_url: non_empty("GOTIFY_URL"),
        }
    }
}

/// Everything the bridge needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub connection: ConnectionConfig,
    pub notifier: NotifierConfig,
    pub event_loop: LoopConfig,
    pub classifier: ClassifierMode,
    pub notify_policy: NotifyPolicy,
}

impl BridgeConfig {
    /// Combine flags and environment; flags win
    pub fn resolve(cli: &Cli, env: &EnvVars) -> Result<Self> {
        let address = match (&cli.addr, &env.ip_address, &env.port) {
            (Some(addr), _, _) => addr.clone(),
            (None, Some(ip), Some(port)) => format!("{}:{}", ip, port),
            (None, _, _) => bail!("No event source address: pass --addr or set IP_ADDRESS and PORT"),
        };
        validate_address(&address).with_context(|| format!("Invalid address '{}'", address))?;

        ensure!(cli.keepalive_ms > 0, "keepalive interval must be greater than zero");
        ensure!(cli.connect_timeout_secs > 0, "connect timeout must be greater than zero");

        let base_url = cli
            .gotify_url
            .clone()
            .or_else(|| env.gotify_url.clone())
            .unwrap_or_else(|| DEFAULT_GOTIFY_URL.to_string());

        let notify_policy = if cli.fail_fast_notify {
            NotifyPolicy::FailFast
        } else {
            NotifyPolicy::LogAndContinue
        };

        Ok(Self {
            connection: ConnectionConfig {
                address,
                path: cli.path.clone(),
                connect_timeout: Duration::from_secs(cli.connect_timeout_secs),
            },
            notifier: NotifierConfig {
                base_url,
                token: env.gotify_api_key.clone(),
                ..Default::default()
            },
            event_loop: LoopConfig {
                keepalive_interval: Duration::from_millis(cli.keepalive_ms),
                close_grace: Duration::from_millis(cli.close_grace_ms),
            },
            classifier: cli.classifier,
            notify_policy,
        })
    }

    /// Log the effective settings. The API token is never printed.
    pub fn log_summary(&self) {
        info!("--- Bridge configuration ---");
        info!("Event source: {}", self.connection.endpoint_url());
        info!("Notifier: {}", self.notifier.message_url());
        info!("Classifier: {}", self.classifier);
        info!("Notify policy: {:?}", self.notify_policy);
        if self.notifier.token.is_empty() {
            warn!("GOTIFY_API_KEY is not set; notifications will likely be rejected");
        }
    }
}

fn validate_address(address: &str) -> Result<()> {
    let (host, port) = address
        .rsplit_once(':')
        .context("expected host:port")?;
    ensure!(!host.is_empty(), "host is empty");
    port.parse::<u16>()
        .with_context(|| format!("port '{}' is not a number", port))?;
    Ok(())
}
