//! Connection management for the single duplex event connection
//!
//! This module handles:
//! - Building the endpoint URL from the configured address and path
//! - Dialing once, without retry
//! - Handing out the independent read and write halves

mod manager;

pub use manager::{Connection, ConnectionConfig, ConnectionManager};
