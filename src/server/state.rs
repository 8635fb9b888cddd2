//! Server state and configuration.

use crate::bridge::Bridge;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    pub listen_addr: String,
}

/// Application state shared across handlers.
pub struct AppState {
    pub bridge: Bridge,
}

impl AppState {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }
}
