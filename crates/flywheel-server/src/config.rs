//! Server configuration file support.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Server configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP server.
    #[serde(default = "default_address")]
    pub address: SocketAddr,

    /// Log level filter (overridable via RUST_LOG).
    #[serde(default)]
    pub log_level: Option<String>,

    /// Whether to serve permissive CORS headers for the UI collaborator.
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Base models registered at startup.
    #[serde(default)]
    pub base_models: Vec<String>,
}

fn default_address() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("valid default address")
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            log_level: None,
            enable_cors: true,
            base_models: Vec::new(),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ServerConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ServerConfigError> {
        if !path.exists() {
            return Err(ServerConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ServerConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }
}
