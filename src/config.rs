//! Control Plane Configuration
//!
//! Configuration structs for the zone control plane: listen address, shared
//! bearer token, zone storage directory and per-connection timeouts.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ControlError;

/// Main control plane configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlConfig {
    /// HTTP control interface settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl ControlConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ControlError> {
        self.http.validate()
    }

    /// Load configuration from TOML file contents
    pub fn from_toml(content: &str) -> Result<Self, ControlError> {
        toml::from_str(content)
            .map_err(|e| ControlError::Config(format!("TOML parse error: {}", e)))
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, ControlError> {
        toml::to_string_pretty(self)
            .map_err(|e| ControlError::Config(format!("TOML serialize error: {}", e)))
    }
}

/// HTTP control interface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address (default: 127.0.0.1:8053)
    pub listen: SocketAddr,
    /// Shared bearer token required on every request
    pub token: String,
    /// Directory holding one `<zone>.json` file per zone
    pub zones_dir: PathBuf,
    /// Header read timeout in seconds
    pub read_timeout_secs: u64,
    /// Idle keep-alive timeout in seconds
    pub idle_timeout_secs: u64,
    /// Deadline for producing a response, in seconds
    pub write_timeout_secs: u64,
    /// How long shutdown waits for in-flight requests, in seconds
    pub shutdown_timeout_secs: u64,
    /// Maximum accepted request body size
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8053)),
            token: String::new(),
            zones_dir: PathBuf::from("./dns"),
            read_timeout_secs: 5,
            idle_timeout_secs: 10,
            write_timeout_secs: 10,
            shutdown_timeout_secs: 10,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl HttpConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validate the HTTP settings
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.token.is_empty() {
            return Err(ControlError::Config("http.token must not be empty".to_string()));
        }

        let timeouts = [
            ("http.read_timeout_secs", self.read_timeout_secs),
            ("http.idle_timeout_secs", self.idle_timeout_secs),
            ("http.write_timeout_secs", self.write_timeout_secs),
            ("http.shutdown_timeout_secs", self.shutdown_timeout_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ControlError::Config(format!("{} must be > 0", name)));
            }
        }

        if self.max_body_bytes == 0 {
            return Err(ControlError::Config(
                "http.max_body_bytes must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
