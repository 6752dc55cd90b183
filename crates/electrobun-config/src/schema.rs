//! Configuration schema types.
//!
//! All structs use `serde(default)` so partial configs work correctly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fingerprint::BuildFingerprint;

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectrobunConfig {
    pub rpc: RpcConfig,
    pub channel: ChannelConfig,
    pub socket: SocketConfig,
    pub logging: LoggingConfig,
}

/// RPC dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Deadline applied to every outbound request without an explicit override.
    pub max_request_time_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_request_time_ms: 1000,
        }
    }
}

impl RpcConfig {
    pub fn max_request_time(&self) -> Duration {
        Duration::from_millis(self.max_request_time_ms)
    }
}

/// Named-pipe channel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Directory that holds the FIFO pairs. Defaults to the OS temp dir.
    pub pipe_dir: Option<PathBuf>,
    /// Build fingerprint baked into every channel name. Derived from the
    /// package version when unset.
    pub build_hash: Option<String>,
}

impl ChannelConfig {
    pub fn resolved_pipe_dir(&self) -> PathBuf {
        self.pipe_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn resolved_build_hash(&self) -> String {
        match &self.build_hash {
            Some(hash) => hash.clone(),
            None => BuildFingerprint::derive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
                .to_string(),
        }
    }
}

/// Shared socket transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    pub enabled: bool,
    pub host: String,
    /// Port to listen on. 0 picks an ephemeral port.
    pub port: u16,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 0,
        }
    }
}

impl SocketConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
