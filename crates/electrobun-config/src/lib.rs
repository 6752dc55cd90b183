//! Electrobun IPC configuration.
//!
//! TOML-based configuration for the RPC dispatcher, the named-pipe channels
//! and the shared socket. All sections use defaults so partial configs work.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use electrobun_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("{:?}", config.rpc.max_request_time());
//! ```

pub mod fingerprint;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use fingerprint::BuildFingerprint;
pub use schema::{
    ChannelConfig, ElectrobunConfig, LoggingConfig, RpcConfig, SocketConfig,
    CONFIG_SCHEMA_VERSION,
};

use electrobun_common::ConfigError;

/// Load config from the platform default path and validate it.
pub fn load_config() -> Result<ElectrobunConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &ElectrobunConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&ElectrobunConfig::default());
        assert!(json.contains("\"rpc\""));
        assert!(json.contains("\"channel\""));
        assert!(json.contains("\"socket\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&ElectrobunConfig::default());
        let parsed: ElectrobunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rpc.max_request_time_ms, 1000);
        assert_eq!(parsed.socket.port, 0);
    }
}
