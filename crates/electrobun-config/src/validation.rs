//! Configuration validation. Collects every problem into one `ConfigError`.

use electrobun_common::ConfigError;

use crate::schema::ElectrobunConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ElectrobunConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    if config.rpc.max_request_time_ms == 0 {
        errors.push("rpc.max_request_time_ms must be greater than 0".into());
    }

    if let Some(hash) = &config.channel.build_hash {
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
            errors.push(format!(
                "channel.build_hash = {hash:?} must be non-empty and alphanumeric"
            ));
        }
    }

    if config.socket.enabled && config.socket.host.trim().is_empty() {
        errors.push("socket.host must not be empty when the socket is enabled".into());
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(format!(
            "logging.level = {:?} is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
