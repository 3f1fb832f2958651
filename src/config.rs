//! Configuration management for the chat relay server
//!
//! Loads settings from config.toml with CHAT_RELAY_* environment overrides
//! and validates them before the server starts.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Relay server settings.
///
/// Every field has a default, so both the config file and each individual
/// key are optional.
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// IP address to bind the listener to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Pending-connection queue length passed to listen()
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Size of a single socket read
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,

    /// Soft cap on the size of one relayed message
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    2004
}

fn default_backlog() -> u32 {
    100
}

fn default_read_buffer_bytes() -> usize {
    256
}

fn default_max_message_bytes() -> usize {
    64 * 1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            backlog: default_backlog(),
            read_buffer_bytes: default_read_buffer_bytes(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from config.toml (if present) with environment
    /// overrides, e.g. CHAT_RELAY_PORT=9000.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("CHAT_RELAY"))
            .build()?;

        let config: RelayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Bind address and port as a socket address string.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Validation for all configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.is_empty() {
            return Err(ConfigError::Message("bind_address cannot be empty".into()));
        }

        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.read_buffer_bytes == 0 {
            return Err(ConfigError::Message(
                "read_buffer_bytes must be greater than 0".into(),
            ));
        }

        if self.max_message_bytes < self.read_buffer_bytes {
            return Err(ConfigError::Message(
                "max_message_bytes must be at least read_buffer_bytes".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr(), "127.0.0.1:2004");
        assert_eq!(config.backlog, 100);
        assert_eq!(config.read_buffer_bytes, 256);
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = RelayConfig {
            port: 0,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_read_buffer_rejected() {
        let config = RelayConfig {
            read_buffer_bytes: 0,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cap_below_read_buffer_rejected() {
        let config = RelayConfig {
            read_buffer_bytes: 512,
            max_message_bytes: 256,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
