//! Configuration for hearthwire
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{HearthError, Result};

/// Main configuration shared by servers and client connections
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Silence on a connection longer than this closes it (milliseconds, 0 = never)
    pub idle_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Codec Configuration
    // -------------------------------------------------------------------------
    /// Longest string or byte blob accepted inside a packet
    pub max_string_len: usize,

    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Name announced to clients during the handshake
    pub server_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:25700".to_string(),
            max_connections: 256,
            idle_timeout_ms: 30_000,
            write_timeout_ms: 5000,
            max_string_len: 4096,
            server_name: "hearthwire".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check values that would make connections unusable
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(HearthError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.max_string_len == 0 || self.max_string_len > u16::MAX as usize {
            return Err(HearthError::Config(format!(
                "max_string_len must be within 1..={}",
                u16::MAX
            )));
        }
        Ok(())
    }

    /// Idle timeout as a socket read timeout
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }

    /// Write timeout as a socket write timeout
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the idle timeout (in milliseconds, 0 disables it)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the longest accepted string or blob
    pub fn max_string_len(mut self, len: usize) -> Self {
        self.config.max_string_len = len;
        self
    }

    /// Set the server name sent in handshakes
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = name.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
