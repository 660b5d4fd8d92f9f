//! Default configuration values
//!
//! This module provides default values for configuration options.
//! It is the single source of truth for defaults, keeping them consistent
//! across the configuration sources.

use std::net::SocketAddr;
use std::str::FromStr;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "PORTMUX_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "portmux.json";

/// Default listen address as string
pub const LISTEN_STR: &str = "0.0.0.0:7000";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default listen address
pub fn listen() -> SocketAddr {
    SocketAddr::from_str(LISTEN_STR).expect("Default listen address should be valid")
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default relay buffer size in bytes
pub fn buffer_size() -> usize {
    8192
}

/// Default backend connect timeout in seconds
pub fn connect_timeout() -> u64 {
    30
}
