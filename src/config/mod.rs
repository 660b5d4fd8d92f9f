//! Configuration module
//!
//! This module defines the server configuration structure and the methods
//! for loading it from its sources: a JSON file, `PORTMUX_`-prefixed
//! environment variables, and command-line overrides applied by the binary.
//! Later sources win field by field.

pub mod defaults;

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::common::{parse_socket_addr, MuxError, Result};

/// One routing rule: a set of pattern strings mapped to a backend address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Route {
    /// Prefix patterns, with `\xNN` style escapes for binary bytes
    pub patterns: Vec<String>,
    /// Backend address connections matching these patterns are forwarded to
    pub target: SocketAddr,
}

/// Server configuration
///
/// Contains all configuration options needed to run the multiplexing
/// server. Supports loading from a JSON file, environment variables, and
/// command-line arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct MuxConfig {
    /// Listen address for the server
    #[serde(default = "defaults::listen")]
    pub listen: SocketAddr,

    /// Routing rules, matched against the leading bytes of each connection
    #[serde(default)]
    pub routes: Vec<Route>,

    /// Backend for connections no pattern matches; unmatched connections
    /// are closed when unset
    #[serde(default)]
    pub fallback: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    /// Relay buffer size in bytes
    #[serde(default = "defaults::buffer_size")]
    pub buffer_size: usize,

    /// Backend connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            listen: defaults::listen(),
            routes: Vec::new(),
            fallback: None,
            log_level: defaults::log_level(),
            buffer_size: defaults::buffer_size(),
            connect_timeout: defaults::connect_timeout(),
        }
    }
}

impl MuxConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_display = path.display();

        let content = fs::read_to_string(path)
            .map_err(|e| MuxError::Config(format!("Failed to read config file {}: {}", path_display, e)))?;

        serde_json::from_str(&content)
            .map_err(|e| MuxError::Config(format!("Failed to parse JSON config file {}: {}", path_display, e)))
    }

    /// Load configuration from environment variables
    ///
    /// Scalar options only; routes are file or command-line territory.
    pub fn from_env() -> Result<Self> {
        let get_env = |name: &str| -> Option<String> {
            env::var(format!("{}{}", defaults::ENV_PREFIX, name)).ok()
        };

        let mut config = Self::default();

        if let Some(value) = get_env("LISTEN") {
            config.listen = parse_socket_addr(&value)?;
        }
        if let Some(value) = get_env("FALLBACK") {
            config.fallback = Some(parse_socket_addr(&value)?);
        }
        if let Some(value) = get_env("LOG_LEVEL") {
            config.log_level = value;
        }
        if let Some(value) = get_env("BUFFER_SIZE") {
            config.buffer_size = value
                .parse()
                .map_err(|e| MuxError::Config(format!("Invalid PORTMUX_BUFFER_SIZE: {}", e)))?;
        }
        if let Some(value) = get_env("CONNECT_TIMEOUT") {
            config.connect_timeout = value
                .parse()
                .map_err(|e| MuxError::Config(format!("Invalid PORTMUX_CONNECT_TIMEOUT: {}", e)))?;
        }

        Ok(config)
    }

    /// Merge another configuration into this one
    ///
    /// Fields of `other` that differ from the defaults win; routes are
    /// appended rather than replaced.
    pub fn merge(mut self, other: MuxConfig) -> Self {
        let base = MuxConfig::default();

        if other.listen != base.listen {
            self.listen = other.listen;
        }
        self.routes.extend(other.routes);
        if other.fallback.is_some() {
            self.fallback = other.fallback;
        }
        if other.log_level != base.log_level {
            self.log_level = other.log_level;
        }
        if other.buffer_size != base.buffer_size {
            self.buffer_size = other.buffer_size;
        }
        if other.connect_timeout != base.connect_timeout {
            self.connect_timeout = other.connect_timeout;
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error when no traffic could ever be served (no routes and
    /// no fallback), when a pattern string is empty or carries a bad
    /// escape, or when a numeric option is zero.
    pub fn validate(&self) -> Result<()> {
        if self.routes.is_empty() && self.fallback.is_none() {
            return Err(MuxError::Config(
                "No routes and no fallback configured; every connection would be closed".to_string(),
            ));
        }

        for route in &self.routes {
            if route.patterns.is_empty() {
                return Err(MuxError::Config(format!(
                    "Route to {} has no patterns",
                    route.target
                )));
            }
            for pattern in &route.patterns {
                parse_pattern(pattern)?;
            }
        }

        if self.buffer_size == 0 {
            return Err(MuxError::Config("buffer_size must be greater than zero".to_string()));
        }
        if self.connect_timeout == 0 {
            return Err(MuxError::Config("connect_timeout must be greater than zero".to_string()));
        }

        Ok(())
    }
}

/// Parse a pattern string into the byte sequence it denotes.
///
/// Supports `\xNN` (two hex digits), `\r`, `\n`, `\t`, `\0` and `\\`
/// escapes so binary prefixes (e.g. the TLS record byte `\x16`) are
/// expressible in JSON config files. All other characters contribute their
/// UTF-8 bytes.
pub fn parse_pattern(pattern: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut encoded = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut encoded).as_bytes());
            continue;
        }

        match chars.next() {
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                match (hi.and_then(|c| c.to_digit(16)), lo.and_then(|c| c.to_digit(16))) {
                    (Some(hi), Some(lo)) => out.push((hi * 16 + lo) as u8),
                    _ => {
                        return Err(MuxError::Pattern(format!(
                            "\\x escape needs two hex digits in \"{}\"",
                            pattern
                        )))
                    }
                }
            }
            Some('r') => out.push(b'\r'),
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('\\') => out.push(b'\\'),
            Some(c) => {
                return Err(MuxError::Pattern(format!(
                    "unknown escape \\{} in \"{}\"",
                    c, pattern
                )))
            }
            None => {
                return Err(MuxError::Pattern(format!(
                    "dangling backslash in \"{}\"",
                    pattern
                )))
            }
        }
    }

    if out.is_empty() {
        return Err(MuxError::Pattern(format!(
            "pattern \"{}\" denotes no bytes",
            pattern
        )));
    }

    Ok(out)
}
