//! Portmux Command Line Tool
//!
//! This binary is the command-line interface for portmux: a single listen
//! port, a set of prefix patterns, and a backend behind each of them.

use clap::Parser;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

// Import our library
use portmux::common::{init_logger, parse_socket_addr, MuxError, Result};
use portmux::config::{defaults, MuxConfig, Route};
use portmux::server::{build_mux, Server};
use portmux::{APP_NAME, VERSION};

/// Portmux: serve several wire protocols on one listening port
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Listen address
    #[clap(short, long)]
    listen: Option<String>,

    /// Route in the form PATTERN=HOST:PORT (repeatable); patterns accept
    /// \xNN escapes for binary bytes
    #[clap(short, long = "route", value_name = "PATTERN=ADDR")]
    routes: Vec<String>,

    /// Backend for connections no pattern matches
    #[clap(long, value_name = "ADDR")]
    fallback: Option<String>,

    /// Log level
    #[clap(long)]
    log_level: Option<String>,

    /// Load configuration from a file
    #[clap(long)]
    config_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Configuration sources, later ones winning: defaults, config file,
    // environment variables, command line arguments.
    let mut config = MuxConfig::default();

    let config_path = args.config_file.clone().or_else(|| {
        Path::new(defaults::DEFAULT_CONFIG_FILE)
            .exists()
            .then(|| defaults::DEFAULT_CONFIG_FILE.to_string())
    });
    if let Some(path) = &config_path {
        config = config.merge(MuxConfig::from_file(path)?);
    }

    config = config.merge(MuxConfig::from_env()?);

    if let Some(listen) = &args.listen {
        config.listen = parse_socket_addr(listen)?;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    for spec in &args.routes {
        config.routes.push(parse_route(spec)?);
    }
    if let Some(fallback) = &args.fallback {
        config.fallback = Some(parse_socket_addr(fallback)?);
    }

    // Initialize logger with the effective level
    init_logger(&config.log_level);

    info!("Starting {} v{}", APP_NAME, VERSION);
    if let Some(path) = &config_path {
        info!("Loaded configuration from {}", path);
    }

    config.validate()?;

    info!("Listen address: {}", config.listen);
    for route in &config.routes {
        info!("Route {:?} -> {}", route.patterns, route.target);
    }
    match config.fallback {
        Some(target) => info!("Fallback -> {}", target),
        None => warn!("No fallback configured; unmatched connections will be closed"),
    }

    let mux = Arc::new(build_mux(&config)?);
    let server = Server::new(config.listen, mux);

    info!("Service ready, press Ctrl+C to stop");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

/// Parse a `PATTERN=HOST:PORT` route argument.
fn parse_route(spec: &str) -> Result<Route> {
    let (pattern, target) = spec.split_once('=').ok_or_else(|| {
        MuxError::Config(format!("Invalid route \"{}\", expected PATTERN=ADDR", spec))
    })?;

    Ok(Route {
        patterns: vec![pattern.to_string()],
        target: parse_socket_addr(target)?,
    })
}
