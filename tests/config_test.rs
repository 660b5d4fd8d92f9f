//! Configuration tests
//!
//! Tests loading and validating configuration from files and the
//! environment, and building a multiplexer from a loaded configuration.

use std::io::Write;

use portmux::config::{defaults, MuxConfig, Route};
use portmux::server::build_mux;

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "listen": "127.0.0.1:7070",
            "routes": [
                {{"patterns": ["SSH-2.0"], "target": "127.0.0.1:22"}},
                {{"patterns": ["\\x16\\x03"], "target": "127.0.0.1:443"}}
            ],
            "fallback": "127.0.0.1:80",
            "log_level": "debug"
        }}"#
    )
    .unwrap();

    let config = MuxConfig::from_file(file.path()).unwrap();
    assert_eq!(config.listen.port(), 7070);
    assert_eq!(config.routes.len(), 2);
    assert_eq!(config.fallback.unwrap().port(), 80);
    assert_eq!(config.log_level, "debug");
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_file_missing() {
    assert!(MuxConfig::from_file("no/such/file.json").is_err());
}

#[test]
fn test_from_file_malformed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    assert!(MuxConfig::from_file(file.path()).is_err());
}

#[test]
fn test_from_env() {
    std::env::set_var("PORTMUX_LISTEN", "127.0.0.1:9999");
    std::env::set_var("PORTMUX_LOG_LEVEL", "trace");
    std::env::set_var("PORTMUX_BUFFER_SIZE", "1024");

    let config = MuxConfig::from_env().unwrap();
    assert_eq!(config.listen.port(), 9999);
    assert_eq!(config.log_level, "trace");
    assert_eq!(config.buffer_size, 1024);

    std::env::remove_var("PORTMUX_LISTEN");
    std::env::remove_var("PORTMUX_LOG_LEVEL");
    std::env::remove_var("PORTMUX_BUFFER_SIZE");
}

#[test]
fn test_file_then_env_merge_order() {
    let mut file_config = MuxConfig::default();
    file_config.listen = "127.0.0.1:7070".parse().unwrap();
    file_config.log_level = "debug".to_string();

    let mut env_config = MuxConfig::default();
    env_config.log_level = "trace".to_string();

    let merged = MuxConfig::default().merge(file_config).merge(env_config);
    // Env wins where it was set, the file's value survives elsewhere.
    assert_eq!(merged.log_level, "trace");
    assert_eq!(merged.listen.port(), 7070);
}

#[test]
fn test_defaults_are_usable() {
    let config = MuxConfig::default();
    assert_eq!(config.listen, defaults::listen());
    assert_eq!(config.buffer_size, defaults::buffer_size());
    // A default config routes nothing, so validation must refuse it.
    assert!(config.validate().is_err());
}

#[test]
fn test_loaded_config_builds_mux() {
    let mut config = MuxConfig::default();
    config.routes.push(Route {
        patterns: vec!["SSH-2.0".to_string(), "\\x16\\x03".to_string()],
        target: "127.0.0.1:22".parse().unwrap(),
    });
    config.fallback = Some("127.0.0.1:80".parse().unwrap());
    config.validate().unwrap();

    let mux = build_mux(&config).unwrap();
    assert_eq!(mux.pattern_count(), 2);
}
