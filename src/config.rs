//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::backend::DEFAULT_QUOTA_BYTES;
use crate::cache::{MaxSize, DEFAULT_FILL_FACTOR};

// == Backend Kind ==
/// Which storage backend the factory opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Volatile, in-process storage
    Memory,
    /// JSON file at `data_path`
    File,
    /// No backend; every `get_cache` reports it unavailable
    Disabled,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "none" | "disabled" => Ok(BackendKind::Disabled),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage backend to open
    pub backend: BackendKind,
    /// File used by the file backend
    pub data_path: PathBuf,
    /// Byte quota of the backend
    pub quota_bytes: usize,
    /// Entry ceiling per namespace
    pub max_size: MaxSize,
    /// Fraction of capacity retained by a purge
    pub fill_factor: f64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory`, `file` or `none` (default: file)
    /// - `CACHE_DATA_PATH` - File backend location (default: cache-storage.json)
    /// - `CACHE_QUOTA_BYTES` - Backend byte quota (default: 5 MiB)
    /// - `CACHE_MAX_SIZE` - Entries per namespace, -1 for unbounded (default: -1)
    /// - `CACHE_FILL_FACTOR` - Purge retain fraction in (0, 1] (default: 0.75)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fill_factor = env_parse("CACHE_FILL_FACTOR").unwrap_or(defaults.fill_factor);
        let fill_factor = if fill_factor > 0.0 && fill_factor <= 1.0 {
            fill_factor
        } else {
            warn!(
                "CACHE_FILL_FACTOR={} is outside (0, 1], using {}",
                fill_factor, DEFAULT_FILL_FACTOR
            );
            DEFAULT_FILL_FACTOR
        };

        Self {
            backend: env_parse("CACHE_BACKEND").unwrap_or(defaults.backend),
            data_path: env::var("CACHE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            quota_bytes: env_parse("CACHE_QUOTA_BYTES").unwrap_or(defaults.quota_bytes),
            max_size: env_parse::<i64>("CACHE_MAX_SIZE")
                .map(MaxSize::from_raw)
                .unwrap_or(defaults.max_size),
            fill_factor,
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }
}

/// Reads and parses `name`, ignoring unset or malformed values.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            data_path: PathBuf::from("cache-storage.json"),
            quota_bytes: DEFAULT_QUOTA_BYTES,
            max_size: MaxSize::Unbounded,
            fill_factor: DEFAULT_FILL_FACTOR,
            server_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.data_path, PathBuf::from("cache-storage.json"));
        assert_eq!(config.quota_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_size, MaxSize::Unbounded);
        assert_eq!(config.fill_factor, 0.75);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("CACHE_BACKEND");
        env::remove_var("CACHE_DATA_PATH");
        env::remove_var("CACHE_QUOTA_BYTES");
        env::remove_var("CACHE_MAX_SIZE");
        env::remove_var("CACHE_FILL_FACTOR");
        env::remove_var("SERVER_PORT");

        let config = Config::from_env();
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.max_size, MaxSize::Unbounded);
        assert_eq!(config.fill_factor, 0.75);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Memory".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert_eq!(" file ".parse::<BackendKind>(), Ok(BackendKind::File));
        assert_eq!("none".parse::<BackendKind>(), Ok(BackendKind::Disabled));
        assert!("redis".parse::<BackendKind>().is_err());
    }
}
