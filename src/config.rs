//! Configuration loading.
//!
//! Settings come from an optional `config.yaml`, with every field defaulted
//! so a bare invocation works, and CLI flags override file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default database file name, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "organizer.db";

/// Default port for the API server.
pub const DEFAULT_PORT: u16 = 8743;

/// Default session lifetime: two weeks.
pub const DEFAULT_SESSION_TTL_HOURS: u64 = 14 * 24;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Lifetime of issued sessions, in hours.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind: default_bind(),
            port: default_port(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_session_ttl_hours() -> u64 {
    DEFAULT_SESSION_TTL_HOURS
}

impl Config {
    /// Load configuration. An explicit path must exist; without one,
    /// `config.yaml` in the working directory is used when present and
    /// defaults apply otherwise.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from("config.yaml");
                if !fallback.exists() {
                    return Ok(Config::default());
                }
                fallback
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.db_path, PathBuf::from(DEFAULT_DB_PATH));
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 9000").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(
            config.server.session_ttl_hours,
            DEFAULT_SESSION_TTL_HOURS
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.yaml")));
        assert!(result.is_err());
    }
}
