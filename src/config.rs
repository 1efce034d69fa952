//! Server configuration loaded from the environment.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ACCESS_TOKEN_SECRET` - HMAC secret used to sign bearer tokens
//!
//! ## Optional
//! - `BLINK_DB_PATH` - Location of the document store (default: `blink_data`)
//! - `BLINK_HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 5000)
//! - `LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `LOG_DIR` - Write logs to a daily rolling file in this directory

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    /// Signing secret; `Debug` prints it redacted.
    pub token_secret: SecretString,
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first
    /// if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token_secret = get("ACCESS_TOKEN_SECRET")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("ACCESS_TOKEN_SECRET".to_string()))?;

        let db_path = get("BLINK_DB_PATH").unwrap_or_else(|| "blink_data".to_string()).into();

        let host = parse_or("BLINK_HOST", get("BLINK_HOST"), IpAddr::from([0, 0, 0, 0]))?;
        let port = parse_or("PORT", get("PORT"), 5000u16)?;

        let format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "LOG_FORMAT".to_string(),
                    format!("expected `pretty` or `json`, got `{other}`"),
                ))
            }
        };

        Ok(Self {
            db_path,
            host,
            port,
            token_secret,
            log: LogConfig {
                format,
                directory: get("LOG_DIR").map(PathBuf::from),
            },
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn token_secret_bytes(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("ACCESS_TOKEN_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.db_path, PathBuf::from("blink_data"));
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5000");
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert!(config.log.directory.is_none());
        assert_eq!(config.token_secret_bytes(), b"s3cret");
    }

    #[test]
    fn missing_secret_fails_fast() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingEnvVar(k)) if k == "ACCESS_TOKEN_SECRET"
        ));
        assert!(matches!(
            load(&[("ACCESS_TOKEN_SECRET", "  ")]),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            load(&[("ACCESS_TOKEN_SECRET", "s"), ("PORT", "eighty")]),
            Err(ConfigError::InvalidEnvVar(k, _)) if k == "PORT"
        ));
        assert!(matches!(
            load(&[("ACCESS_TOKEN_SECRET", "s"), ("LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidEnvVar(k, _)) if k == "LOG_FORMAT"
        ));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("ACCESS_TOKEN_SECRET", "s"),
            ("PORT", "8080"),
            ("BLINK_HOST", "127.0.0.1"),
            ("BLINK_DB_PATH", "/tmp/blink"),
            ("LOG_FORMAT", "JSON"),
            ("LOG_DIR", "/var/log/blink"),
        ])
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.db_path, PathBuf::from("/tmp/blink"));
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.directory, Some(PathBuf::from("/var/log/blink")));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = load(&[("ACCESS_TOKEN_SECRET", "hunter2")]).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
