//! services/client/src/config.rs
//!
//! Client configuration, read once from environment variables at startup.
//! A `.env` file in the working directory is honoured outside of tests.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Why the environment could not be turned into a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Backend location, local storage, logging and HTTP settings.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub storage_path: PathBuf,
    pub log_level: Level,
    pub http_timeout: Duration,
}

const DEFAULT_API_URL: &str = "http://localhost:5000/api";

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Backend ---
        let api_url = lookup("FEED_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim_end_matches('/').to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "FEED_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_url),
            ));
        }

        let timeout_str = lookup("FEED_HTTP_TIMEOUT_SECS").unwrap_or_else(|| "30".to_string());
        let timeout_secs = timeout_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("FEED_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        // --- Local storage ---
        let storage_path = match lookup("FEED_STORAGE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_storage_path()?,
        };

        // --- Logging ---
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_url,
            storage_path,
            log_level,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// `<data dir>/social-feed/storage.json`
fn default_storage_path() -> Result<PathBuf, ConfigError> {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| ConfigError::MissingVar("FEED_STORAGE_PATH".to_string()))?;
    path.push("social-feed");
    path.push("storage.json");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("FEED_STORAGE_PATH", "/tmp/s.json")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.storage_path, PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("FEED_API_URL", "https://feed.example.com/api/"),
            ("FEED_STORAGE_PATH", "/tmp/s.json"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://feed.example.com/api");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("RUST_LOG", "chatty"),
            ("FEED_STORAGE_PATH", "/tmp/s.json"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "RUST_LOG"));

        let err = Config::from_lookup(lookup(&[("FEED_API_URL", "ftp://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "FEED_API_URL"));

        let err = Config::from_lookup(lookup(&[("FEED_HTTP_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "FEED_HTTP_TIMEOUT_SECS"));
    }
}
