//! Configuration management for the sync client.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default platform endpoint for the spreadsheet API.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/excel";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the spreadsheet API
    pub api_url: String,
    /// Directory holding the local store and the sheet file
    pub data_dir: PathBuf,
    /// Transport timeout for HTTP requests
    pub timeout: Duration,
    /// Bearer token overriding the persisted one
    pub auth_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(None, None)
    }

    /// Load configuration from environment variables, letting explicit
    /// values (command-line flags) take precedence. Validation runs on the
    /// merged result.
    pub fn from_env_with(
        api_url: Option<String>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Self::read_env()?.with_overrides(api_url, data_dir)
    }

    fn read_env() -> Result<Self, ConfigError> {
        let api_url = env::var("VALSYNC_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let data_dir = env::var("VALSYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".valsync"));

        let timeout_secs: u64 = env::var("VALSYNC_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let auth_token = env::var("VALSYNC_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        Ok(Self {
            api_url,
            data_dir,
            timeout: Duration::from_secs(timeout_secs),
            auth_token,
        })
    }

    fn with_overrides(
        mut self,
        api_url: Option<String>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if let Some(api_url) = api_url {
            self.api_url = api_url;
        }
        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check the API URL scheme and the timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(self.api_url.clone()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Path of the file-backed worksheet.
    pub fn sheet_path(&self) -> PathBuf {
        self.data_dir.join("sheet.json")
    }

    /// Directory of the key-value store.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("API URL must be http(s), got {0}")]
    InvalidApiUrl(String),

    #[error("Invalid VALSYNC_TIMEOUT_SECS value")]
    InvalidTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: &str) -> Config {
        Config {
            api_url: api_url.to_string(),
            data_dir: PathBuf::from("/tmp/valsync"),
            timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }

    #[test]
    fn derived_paths() {
        let config = config(DEFAULT_API_URL);

        assert_eq!(config.sheet_path(), PathBuf::from("/tmp/valsync/sheet.json"));
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/valsync/store"));
    }

    #[test]
    fn override_url_is_validated() {
        let err = config(DEFAULT_API_URL)
            .with_overrides(Some("ftp://platform".into()), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidApiUrl(url) if url == "ftp://platform"));
    }

    #[test]
    fn override_replaces_invalid_env_url() {
        let merged = config("not-a-url")
            .with_overrides(
                Some("https://platform.example/api/excel".into()),
                Some(PathBuf::from("/data")),
            )
            .unwrap();
        assert_eq!(merged.api_url, "https://platform.example/api/excel");
        assert_eq!(merged.store_dir(), PathBuf::from("/data/store"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = config(DEFAULT_API_URL);
        config.timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }
}
