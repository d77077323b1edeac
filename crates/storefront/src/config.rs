//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHAPTER_API_URL` - Base URL of the bookstore API (e.g. `https://host/api`)
//!
//! ## Optional
//! - `CHAPTER_STORAGE_PATH` - File backing the persistent key-value store
//!   (default: `.crafted-chapter/storage.json`)
//! - `CHAPTER_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Environment name attached to Sentry events

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_PATH: &str = ".crafted-chapter/storage.json";
const DEFAULT_TIMEOUT_SECS: &str = "30";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every API path is joined onto. Always ends with `/`.
    pub api_url: Url,
    /// File backing the persistent key-value store
    pub storage_path: PathBuf,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_required_env("CHAPTER_API_URL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("CHAPTER_API_URL".to_string(), e))?;
        let storage_path =
            PathBuf::from(get_env_or_default("CHAPTER_STORAGE_PATH", DEFAULT_STORAGE_PATH));
        let timeout_secs = get_env_or_default("CHAPTER_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CHAPTER_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            api_url,
            storage_path,
            request_timeout: Duration::from_secs(timeout_secs),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Build a configuration for an explicit API URL with default settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL is not an absolute
    /// `http`/`https` URL.
    pub fn for_api_url(api_url: &str) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("CHAPTER_API_URL".to_string(), e))?;
        Ok(Self {
            api_url,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            request_timeout: Duration::from_secs(30),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, normalizing it to end with `/` so relative
/// endpoint paths join beneath the base path instead of replacing it.
fn parse_api_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_gets_trailing_slash() {
        let url = parse_api_url("https://books.example.com/api").unwrap();
        assert_eq!(url.as_str(), "https://books.example.com/api/");
        assert_eq!(
            url.join("cart").unwrap().as_str(),
            "https://books.example.com/api/cart"
        );
    }

    #[test]
    fn test_api_url_keeps_existing_slash() {
        let url = parse_api_url("http://localhost:5000/api/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/");
    }

    #[test]
    fn test_api_url_rejects_other_schemes() {
        assert!(parse_api_url("ftp://books.example.com").is_err());
        assert!(parse_api_url("not a url").is_err());
    }

    #[test]
    fn test_for_api_url_defaults() {
        let config = ClientConfig::for_api_url("http://127.0.0.1:5000/api").unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.storage_path, PathBuf::from(DEFAULT_STORAGE_PATH));
        assert!(config.sentry_dsn.is_none());
        assert!(config.sentry_environment.is_none());
    }
}
