//! Configuration for the store client

use crate::error::{ApiError, ApiResult};
use sos_core::config::StoreConfig;
use std::time::Duration;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration
#[derive(Debug, Clone)]
pub struct StoreClientConfig {
    /// Database URL, e.g. `https://<project>.firebaseio.com`
    pub database_url: String,
    /// Database secret or ID token, sent as `?auth=`
    pub auth_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl StoreClientConfig {
    /// Configuration for a database URL with defaults for everything else
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from the `[store]` section of the workspace configuration
    #[must_use]
    pub fn from_schema(store: &StoreConfig) -> Self {
        Self {
            database_url: store.database_url.clone(),
            auth_token: store.auth_token.clone(),
            timeout: Duration::from_secs(store.timeout_secs),
        }
    }

    /// Builder-style method to set the auth token
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Database URL without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.database_url.trim_end_matches('/')
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.database_url.is_empty() {
            return Err(ApiError::config("database_url cannot be empty"));
        }

        if !self.database_url.starts_with("http://") && !self.database_url.starts_with("https://") {
            return Err(ApiError::config("database_url must start with http:// or https://"));
        }

        if self.timeout.is_zero() {
            return Err(ApiError::config("timeout cannot be zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config() {
        let config = StoreClientConfig::new("https://demo.firebaseio.com/");
        assert_eq!(config.base_url(), "https://demo.firebaseio.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_from_schema() {
        let section = StoreConfig {
            database_url: "https://demo.firebaseio.com".to_string(),
            auth_token: Some("secret".to_string()),
            timeout_secs: 7,
            ..StoreConfig::default()
        };

        let config = StoreClientConfig::from_schema(&section);
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_validation() {
        assert!(StoreClientConfig::new("https://demo.firebaseio.com").validate().is_ok());
        assert!(StoreClientConfig::new("").validate().is_err());
        assert!(StoreClientConfig::new("demo.firebaseio.com").validate().is_err());
        assert!(StoreClientConfig::new("https://demo.firebaseio.com")
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
