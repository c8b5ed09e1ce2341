//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stemix_core::{Error, HttpError, Result};
use url::Url;

/// API base used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Path prefix of the versioned API on the backend origin.
pub const API_PREFIX: &str = "/api/v1";

/// Connection settings for the separation API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Versioned API root, e.g. `https://stems.example.com/api/v1`.
    pub base_url: String,
    /// Session token sent as `Authorization: Bearer`.
    pub token: Option<String>,
    /// Deployment key sent as `X-API-KEY`.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The API root without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Backend origin: the API root with its `/api/v1` suffix removed.
    pub fn origin(&self) -> &str {
        let root = self.api_root();
        root.strip_suffix(API_PREFIX).unwrap_or(root)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.api_root())
            .map_err(|e| Error::Http(HttpError::InvalidUrl(format!("{}: {e}", self.base_url))))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Http(HttpError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            ))));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}
