//! Separation API client implementation.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use stemix_core::{Error, HttpError, Result};
use tracing::{debug, warn};
use url::Url;

use crate::config::{ClientConfig, API_PREFIX};

/// Maximum number of attempts for a request.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_RETRY_DELAY_MS: u64 = 500;

/// Body and reported content type of a successful response.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Authenticated client for the separation API.
#[derive(Clone)]
pub struct ApiClient {
    /// HTTP client for making requests.
    http: reqwest::Client,
    config: ClientConfig,
    /// Headers attached to requests against the API only.
    auth_headers: HeaderMap,
}

impl ApiClient {
    /// Create a client with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut auth_headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::Config(format!("Invalid token: {e}")))?;
            auth_headers.insert(AUTHORIZATION, value);
        }
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?;
            auth_headers.insert("X-API-KEY", value);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            auth_headers,
        })
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Full URL of an API endpoint such as `jobs/42`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.api_root(), endpoint.trim_start_matches('/'))
    }

    /// Turn a stem path from a job result into an absolute URL.
    ///
    /// Absolute `http(s)` URLs pass through. Relative paths are resolved
    /// against the backend origin.
    pub fn resolve_stem_url(&self, path: &str) -> Result<Url> {
        let absolute = if is_absolute(path) {
            path.to_string()
        } else {
            format!("{}/{}", self.config.origin(), path.trim_start_matches('/'))
        };
        Url::parse(&absolute).map_err(|e| Error::Http(HttpError::InvalidUrl(format!("{absolute}: {e}"))))
    }

    /// Download a stem.
    ///
    /// Relative paths go through the authenticated API (a leading `/api/v1`
    /// is dropped since the API root already carries it). Absolute URLs are
    /// fetched as-is, without credentials.
    pub async fn fetch_stem(&self, path: &str) -> Result<Fetched> {
        if is_absolute(path) {
            let url = Url::parse(path)
                .map_err(|e| Error::Http(HttpError::InvalidUrl(format!("{path}: {e}"))))?;
            return self.get(url.as_str(), &[], false).await;
        }

        let endpoint = path.strip_prefix(API_PREFIX).unwrap_or(path);
        self.get(&self.endpoint_url(endpoint), &[], true).await
    }

    /// GET an API endpoint and parse the JSON body.
    pub(crate) async fn get_json<R>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let fetched = self.get(&self.endpoint_url(endpoint), query, true).await?;
        serde_json::from_slice(&fetched.body)
            .map_err(|e| Error::ParseError(format!("Failed to parse {endpoint} response: {e}")))
    }

    /// GET an API endpoint and return the raw body.
    pub(crate) async fn get_bytes(&self, endpoint: &str) -> Result<Fetched> {
        self.get(&self.endpoint_url(endpoint), &[], true).await
    }

    /// GET with retries on transient failures.
    async fn get(&self, url: &str, query: &[(&str, String)], authenticated: bool) -> Result<Fetched> {
        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt, last_error.as_ref());
                tokio::time::sleep(delay).await;
                debug!("Retry attempt {attempt} for {url} after {delay:?}");
            }

            let mut request = self.http.get(url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if authenticated {
                request = request.headers(self.auth_headers.clone());
            }

            match self.send(request).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) => {
                    warn!("Request to {url} failed (attempt {attempt}): {e}");

                    // Don't retry non-retryable errors
                    if !e.is_retryable() {
                        return Err(e);
                    }

                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Network("Request failed".to_string())))
    }

    /// Authenticated request against an API endpoint, sent once.
    ///
    /// Used for requests that change server state, which are not retried.
    pub(crate) async fn request_once(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Form>,
    ) -> Result<Fetched> {
        let url = self.endpoint_url(endpoint);
        debug!("{method} {url}");
        let mut request = self
            .http
            .request(method, &url)
            .headers(self.auth_headers.clone());
        if let Some(form) = body {
            request = request.multipart(form);
        }
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Fetched> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Http(HttpError::Timeout)
            } else if e.is_connect() {
                Error::Http(HttpError::ConnectionFailed(e.to_string()))
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());

            return Err(Error::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Http(HttpError::StatusError {
                status: status.as_u16(),
                message,
            }));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {e}")))?;

        debug!("Fetched {} bytes, type: {:?}", body.len(), content_type);
        Ok(Fetched { body, content_type })
    }

    #[cfg(test)]
    pub(crate) const fn auth_headers(&self) -> &HeaderMap {
        &self.auth_headers
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Exponential backoff, stretched to honor a server's `Retry-After`.
fn retry_delay(attempt: u32, last_error: Option<&Error>) -> Duration {
    let backoff = Duration::from_millis(BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
    match last_error {
        Some(Error::RateLimited {
            retry_after_secs: Some(secs),
        }) => backoff.max(Duration::from_secs(*secs)),
        _ => backoff,
    }
}
