//! HTTP client for the TMDB v3 API
//!
//! Builds authenticated GET requests and paces paging loops with a
//! configurable inter-request delay to respect upstream rate limits.

use crate::error::{CatalogError, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Timeout applied to each individual request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Default pause between paginated requests
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(250);

/// Region used for availability filtering
pub const WATCH_REGION: &str = "AR";

/// Language tag sent with every request
pub const LANGUAGE: &str = "es-ES";

/// Authenticated TMDB client
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    request_delay: Duration,
}

impl TmdbClient {
    /// Create a client with an explicit API key
    ///
    /// Fails with `MissingApiKey` when the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(CatalogError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: TMDB_BASE_URL.to_string(),
            request_delay: DEFAULT_REQUEST_DELAY,
        })
    }

    /// Create a client from the TMDB_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var("TMDB_API_KEY").unwrap_or_default())
    }

    /// Override the pause between paginated requests
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Point the client at a different base URL (test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    /// The pause callers must apply between paginated requests
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// GET a JSON document, appending the api_key query parameter
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        log::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("User-Agent", "dondever/1.0")
            .query(params)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus(response.status()));
        }

        Ok(response.json::<T>().await?)
    }
}
