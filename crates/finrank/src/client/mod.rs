//! OpenAlex API client.
//!
//! Provides async HTTP client with:
//! - Connection pooling via reqwest
//! - Process-wide request-rate limiting (token bucket)
//! - Cursor pagination with per-page retry, see [`Pager`]

mod pager;

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

use crate::config::{Config, api};
use crate::error::{ClientError, ClientResult};
use crate::models::WorksPage;

pub use pager::{Page, Pager, RetryBudget};

/// OpenAlex API client.
///
/// Cheap to clone; clones share the connection pool and the rate limiter.
#[derive(Clone)]
pub struct OpenAlexClient {
    /// HTTP client behind a middleware stack that is currently empty.
    client: ClientWithMiddleware,

    /// API base URL.
    base_url: String,

    /// Polite-pool contact email (optional).
    mailto: Option<String>,

    /// Results per page.
    per_page: u32,

    /// Limiter shared by every request from this client and its clones.
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl OpenAlexClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "application/json".parse().expect("valid accept header"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("finrank/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(api::MAX_KEEPALIVE)
            .pool_idle_timeout(api::KEEPALIVE_EXPIRY)
            .gzip(true)
            .build()?;

        // Retries are driven per page by the pager, which also owns the
        // rate-limit budget. The stack holds no middleware yet; request
        // tracing or caching layers attach here without touching callers.
        let client = ClientBuilder::new(client).build();

        let limiter = NonZeroU32::new(config.requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            per_page: config.per_page,
            limiter,
        })
    }

    /// Check if a polite-pool contact email is configured.
    #[must_use]
    pub fn has_mailto(&self) -> bool {
        self.mailto.is_some()
    }

    /// Fetch one page of works matching `filter`.
    ///
    /// `cursor` is `*` for the first page, then the previous page's `next_cursor`.
    ///
    /// # Errors
    ///
    /// Returns error on API failure.
    pub async fn list_works(&self, filter: &str, cursor: &str) -> ClientResult<WorksPage> {
        let url = format!("{}/works", self.base_url);

        let mut params = vec![
            ("filter".to_string(), filter.to_string()),
            ("per-page".to_string(), self.per_page.to_string()),
            ("cursor".to_string(), cursor.to_string()),
        ];
        if let Some(ref mailto) = self.mailto {
            params.push(("mailto".to_string(), mailto.clone()));
        }

        self.get(&url, &params).await
    }

    /// Make a GET request.
    async fn get<T>(&self, url: &str, params: &[(String, String)]) -> ClientResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Some(ref limiter) = self.limiter {
            limiter.until_ready().await;
        }

        let response = self.client.get(url).query(params).send().await?;

        let response = self.handle_response(response).await?;
        let body = response.bytes().await.map_err(ClientError::Body)?;

        serde_json::from_slice(&body).map_err(ClientError::from)
    }

    /// Handle API response status codes.
    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(api::DEFAULT_RETRY_AFTER_SECS);

                Err(ClientError::rate_limited(retry_after))
            }
            404 => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::not_found(text))
            }
            400 => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::bad_request(text))
            }
            500..=599 => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::server(status.as_u16(), text))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::UnexpectedStatus { status: status.as_u16(), message: text })
            }
        }
    }
}

impl std::fmt::Debug for OpenAlexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAlexClient")
            .field("base_url", &self.base_url)
            .field("has_mailto", &self.has_mailto())
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}
