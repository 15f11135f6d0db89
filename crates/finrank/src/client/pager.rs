//! Cursor pagination over `/works` with per-page retry.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_stream::try_stream;
use futures::Stream;
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{RetryDecision, RetryPolicy};

use super::OpenAlexClient;
use crate::config::Config;
use crate::error::FetchError;
use crate::models::{FetchScope, WorksPage};

/// Cursor value requesting the first page.
const FIRST_CURSOR: &str = "*";

/// Retry limits applied to each page independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Retries for transient failures (transport, timeout, 5xx).
    pub max_retries: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// Rate-limit suspensions, counted separately from retries.
    pub max_rate_limit_waits: u32,
    /// Ceiling for a single server-advised wait.
    pub max_rate_limit_wait: Duration,
}

impl RetryBudget {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_min: config.backoff_min,
            backoff_max: config.backoff_max.max(config.backoff_min),
            max_rate_limit_waits: config.max_rate_limit_waits,
            max_rate_limit_wait: config.max_rate_limit_wait,
        }
    }

    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .retry_bounds(self.backoff_min, self.backoff_max)
            .build_with_max_retries(self.max_retries)
    }
}

/// One fetched page of a scope.
#[derive(Debug, Clone)]
pub struct Page {
    pub scope: Arc<FetchScope>,

    /// 1-based page number, counted from where this run started.
    pub number: u32,

    /// Cursor this page was requested with.
    pub cursor: String,

    /// Cursor of the following page; `None` on the last page.
    pub next_cursor: Option<String>,

    /// Raw records, not yet validated.
    pub records: Vec<serde_json::Value>,

    /// Total matching records reported by the API.
    pub total: Option<u64>,
}

/// Paginated fetcher.
#[derive(Debug, Clone)]
pub struct Pager {
    client: OpenAlexClient,
    budget: RetryBudget,
}

impl Pager {
    #[must_use]
    pub fn new(client: OpenAlexClient, budget: RetryBudget) -> Self {
        Self { client, budget }
    }

    /// Lazily page through a scope, starting at its resume cursor if set.
    ///
    /// The stream ends after the last page, or after yielding a single
    /// [`FetchError`] once a page has exhausted its retries.
    pub fn pages(&self, scope: FetchScope) -> impl Stream<Item = Result<Page, FetchError>> + Send + '_ {
        let scope = Arc::new(scope);
        try_stream! {
            let mut cursor = scope.cursor.clone().unwrap_or_else(|| FIRST_CURSOR.to_string());
            let mut number = 1_u32;

            loop {
                let WorksPage { meta, results } = self.fetch_page(&scope, number, &cursor).await?;
                if results.is_empty() {
                    break;
                }

                let next_cursor = meta.next_cursor.filter(|c| !c.is_empty() && *c != cursor);
                tracing::debug!(
                    scope = %scope.label,
                    page = number,
                    records = results.len(),
                    total = ?meta.count,
                    "Fetched page"
                );

                yield Page {
                    scope: Arc::clone(&scope),
                    number,
                    cursor: cursor.clone(),
                    next_cursor: next_cursor.clone(),
                    records: results,
                    total: meta.count,
                };

                match next_cursor {
                    Some(next) => {
                        cursor = next;
                        number += 1;
                    }
                    None => break,
                }
            }
        }
    }

    /// Fetch one page, retrying within the budget.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when retries or rate-limit waits are exhausted,
    /// or immediately on a non-transient failure.
    pub async fn fetch_page(
        &self,
        scope: &FetchScope,
        number: u32,
        cursor: &str,
    ) -> Result<WorksPage, FetchError> {
        let policy = self.budget.policy();
        let started = SystemTime::now();
        let mut retries = 0_u32;
        let mut rate_limit_waits = 0_u32;

        loop {
            let cause = match self.client.list_works(&scope.filter, cursor).await {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            if let Some(retry_after) = cause.retry_after() {
                if rate_limit_waits < self.budget.max_rate_limit_waits {
                    rate_limit_waits += 1;
                    let wait = retry_after.min(self.budget.max_rate_limit_wait);
                    tracing::warn!(
                        scope = %scope.label,
                        page = number,
                        wait_ms = wait.as_millis() as u64,
                        attempt = rate_limit_waits,
                        "Rate limited, suspending"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
            } else if cause.is_transient() {
                if let RetryDecision::Retry { execute_after } = policy.should_retry(started, retries) {
                    retries += 1;
                    let wait = execute_after.duration_since(SystemTime::now()).unwrap_or_default();
                    tracing::warn!(
                        scope = %scope.label,
                        page = number,
                        error = %cause,
                        retry = retries,
                        wait_ms = wait.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
            }

            return Err(FetchError {
                scope: scope.label.clone(),
                page: number,
                cursor: cursor.to_string(),
                cause,
            });
        }
    }
}
