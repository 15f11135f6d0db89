//! Configuration for the finrank ingestion engine.

use std::path::PathBuf;
use std::time::Duration;

/// API configuration constants.
pub mod api {
    use std::time::Duration;

    /// Base URL for the OpenAlex API.
    pub const BASE_URL: &str = "https://api.openalex.org";

    /// Results per page (OpenAlex maximum).
    pub const PER_PAGE: u32 = 200;

    /// Request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Requests per second across all concurrent scopes (polite pool allows 10).
    pub const REQUESTS_PER_SECOND: u32 = 8;

    /// Retries for transient failures on a single page.
    pub const MAX_RETRIES: u32 = 3;

    /// Lower bound of the exponential backoff schedule.
    pub const BACKOFF_MIN: Duration = Duration::from_secs(1);

    /// Upper bound of the exponential backoff schedule.
    pub const BACKOFF_MAX: Duration = Duration::from_secs(30);

    /// Rate-limit suspensions tolerated on a single page.
    pub const MAX_RATE_LIMIT_WAITS: u32 = 5;

    /// Ceiling applied to server-advised `Retry-After` intervals.
    pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(120);

    /// Fallback when a 429 carries no usable `Retry-After`.
    pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

    /// Concurrent scope fetches.
    pub const WORKERS: usize = 4;

    /// Maximum keepalive connections.
    pub const MAX_KEEPALIVE: usize = 10;

    /// Keepalive expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);
}

/// Text-transform service defaults for research agenda extraction.
pub mod agenda {
    /// OpenAI-compatible API base URL.
    pub const BASE_URL: &str = "https://api.openai.com/v1";

    /// Chat model.
    pub const MODEL: &str = "gpt-4o-mini";

    /// Papers sent per author, most recent first.
    pub const MAX_PAPERS: usize = 10;

    /// Abstract characters sent per paper.
    pub const MAX_ABSTRACT_CHARS: usize = 500;
}

/// Journals known to the engine, keyed by short venue code.
pub mod venues {
    /// A journal tracked by the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Venue {
        /// Short code used in scopes and the store (e.g. `jf`).
        pub code: &'static str,
        /// Display name.
        pub name: &'static str,
        /// OpenAlex source id.
        pub source_id: &'static str,
    }

    /// Venue code assigned to working papers.
    pub const WORKING_PAPERS: &str = "wp";

    pub const ALL: &[Venue] = &[
        Venue { code: "jf", name: "The Journal of Finance", source_id: "S5353659" },
        Venue { code: "rfs", name: "Review of Financial Studies", source_id: "S170137484" },
        Venue { code: "jfe", name: "Journal of Financial Economics", source_id: "S149240962" },
        Venue { code: "aer", name: "American Economic Review", source_id: "S23254222" },
        Venue { code: "qje", name: "Quarterly Journal of Economics", source_id: "S203860005" },
    ];

    /// The three top finance journals.
    pub const TOP3: &[&str] = &["jf", "rfs", "jfe"];

    /// Look up a venue by code (case-insensitive).
    #[must_use]
    pub fn find(code: &str) -> Option<&'static Venue> {
        ALL.iter().find(|v| v.code.eq_ignore_ascii_case(code))
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL for the OpenAlex API (overridable for mock servers).
    pub api_base_url: String,

    /// Contact email for the OpenAlex polite pool (optional).
    pub mailto: Option<String>,

    /// Path of the SQLite store.
    pub db_path: PathBuf,

    /// Results per page.
    pub per_page: u32,

    /// Request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Global request rate; `0` disables the limiter.
    pub requests_per_second: u32,

    /// Retries for transient page failures.
    pub max_retries: u32,

    /// Backoff lower bound.
    pub backoff_min: Duration,

    /// Backoff upper bound.
    pub backoff_max: Duration,

    /// Rate-limit suspensions tolerated per page.
    pub max_rate_limit_waits: u32,

    /// Ceiling for a single rate-limit suspension.
    pub max_rate_limit_wait: Duration,

    /// Concurrent scope fetches.
    pub workers: usize,

    /// API key for the agenda text-transform service.
    pub openai_api_key: Option<String>,

    /// Base URL for the agenda text-transform service.
    pub openai_base_url: String,

    /// Model used for agenda extraction.
    pub openai_model: String,
}

impl Config {
    /// Create a configuration with production defaults.
    #[must_use]
    pub fn new(mailto: Option<String>) -> Self {
        Self {
            api_base_url: api::BASE_URL.to_string(),
            mailto,
            db_path: PathBuf::from("out/data/finrank.db"),
            per_page: api::PER_PAGE,
            request_timeout: api::REQUEST_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
            requests_per_second: api::REQUESTS_PER_SECOND,
            max_retries: api::MAX_RETRIES,
            backoff_min: api::BACKOFF_MIN,
            backoff_max: api::BACKOFF_MAX,
            max_rate_limit_waits: api::MAX_RATE_LIMIT_WAITS,
            max_rate_limit_wait: api::MAX_RATE_LIMIT_WAIT,
            workers: api::WORKERS,
            openai_api_key: None,
            openai_base_url: agenda::BASE_URL.to_string(),
            openai_model: agenda::MODEL.to_string(),
        }
    }

    /// Create a test configuration pointed at a mock server.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            api_base_url: base_url.to_string(),
            mailto: None,
            db_path: PathBuf::from(":memory:"),
            per_page: 2,
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            requests_per_second: 0, // No limiter in tests
            max_retries: 2,
            backoff_min: Duration::from_millis(1),
            backoff_max: Duration::from_millis(5),
            max_rate_limit_waits: 2,
            max_rate_limit_wait: Duration::from_millis(20),
            workers: 2,
            openai_api_key: Some("test-key".to_string()),
            openai_base_url: base_url.to_string(),
            openai_model: agenda::MODEL.to_string(),
        }
    }

    /// Create configuration from environment variables (and a `.env` file if present).
    ///
    /// # Errors
    ///
    /// Returns error if environment variables are invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::new(std::env::var("OPENALEX_MAILTO").ok());

        if let Ok(base) = std::env::var("OPENALEX_BASE_URL") {
            url::Url::parse(&base)
                .map_err(|e| anyhow::anyhow!("invalid OPENALEX_BASE_URL '{base}': {e}"))?;
            config.api_base_url = base.trim_end_matches('/').to_string();
        }
        if let Ok(path) = std::env::var("FINRANK_DB") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(workers) = std::env::var("FINRANK_WORKERS") {
            config.workers = workers
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid FINRANK_WORKERS '{workers}': {e}"))?;
        }
        config.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.openai_model = model;
        }

        Ok(config)
    }

    /// Check if a polite-pool contact email is configured.
    #[must_use]
    pub const fn has_mailto(&self) -> bool {
        self.mailto.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None)
    }
}
