//! finrank
//!
//! Incremental ingestion of scholarly metadata from OpenAlex into a local
//! SQLite store, with author identity resolution, leaderboards and research
//! agenda extraction for finance and economics journals.
//!
//! # Features
//!
//! - **Concurrent paging**: cursor-paginated scopes fetched by a worker pool
//! - **Rate-limited**: global request rate plus `Retry-After` aware backoff
//! - **Incremental**: works are keyed by OpenAlex id; re-syncs skip or refresh
//! - **Identity resolution**: name variants merged across affiliations
//!
//! # Example
//!
//! ```no_run
//! use finrank::{Config, OpenAlexClient, Store, SyncEngine, SyncPlan};
//! use finrank::config::venues;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Store::open(&config.db_path)?;
//!     let engine = SyncEngine::new(OpenAlexClient::new(&config)?, &config);
//!
//!     let jf = venues::find("jf").into_iter().collect::<Vec<_>>();
//!     let plan = SyncPlan::journals(&jf, &[2024], false);
//!     let report = engine.run(&store, plan, &CancellationToken::new()).await?;
//!     println!("inserted {}", report.inserted);
//!     Ok(())
//! }
//! ```

pub mod agenda;
pub mod client;
pub mod config;
pub mod error;
pub mod formatters;
pub mod models;
pub mod normalize;
pub mod ranking;
pub mod store;
pub mod sync;

pub use client::OpenAlexClient;
pub use config::Config;
pub use error::{ClientError, FetchError, StoreError, SyncError};
pub use store::Store;
pub use sync::{SyncEngine, SyncPlan, SyncReport};
