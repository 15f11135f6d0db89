//! finrank - Entry Point
//!
//! Syncs OpenAlex metadata into the local store and prints leaderboards.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use finrank::agenda::{self, AgendaService, KeywordAgendaService, OpenAiAgendaService};
use finrank::formatters::{self, json};
use finrank::models::{ExportFormat, RankMetric, RankScope, YearFilter, parse_venues, resolve_journals};
use finrank::{Config, OpenAlexClient, Store, SyncEngine, SyncPlan, SyncReport, ranking};

#[derive(Parser, Debug)]
#[command(name = "finrank")]
#[command(about = "OpenAlex ingestion and author rankings for finance journals")]
#[command(version)]
struct Cli {
    /// Path of the SQLite store
    #[arg(long, global = true, env = "FINRANK_DB")]
    db: Option<PathBuf>,

    /// Contact email for the OpenAlex polite pool
    #[arg(long, global = true, env = "OPENALEX_MAILTO")]
    mailto: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch journal articles for venues and years
    Sync {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Refresh citation counts of stored works
        #[arg(long)]
        force: bool,

        /// Concurrent scope fetches
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Fetch recent working papers of top-ranked authors
    WorkingPapers {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Authors to follow
        #[arg(long, default_value_t = 250)]
        top: usize,

        /// First publication year to include
        #[arg(long)]
        since: Option<i32>,

        /// Refresh citation counts of stored works
        #[arg(long)]
        force: bool,
    },
    /// Print an author leaderboard
    Rank {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long, default_value_t = 100)]
        top: usize,

        /// Ranking metric
        #[arg(long, value_enum, default_value_t = RankMetric::PaperCount)]
        by: RankMetric,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// List stored works
    Works {
        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Extract research agendas for top-ranked authors
    Agendas {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long, default_value_t = 20)]
        top: usize,

        /// Use the offline keyword classifier instead of the chat service
        #[arg(long)]
        keywords: bool,
    },
    /// Show store statistics
    Stats,
}

#[derive(Args, Debug)]
struct ScopeArgs {
    /// Venue codes (jf,rfs,jfe,aer,qje), `top3` or `all`
    #[arg(long, default_value = "top3")]
    venues: String,

    /// Years: 2024, 2023-2025, 2021,2024 or `all`
    #[arg(long, default_value = "all")]
    years: YearFilter,
}

impl ScopeArgs {
    fn rank_scope(&self) -> anyhow::Result<RankScope> {
        Ok(RankScope::new(parse_venues(&self.venues)?, self.years.clone()))
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
    format: ExportFormat,

    /// Write to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays clean for exports.
    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting finrank");

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Fatal error");
            ExitCode::FAILURE
        }
    }
}

/// Dispatch a command; `Ok(false)` means it finished with failed scopes.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if cli.mailto.is_some() {
        config.mailto = cli.mailto;
    }

    match cli.command {
        Command::Sync { scope, force, workers } => {
            let years = scope.years.years().ok_or_else(|| {
                anyhow::anyhow!("sync needs explicit years (e.g. --years 2024 or 2020-2024)")
            })?;
            let venues = resolve_journals(&parse_venues(&scope.venues)?)?;
            if let Some(workers) = workers {
                config.workers = workers;
            }

            let plan = SyncPlan::journals(&venues, &years, force);
            let report = sync(&config, plan).await?;
            Ok(report.is_complete())
        }
        Command::WorkingPapers { scope, top, since, force } => {
            let rank_scope = scope.rank_scope()?;
            let since = since.unwrap_or_else(|| default_since(&rank_scope.years));
            let store = Store::open(&config.db_path)?;
            let rows = ranking::rank(&store, &rank_scope, RankMetric::PaperCount, top)?;
            drop(store);

            let author_ids: Vec<String> = rows.into_iter().filter_map(|r| r.external_id).collect();
            if author_ids.is_empty() {
                tracing::warn!(scope = %rank_scope.label(), "No ranked authors with OpenAlex ids");
                return Ok(true);
            }
            tracing::info!(authors = author_ids.len(), since, "Following ranked authors");

            let plan = SyncPlan::working_papers(&author_ids, since, force);
            let report = sync(&config, plan).await?;
            Ok(report.is_complete())
        }
        Command::Rank { scope, top, by, output } => {
            let rank_scope = scope.rank_scope()?;
            let store = open_reader(&config.db_path)?;
            let rows = ranking::rank(&store, &rank_scope, by, top)?;

            let rendered = match output.format {
                ExportFormat::Markdown => {
                    let title = format!("Top authors by {by} ({})", rank_scope.label());
                    formatters::format_rankings_markdown(&title, &rows)
                }
                ExportFormat::Csv => formatters::format_rankings_csv(&rows)?,
                ExportFormat::Json => {
                    let wp_scope = RankScope::new(["wp"], rank_scope.years.clone());
                    let wp_rows = ranking::rank(&store, &wp_scope, by, top)?;
                    let last_updated = store
                        .stats()?
                        .last_retrieved
                        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
                    let journal_rows: Vec<_> = if rank_scope.venues.contains("wp") {
                        let journals: Vec<_> =
                            rank_scope.venues.iter().filter(|v| *v != "wp").cloned().collect();
                        ranking::rank(&store, &RankScope::new(journals, rank_scope.years.clone()), by, top)?
                    } else {
                        rows
                    };
                    json::to_pretty(&json::rankings_document(&journal_rows, &wp_rows, &last_updated))?
                }
            };
            emit(&rendered, output.output.as_deref())?;
            Ok(true)
        }
        Command::Works { scope, output } => {
            let rank_scope = scope.rank_scope()?;
            let store = open_reader(&config.db_path)?;
            let works = store.list_works(&rank_scope)?;

            let rendered = match output.format {
                ExportFormat::Markdown => formatters::format_works_markdown(&works),
                ExportFormat::Csv => formatters::format_works_csv(&works)?,
                ExportFormat::Json => json::to_pretty(&serde_json::Value::Array(
                    works.iter().map(json::compact_work).collect(),
                ))?,
            };
            emit(&rendered, output.output.as_deref())?;
            Ok(true)
        }
        Command::Agendas { scope, top, keywords } => {
            let rank_scope = scope.rank_scope()?;
            let store = Store::open(&config.db_path)?;
            let rows = ranking::rank(&store, &rank_scope, RankMetric::PaperCount, top)?;

            let service: Box<dyn AgendaService> = if keywords {
                Box::new(KeywordAgendaService)
            } else {
                match OpenAiAgendaService::new(&config) {
                    Ok(service) => Box::new(service),
                    Err(e) => {
                        tracing::warn!(error = %e, "Falling back to keyword classification");
                        Box::new(KeywordAgendaService)
                    }
                }
            };

            let report = agenda::extract_agendas(&store, service.as_ref(), &rows).await?;
            print!("{}", formatters::format_agenda_report(&report));
            Ok(true)
        }
        Command::Stats => {
            let store = open_reader(&config.db_path)?;
            print!("{}", formatters::format_stats_markdown(&store.stats()?));
            Ok(true)
        }
    }
}

/// Run a sync plan with Ctrl-C wired to cancellation and print the report.
async fn sync(config: &Config, plan: SyncPlan) -> anyhow::Result<SyncReport> {
    let store = Store::open(&config.db_path)?;
    let engine = SyncEngine::new(OpenAlexClient::new(config)?, config);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight pages");
            on_signal.cancel();
        }
    });

    let report = engine.run(&store, plan, &cancel).await?;
    print!("{}", formatters::format_sync_report(&report));
    Ok(report)
}

/// Open the store read-only when it exists, so reads never contend with a sync.
fn open_reader(path: &Path) -> anyhow::Result<Store> {
    if path.exists() {
        Ok(Store::open_read_only(path)?)
    } else {
        Ok(Store::open(path)?)
    }
}

fn default_since(years: &YearFilter) -> i32 {
    years
        .years()
        .and_then(|ys| ys.into_iter().min())
        .unwrap_or_else(|| chrono::Utc::now().year() - 1)
}

fn emit(rendered: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, rendered)?;
            tracing::info!(path = %path.display(), bytes = rendered.len(), "Wrote export");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
