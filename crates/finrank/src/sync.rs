//! Sync engine: fetch, normalize and write a set of scopes.
//!
//! Scopes are fetched concurrently by a fixed-size worker pool; pages flow
//! over a bounded channel to a single writer that commits one transaction
//! per page. A failed scope is recorded and the run continues; a store
//! failure aborts the run.

use futures::{StreamExt, stream};
use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{OpenAlexClient, Page, Pager, RetryBudget};
use crate::config::Config;
use crate::config::venues::Venue;
use crate::error::{FetchError, SyncError};
use crate::models::FetchScope;
use crate::normalize::normalize_record;
use crate::store::{BatchOutcome, Store, SyncSession};

/// Scopes to sync in one invocation.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub scopes: Vec<FetchScope>,

    /// Refresh citation counts of works already stored.
    pub force: bool,
}

impl SyncPlan {
    /// One scope per (journal, year) pair.
    #[must_use]
    pub fn journals(venues: &[&Venue], years: &[i32], force: bool) -> Self {
        let scopes = venues
            .iter()
            .flat_map(|venue| years.iter().map(|year| FetchScope::journal_year(venue, *year)))
            .collect();
        Self { scopes, force }
    }

    /// One working-paper scope per author external id.
    #[must_use]
    pub fn working_papers<S: AsRef<str>>(author_ids: &[S], since_year: i32, force: bool) -> Self {
        let scopes = author_ids
            .iter()
            .map(|id| FetchScope::working_papers(id.as_ref(), since_year))
            .collect();
        Self { scopes, force }
    }
}

/// A scope that stopped before its last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeFailure {
    pub scope: String,
    pub page: u32,
    /// Cursor to resume from; no committed page is repeated.
    pub cursor: String,
    pub error: String,
}

impl From<&FetchError> for ScopeFailure {
    fn from(e: &FetchError) -> Self {
        Self {
            scope: e.scope.clone(),
            page: e.page,
            cursor: e.cursor.clone(),
            error: e.cause.to_string(),
        }
    }
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub inserted: usize,
    pub skipped: usize,
    pub updated: usize,
    /// Records that failed normalization.
    pub failed: usize,
    /// Pages committed.
    pub pages: usize,
    /// Scopes fetched to their last page.
    pub scopes_completed: usize,
    pub failed_scopes: Vec<ScopeFailure>,
    /// The run stopped early on request.
    pub cancelled: bool,
}

impl SyncReport {
    /// True when every scope completed and the run was not cancelled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_scopes.is_empty() && !self.cancelled
    }

    fn absorb(&mut self, outcome: BatchOutcome) {
        self.inserted += outcome.inserted;
        self.updated += outcome.updated;
        self.skipped += outcome.skipped;
        self.pages += 1;
    }
}

enum ScopeEvent {
    Page(Page),
    Failed(FetchError),
    Finished,
}

/// Drives fetch, normalize and write for a [`SyncPlan`].
#[derive(Debug, Clone)]
pub struct SyncEngine {
    pager: Pager,
    workers: usize,
}

impl SyncEngine {
    #[must_use]
    pub fn new(client: OpenAlexClient, config: &Config) -> Self {
        Self { pager: Pager::new(client, RetryBudget::from_config(config)), workers: config.workers }
    }

    /// Override the worker-pool size.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Run a plan against the store.
    ///
    /// Holds the store's writer session for the whole run.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the writer session cannot be acquired or a
    /// page fails to commit. Pages committed before the failure stay.
    pub async fn run(
        &self,
        store: &Store,
        plan: SyncPlan,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let session = store.begin_sync()?;
        let workers = self.workers.max(1);
        let force = plan.force;
        let scope_count = plan.scopes.len();

        tracing::info!(scopes = scope_count, workers, force, "Starting sync");

        let (tx, mut rx) = mpsc::channel::<ScopeEvent>(workers * 2);
        let fetch_cancel = cancel.child_token();

        // Each scope runs as its own task so fetching continues while the
        // writer holds a thread for a commit.
        let producers = {
            let fetch_cancel = fetch_cancel.clone();
            let pager = self.pager.clone();
            async move {
                stream::iter(plan.scopes)
                    .map(|scope| {
                        tokio::spawn(fetch_scope(
                            pager.clone(),
                            scope,
                            tx.clone(),
                            fetch_cancel.clone(),
                        ))
                    })
                    .buffer_unordered(workers)
                    .for_each(|joined| async move {
                        if let Err(e) = joined {
                            tracing::error!(error = %e, "Fetch worker panicked");
                        }
                    })
                    .await;
            }
        };

        let writer = async move {
            let mut report = SyncReport::default();
            while let Some(event) = rx.recv().await {
                if cancel.is_cancelled() {
                    break;
                }
                match event {
                    ScopeEvent::Page(page) => {
                        let written = off_runtime(|| write_page(&session, &page, force, &mut report));
                        if let Err(e) = written {
                            fetch_cancel.cancel();
                            return Err(e);
                        }
                    }
                    ScopeEvent::Failed(e) => {
                        tracing::warn!(
                            scope = %e.scope,
                            page = e.page,
                            cursor = %e.cursor,
                            error = %e.cause,
                            "Scope failed"
                        );
                        report.failed_scopes.push(ScopeFailure::from(&e));
                    }
                    ScopeEvent::Finished => report.scopes_completed += 1,
                }
            }
            report.cancelled = cancel.is_cancelled();
            Ok(report)
        };

        let ((), result) = tokio::join!(producers, writer);
        let report = result?;

        tracing::info!(
            inserted = report.inserted,
            skipped = report.skipped,
            updated = report.updated,
            failed = report.failed,
            pages = report.pages,
            failed_scopes = report.failed_scopes.len(),
            cancelled = report.cancelled,
            "Sync finished"
        );
        Ok(report)
    }
}

/// Page through one scope, forwarding each page to the writer.
async fn fetch_scope(
    pager: Pager,
    scope: FetchScope,
    tx: mpsc::Sender<ScopeEvent>,
    cancel: CancellationToken,
) {
    let label = scope.label.clone();
    let mut pages = std::pin::pin!(pager.pages(scope));

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(scope = %label, "Fetch abandoned");
                return;
            }
            next = pages.next() => next,
        };

        let event = match next {
            Some(Ok(page)) => ScopeEvent::Page(page),
            Some(Err(e)) => ScopeEvent::Failed(e),
            None => ScopeEvent::Finished,
        };
        let last = !matches!(event, ScopeEvent::Page(_));

        // Writer gone: the run is over.
        if tx.send(event).await.is_err() || last {
            return;
        }
    }
}

/// Run blocking store work without stalling fetch workers.
///
/// `block_in_place` is only available on the multi-threaded runtime; a
/// current-thread runtime has no other workers to stall, so `f` runs inline.
fn off_runtime<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Normalize a page and commit it in one transaction.
fn write_page(
    session: &SyncSession<'_>,
    page: &Page,
    force: bool,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    let mut works = Vec::with_capacity(page.records.len());
    for record in &page.records {
        match normalize_record(record, &page.scope) {
            Ok(work) => works.push(work),
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    scope = %page.scope.label,
                    page = page.number,
                    record_id = e.record_id.as_deref().unwrap_or("<none>"),
                    reason = %e.reason,
                    "Skipping malformed record"
                );
            }
        }
    }

    let outcome = session.write_page(&works, force)?;
    tracing::debug!(
        scope = %page.scope.label,
        page = page.number,
        inserted = outcome.inserted,
        updated = outcome.updated,
        skipped = outcome.skipped,
        "Committed page"
    );
    report.absorb(outcome);
    Ok(())
}
