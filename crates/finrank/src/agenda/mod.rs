//! Research agenda extraction.
//!
//! Sends an author's recent titles and abstracts to a text-transform
//! service and stores the returned summary verbatim. A service failure is
//! recorded against that author and the batch moves on.

mod keywords;
mod openai;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::agenda::{MAX_ABSTRACT_CHARS, MAX_PAPERS};
use crate::error::{AgendaError, StoreError};
use crate::models::AuthorPaper;
use crate::ranking::RankingRow;
use crate::store::Store;

pub use keywords::KeywordAgendaService;
pub use openai::OpenAiAgendaService;

/// A service turning an author's papers into a short agenda summary.
#[async_trait]
pub trait AgendaService: Send + Sync {
    /// Name recorded alongside stored summaries.
    fn name(&self) -> &'static str;

    /// Summarize the research agenda behind `papers`.
    async fn summarize(&self, author: &str, papers: &[AuthorPaper]) -> Result<String, AgendaError>;
}

/// An author the service failed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaFailure {
    pub author_id: i64,
    pub author: String,
    pub error: String,
}

/// A summary produced in this batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaEntry {
    pub author_id: i64,
    pub author: String,
    pub summary: String,
}

/// Outcome of an agenda batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgendaReport {
    pub source: String,
    pub summarized: Vec<AgendaEntry>,
    pub failures: Vec<AgendaFailure>,
}

/// Prepare an author's papers for a service: most recent first, capped, abstracts truncated.
#[must_use]
pub fn prepare_papers(mut papers: Vec<AuthorPaper>) -> Vec<AuthorPaper> {
    papers.truncate(MAX_PAPERS);
    for paper in &mut papers {
        if let Some(text) = paper.abstract_text.as_mut() {
            if let Some((cut, _)) = text.char_indices().nth(MAX_ABSTRACT_CHARS) {
                text.truncate(cut);
            }
        }
    }
    papers
}

/// Extract and store agendas for ranked authors.
///
/// Holds the store's writer session for the duration of the batch.
///
/// # Errors
///
/// Returns [`StoreError`] if the writer session is unavailable or a read or
/// write fails; service failures are reported in [`AgendaReport::failures`].
pub async fn extract_agendas(
    store: &Store,
    service: &dyn AgendaService,
    authors: &[RankingRow],
) -> Result<AgendaReport, StoreError> {
    let session = store.begin_sync()?;
    let mut report = AgendaReport { source: service.name().to_string(), ..AgendaReport::default() };

    tracing::info!(authors = authors.len(), service = service.name(), "Extracting agendas");

    for row in authors {
        let papers = prepare_papers(store.author_papers(row.author_id, MAX_PAPERS)?);

        match service.summarize(&row.author, &papers).await {
            Ok(summary) => {
                session.save_agenda(row.author_id, &summary, service.name())?;
                tracing::debug!(author = %row.author, %summary, "Stored agenda");
                report.summarized.push(AgendaEntry {
                    author_id: row.author_id,
                    author: row.author.clone(),
                    summary,
                });
            }
            Err(e) => {
                tracing::warn!(author = %row.author, error = %e, "Agenda extraction failed");
                report.failures.push(AgendaFailure {
                    author_id: row.author_id,
                    author: row.author.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}
