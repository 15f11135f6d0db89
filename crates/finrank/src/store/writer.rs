//! Incremental upserts.

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use super::identity;
use crate::error::{StoreError, StoreResult};
use crate::models::NormalizedWork;

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// New work inserted with its authors.
    Inserted,
    /// Existing work; citation count and retrieval time refreshed.
    Updated,
    /// Existing work left untouched.
    Skipped,
}

/// Per-page upsert tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl BatchOutcome {
    pub(crate) fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Insert a new work, or skip/refresh an existing one.
///
/// Author resolution runs only for new works, so a skipped work never
/// touches author rows.
pub(crate) fn upsert(
    conn: &Connection,
    work: &NormalizedWork,
    force: bool,
    now: &str,
) -> StoreResult<UpsertOutcome> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM works WHERE external_id = ?1", [&work.external_id], |row| {
            row.get(0)
        })
        .optional()?;

    if let Some(work_id) = existing {
        if !force {
            return Ok(UpsertOutcome::Skipped);
        }
        conn.execute(
            "UPDATE works SET citation_count = ?2, retrieved_at = ?3 WHERE id = ?1",
            params![work_id, work.citation_count as i64, now],
        )?;
        return Ok(UpsertOutcome::Updated);
    }

    let inserted = conn.execute(
        "INSERT INTO works (external_id, title, year, publication_date, venue, kind, doi,
                            abstract, location, citation_count, retrieved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            work.external_id,
            work.title,
            work.year,
            work.publication_date,
            work.venue,
            work.kind.as_str(),
            work.doi,
            work.abstract_text,
            work.location,
            work.citation_count as i64,
            now,
        ],
    );
    if let Err(e) = inserted {
        return Err(if is_constraint_violation(&e) {
            StoreError::conflict(format!("work {} was inserted by another writer", work.external_id))
        } else {
            e.into()
        });
    }
    let work_id = conn.last_insert_rowid();

    for (position, mention) in work.authors.iter().enumerate() {
        let author_id = identity::resolve(conn, mention, now)?;
        conn.execute(
            "INSERT OR IGNORE INTO work_authors (work_id, author_id, position) VALUES (?1, ?2, ?3)",
            params![work_id, author_id, position as i64],
        )?;
    }

    Ok(UpsertOutcome::Inserted)
}

pub(crate) fn save_agenda(
    conn: &Connection,
    author_id: i64,
    summary: &str,
    source: &str,
    now: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO agendas (author_id, summary, source, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(author_id) DO UPDATE SET
             summary = excluded.summary,
             source = excluded.source,
             updated_at = excluded.updated_at",
        params![author_id, summary, source, now],
    )?;
    Ok(())
}

pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ffi::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorMention, WorkKind};
    use crate::store::Store;

    fn work(id: &str, citations: u64, authors: Vec<AuthorMention>) -> NormalizedWork {
        NormalizedWork {
            external_id: id.to_string(),
            title: format!("Title {id}"),
            year: 2024,
            publication_date: Some("2024-03-01".to_string()),
            venue: "jf".to_string(),
            kind: WorkKind::Article,
            doi: None,
            abstract_text: None,
            location: None,
            citation_count: citations,
            authors,
        }
    }

    #[test]
    fn test_insert_skip_update() {
        let store = Store::open_in_memory().unwrap();
        let session = store.begin_sync().unwrap();
        let w = work("W1", 5, vec![AuthorMention::new("Jane Doe", &["MIT"])]);

        assert_eq!(session.upsert(&w, false).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(session.upsert(&w, false).unwrap(), UpsertOutcome::Skipped);

        let refreshed = work("W1", 9, vec![]);
        assert_eq!(session.upsert(&refreshed, true).unwrap(), UpsertOutcome::Updated);

        let stored = store.work_by_external_id("W1").unwrap().unwrap();
        assert_eq!(stored.citation_count, 9);
        assert_eq!(stored.authors, vec!["Jane Doe"]);
    }

    #[test]
    fn test_duplicate_mentions_link_once() {
        let store = Store::open_in_memory().unwrap();
        let session = store.begin_sync().unwrap();
        let jane = AuthorMention::new("Jane Doe", &["MIT"]);
        let w = work("W1", 0, vec![jane.clone(), jane]);

        session.upsert(&w, false).unwrap();
        assert_eq!(store.work_by_external_id("W1").unwrap().unwrap().authors.len(), 1);
    }

    #[test]
    fn test_batch_outcome_tally() {
        let store = Store::open_in_memory().unwrap();
        let session = store.begin_sync().unwrap();
        let page = vec![work("W1", 1, vec![]), work("W2", 2, vec![]), work("W1", 1, vec![])];

        let outcome = session.write_page(&page, false).unwrap();
        assert_eq!(outcome, BatchOutcome { inserted: 2, updated: 0, skipped: 1 });
    }

    #[test]
    fn test_constraint_violation_detection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x TEXT UNIQUE); INSERT INTO t VALUES ('a');").unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(is_constraint_violation(&err));
    }
}
