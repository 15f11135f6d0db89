//! Read-side queries.

use std::collections::BTreeMap;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;

use super::Store;
use crate::error::StoreResult;
use crate::models::{Agenda, Author, AuthorPaper, RankScope, StoredWork, WorkKind, YearFilter};

const WORK_COLUMNS: &str = "w.id, w.external_id, w.title, w.year, w.publication_date, w.venue, \
                            w.kind, w.doi, w.location, w.citation_count, w.retrieved_at";

/// Store-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub works: u64,
    pub articles: u64,
    pub working_papers: u64,
    pub authors: u64,
    pub agendas: u64,
    /// Work count per venue code.
    pub by_venue: BTreeMap<String, u64>,
    /// Most recent retrieval timestamp.
    pub last_retrieved: Option<String>,
}

/// Build an `AND ...` clause restricting works aliased `w` to a scope.
///
/// Returns an empty clause for an unrestricted scope.
pub(crate) fn scope_filter(scope: &RankScope) -> (String, Vec<Value>) {
    let mut clause = String::new();
    let mut values = Vec::new();

    if !scope.venues.is_empty() {
        let marks = vec!["?"; scope.venues.len()].join(", ");
        clause.push_str(&format!(" AND w.venue IN ({marks})"));
        values.extend(scope.venues.iter().cloned().map(Value::Text));
    }
    if let YearFilter::Only(years) = &scope.years {
        let marks = vec!["?"; years.len()].join(", ");
        clause.push_str(&format!(" AND w.year IN ({marks})"));
        values.extend(years.iter().map(|y| Value::Integer(i64::from(*y))));
    }

    (clause, values)
}

impl Store {
    /// Store-wide counts.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> StoreResult<u64> {
            Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))? as u64)
        };

        let mut stats = StoreStats {
            works: count("SELECT COUNT(*) FROM works")?,
            articles: count("SELECT COUNT(*) FROM works WHERE kind = 'article'")?,
            working_papers: count("SELECT COUNT(*) FROM works WHERE kind = 'working_paper'")?,
            authors: count("SELECT COUNT(*) FROM authors")?,
            agendas: count("SELECT COUNT(*) FROM agendas")?,
            ..StoreStats::default()
        };

        let mut stmt = conn.prepare("SELECT venue, COUNT(*) FROM works GROUP BY venue")?;
        for row in stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))? {
            let (venue, n) = row?;
            stats.by_venue.insert(venue, n as u64);
        }
        stats.last_retrieved =
            conn.query_row("SELECT MAX(retrieved_at) FROM works", [], |row| row.get(0))?;

        Ok(stats)
    }

    /// Look up a work by its external id.
    pub fn work_by_external_id(&self, external_id: &str) -> StoreResult<Option<StoredWork>> {
        let conn = self.lock()?;
        let work = conn
            .query_row(
                &format!("SELECT {WORK_COLUMNS} FROM works w WHERE w.external_id = ?1"),
                [external_id],
                work_from_row,
            )
            .optional()?;
        work.map(|w| with_authors(&conn, w)).transpose()
    }

    /// Works in scope, newest first.
    pub fn list_works(&self, scope: &RankScope) -> StoreResult<Vec<StoredWork>> {
        let conn = self.lock()?;
        let (filter, values) = scope_filter(scope);
        let sql = format!(
            "SELECT {WORK_COLUMNS} FROM works w WHERE 1 = 1{filter}
             ORDER BY w.year DESC, w.publication_date DESC, w.venue, w.external_id"
        );

        let mut stmt = conn.prepare(&sql)?;
        let works = stmt
            .query_map(params_from_iter(values), work_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        works.into_iter().map(|w| with_authors(&conn, w)).collect()
    }

    /// Resolved author ids of a work, in byline order.
    pub fn work_author_ids(&self, work_id: i64) -> StoreResult<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached("SELECT author_id FROM work_authors WHERE work_id = ?1 ORDER BY position")?;
        let ids = stmt.query_map([work_id], |row| row.get(0))?.collect::<Result<_, _>>()?;
        Ok(ids)
    }

    /// Look up an author by store id.
    pub fn author(&self, author_id: i64) -> StoreResult<Option<Author>> {
        let conn = self.lock()?;
        load_author(&conn, "a.id = ?1", [author_id])
    }

    /// Look up an author by external author id.
    pub fn author_by_external_id(&self, external_id: &str) -> StoreResult<Option<Author>> {
        let conn = self.lock()?;
        load_author(&conn, "a.external_id = ?1", [external_id])
    }

    /// All authors, oldest first.
    pub fn authors(&self) -> StoreResult<Vec<Author>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT a.id, a.canonical_name, a.external_id, a.orcid FROM authors a ORDER BY a.id",
        )?;
        let authors = stmt.query_map([], author_from_row)?.collect::<Result<Vec<_>, _>>()?;
        authors.into_iter().map(|a| with_variants(&conn, a)).collect()
    }

    /// An author's most recent works with their abstracts.
    pub fn author_papers(&self, author_id: i64, limit: usize) -> StoreResult<Vec<AuthorPaper>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT w.title, w.abstract, w.year, w.publication_date, w.citation_count
             FROM works w JOIN work_authors wa ON wa.work_id = w.id
             WHERE wa.author_id = ?1
             ORDER BY w.year DESC, w.publication_date IS NULL, w.publication_date DESC, w.id DESC
             LIMIT ?2",
        )?;
        let papers = stmt
            .query_map(params![author_id, limit as i64], |row| {
                Ok(AuthorPaper {
                    title: row.get(0)?,
                    abstract_text: row.get(1)?,
                    year: row.get(2)?,
                    publication_date: row.get(3)?,
                    citation_count: row.get::<_, i64>(4)?.max(0) as u64,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(papers)
    }

    /// Stored agenda of an author.
    pub fn agenda(&self, author_id: i64) -> StoreResult<Option<Agenda>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT author_id, summary, source, updated_at FROM agendas WHERE author_id = ?1",
                [author_id],
                agenda_from_row,
            )
            .optional()?)
    }

    /// All stored agendas.
    pub fn agendas(&self) -> StoreResult<Vec<Agenda>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT author_id, summary, source, updated_at FROM agendas ORDER BY author_id",
        )?;
        let agendas = stmt.query_map([], agenda_from_row)?.collect::<Result<_, _>>()?;
        Ok(agendas)
    }
}

fn work_from_row(row: &Row<'_>) -> rusqlite::Result<StoredWork> {
    let kind: String = row.get(6)?;
    Ok(StoredWork {
        id: row.get(0)?,
        external_id: row.get(1)?,
        title: row.get(2)?,
        year: row.get(3)?,
        publication_date: row.get(4)?,
        venue: row.get(5)?,
        kind: WorkKind::parse(&kind).unwrap_or_default(),
        doi: row.get(7)?,
        location: row.get(8)?,
        citation_count: row.get::<_, i64>(9)?.max(0) as u64,
        retrieved_at: row.get(10)?,
        authors: Vec::new(),
    })
}

fn with_authors(conn: &Connection, mut work: StoredWork) -> StoreResult<StoredWork> {
    let mut stmt = conn.prepare_cached(
        "SELECT a.canonical_name FROM work_authors wa JOIN authors a ON a.id = wa.author_id
         WHERE wa.work_id = ?1 ORDER BY wa.position",
    )?;
    work.authors = stmt.query_map([work.id], |row| row.get(0))?.collect::<Result<_, _>>()?;
    Ok(work)
}

fn author_from_row(row: &Row<'_>) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(0)?,
        canonical_name: row.get(1)?,
        external_id: row.get(2)?,
        orcid: row.get(3)?,
        variants: Vec::new(),
        affiliations: Vec::new(),
    })
}

fn load_author<P: rusqlite::Params>(
    conn: &Connection,
    condition: &str,
    params: P,
) -> StoreResult<Option<Author>> {
    let author = conn
        .query_row(
            &format!(
                "SELECT a.id, a.canonical_name, a.external_id, a.orcid FROM authors a WHERE {condition}"
            ),
            params,
            author_from_row,
        )
        .optional()?;
    author.map(|a| with_variants(conn, a)).transpose()
}

fn with_variants(conn: &Connection, mut author: Author) -> StoreResult<Author> {
    let mut stmt =
        conn.prepare_cached("SELECT name FROM author_variants WHERE author_id = ?1 ORDER BY name")?;
    author.variants = stmt.query_map([author.id], |row| row.get(0))?.collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare_cached(
        "SELECT affiliation FROM author_affiliations WHERE author_id = ?1 ORDER BY affiliation",
    )?;
    author.affiliations = stmt.query_map([author.id], |row| row.get(0))?.collect::<Result<_, _>>()?;
    Ok(author)
}

fn agenda_from_row(row: &Row<'_>) -> rusqlite::Result<Agenda> {
    Ok(Agenda {
        author_id: row.get(0)?,
        summary: row.get(1)?,
        source: row.get(2)?,
        updated_at: row.get(3)?,
    })
}
