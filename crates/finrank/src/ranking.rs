//! Author leaderboards.
//!
//! Reads only from the store. Rows are ordered by the requested metric,
//! then the other metric, then canonical name, then author id, so equal
//! inputs always produce the same ranking.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rusqlite::params_from_iter;
use serde::Serialize;

use crate::error::StoreResult;
use crate::models::{RankMetric, RankScope};
use crate::store::{Store, scope_filter};

/// One leaderboard entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingRow {
    /// 1-based, strictly increasing, never shared.
    pub rank: usize,
    pub author_id: i64,
    pub author: String,
    pub external_id: Option<String>,
    pub paper_count: u64,
    pub total_citations: u64,
    /// Most recent work in scope.
    pub latest_title: Option<String>,
    pub latest_date: Option<String>,
    /// Works in scope per publication year.
    pub papers_by_year: BTreeMap<i32, u64>,
}

/// Aggregated statistics of one author within a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorStats {
    pub author_id: i64,
    pub name: String,
    pub external_id: Option<String>,
    pub paper_count: u64,
    pub total_citations: u64,
    pub latest_title: Option<String>,
    pub latest_date: Option<String>,
    /// Sort key of the latest work: (year, date).
    latest_key: (i32, String),
    pub papers_by_year: BTreeMap<i32, u64>,
}

impl AuthorStats {
    /// Fresh stats for an author with no works counted yet.
    #[must_use]
    pub fn new(author_id: i64, name: impl Into<String>) -> Self {
        Self { author_id, name: name.into(), ..Self::default() }
    }

    /// Count one work.
    pub fn add_work(&mut self, year: i32, date: Option<&str>, title: &str, citations: u64) {
        self.paper_count += 1;
        self.total_citations += citations;
        *self.papers_by_year.entry(year).or_default() += 1;

        let key = (year, date.unwrap_or_default().to_string());
        if self.latest_title.is_none() || key > self.latest_key {
            self.latest_key = key;
            self.latest_title = Some(title.to_string());
            self.latest_date = date.map(str::to_string).or_else(|| Some(year.to_string()));
        }
    }

    fn metric(&self, metric: RankMetric) -> u64 {
        match metric {
            RankMetric::PaperCount => self.paper_count,
            RankMetric::TotalCitations => self.total_citations,
        }
    }
}

/// Compare two authors for leaderboard order.
#[must_use]
pub fn compare(a: &AuthorStats, b: &AuthorStats, metric: RankMetric) -> Ordering {
    b.metric(metric)
        .cmp(&a.metric(metric))
        .then_with(|| b.metric(metric.other()).cmp(&a.metric(metric.other())))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.author_id.cmp(&b.author_id))
}

/// Sort stats, keep the first `top_n`, and assign ranks.
#[must_use]
pub fn order_rows(mut stats: Vec<AuthorStats>, metric: RankMetric, top_n: usize) -> Vec<RankingRow> {
    stats.sort_by(|a, b| compare(a, b, metric));
    stats
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, s)| RankingRow {
            rank: i + 1,
            author_id: s.author_id,
            author: s.name,
            external_id: s.external_id,
            paper_count: s.paper_count,
            total_citations: s.total_citations,
            latest_title: s.latest_title,
            latest_date: s.latest_date,
            papers_by_year: s.papers_by_year,
        })
        .collect()
}

/// Rank authors within a scope.
///
/// Returns at most `top_n` rows; an empty scope yields no rows.
pub fn rank(
    store: &Store,
    scope: &RankScope,
    metric: RankMetric,
    top_n: usize,
) -> StoreResult<Vec<RankingRow>> {
    let stats = author_stats(store, scope)?;
    tracing::debug!(scope = %scope.label(), authors = stats.len(), %metric, top_n, "Ranking");
    Ok(order_rows(stats, metric, top_n))
}

/// Aggregate per-author statistics for every author with works in scope.
pub fn author_stats(store: &Store, scope: &RankScope) -> StoreResult<Vec<AuthorStats>> {
    let conn = store.lock()?;
    let (filter, values) = scope_filter(scope);
    let sql = format!(
        "SELECT a.id, a.canonical_name, a.external_id, w.year, w.publication_date, w.title,
                w.citation_count
         FROM works w
         JOIN work_authors wa ON wa.work_id = w.id
         JOIN authors a ON a.id = wa.author_id
         WHERE 1 = 1{filter}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut by_author: HashMap<i64, AuthorStats> = HashMap::new();

    while let Some(row) = rows.next()? {
        let author_id: i64 = row.get(0)?;
        let stats = match by_author.entry(author_id) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let mut fresh = AuthorStats::new(author_id, row.get::<_, String>(1)?);
                fresh.external_id = row.get(2)?;
                e.insert(fresh)
            }
        };
        let date: Option<String> = row.get(4)?;
        let title: String = row.get(5)?;
        let citations: i64 = row.get(6)?;
        stats.add_work(row.get(3)?, date.as_deref(), &title, citations.max(0) as u64);
    }

    Ok(by_author.into_values().collect())
}
