//! JSON output formatting.

use serde_json::{Map, Value, json};

use crate::error::ExportError;
use crate::models::StoredWork;
use crate::ranking::RankingRow;

/// Longest latest-paper title carried into the dashboard document.
const LATEST_PAPER_CHARS: usize = 100;

/// Compact JSON representation of a ranking row.
#[must_use]
pub fn compact_ranking(row: &RankingRow) -> Value {
    let years: Map<String, Value> =
        row.papers_by_year.iter().map(|(year, n)| (year.to_string(), json!(n))).collect();

    let mut obj = json!({
        "rank": row.rank,
        "author": row.author,
        "author_id": row.author_id,
        "papers": row.paper_count,
        "citations": row.total_citations,
        "years": years,
    });

    if let Some(external_id) = &row.external_id {
        obj["external_id"] = json!(external_id);
    }
    if let Some(title) = &row.latest_title {
        obj["latest_paper"] = json!(title);
    }
    if let Some(date) = &row.latest_date {
        obj["latest_date"] = json!(date);
    }

    obj
}

/// Compact JSON representation of a stored work.
#[must_use]
pub fn compact_work(work: &StoredWork) -> Value {
    let mut obj = json!({
        "id": work.external_id,
        "title": work.title,
        "year": work.year,
        "venue": work.venue,
        "kind": work.kind,
        "citations": work.citation_count,
        "authors": work.authors,
    });

    if let Some(date) = &work.publication_date {
        obj["publication_date"] = json!(date);
    }
    if let Some(doi) = &work.doi {
        obj["doi"] = json!(doi);
    }

    obj
}

/// Build the rankings document consumed by the dashboard.
#[must_use]
pub fn rankings_document(
    journals: &[RankingRow],
    working_papers: &[RankingRow],
    last_updated: &str,
) -> Value {
    json!({
        "journals": journals.iter().map(dashboard_ranking).collect::<Vec<_>>(),
        "working_papers": working_papers.iter().map(dashboard_ranking).collect::<Vec<_>>(),
        "last_updated": last_updated,
    })
}

fn dashboard_ranking(row: &RankingRow) -> Value {
    let mut obj = compact_ranking(row);
    if let Some(title) = &row.latest_title {
        if let Some((cut, _)) = title.char_indices().nth(LATEST_PAPER_CHARS) {
            obj["latest_paper"] = json!(&title[..cut]);
        }
    }
    obj
}

/// Pretty-print a JSON value.
pub fn to_pretty(value: &Value) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(value)?)
}
