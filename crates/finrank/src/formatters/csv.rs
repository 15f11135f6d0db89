//! Flat delimited exports.

use std::borrow::Cow;

use crate::error::ExportError;
use crate::models::StoredWork;
use crate::ranking::RankingRow;

const RANKING_HEADER: [&str; 8] = [
    "rank",
    "author",
    "author_id",
    "external_id",
    "papers",
    "citations",
    "latest_paper",
    "latest_date",
];

const WORK_HEADER: [&str; 10] = [
    "external_id",
    "title",
    "authors",
    "year",
    "publication_date",
    "venue",
    "kind",
    "citations",
    "doi",
    "location",
];

/// Format ranking rows as CSV with a header row.
pub fn format_rankings_csv(rows: &[RankingRow]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RANKING_HEADER)?;

    for row in rows {
        writer.write_record([
            row.rank.to_string(),
            guard(&row.author).into_owned(),
            row.author_id.to_string(),
            row.external_id.clone().unwrap_or_default(),
            row.paper_count.to_string(),
            row.total_citations.to_string(),
            guard(row.latest_title.as_deref().unwrap_or_default()).into_owned(),
            row.latest_date.clone().unwrap_or_default(),
        ])?;
    }

    finish(writer)
}

/// Format works as CSV with a header row.
pub fn format_works_csv(works: &[StoredWork]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(WORK_HEADER)?;

    for work in works {
        writer.write_record([
            work.external_id.clone(),
            guard(&work.title).into_owned(),
            guard(&work.author_names()).into_owned(),
            work.year.to_string(),
            work.publication_date.clone().unwrap_or_default(),
            work.venue.clone(),
            work.kind.as_str().to_string(),
            work.citation_count.to_string(),
            work.doi.clone().unwrap_or_default(),
            guard(work.location.as_deref().unwrap_or_default()).into_owned(),
        ])?;
    }

    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Prefix cells a spreadsheet would evaluate as a formula.
#[must_use]
pub fn guard(cell: &str) -> Cow<'_, str> {
    if cell.starts_with(['=', '+', '-', '@']) {
        Cow::Owned(format!("'{cell}"))
    } else {
        Cow::Borrowed(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard() {
        assert_eq!(guard("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(guard("+1"), "'+1");
        assert_eq!(guard("-x"), "'-x");
        assert_eq!(guard("@cmd"), "'@cmd");
        assert_eq!(guard("Jane Doe"), "Jane Doe");
        assert!(matches!(guard("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_empty_rankings_has_header() {
        let csv = format_rankings_csv(&[]).unwrap();
        assert_eq!(csv, "rank,author,author_id,external_id,papers,citations,latest_paper,latest_date\n");
    }
}
