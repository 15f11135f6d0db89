//! Raw record normalization.
//!
//! Maps one OpenAlex work record to a [`NormalizedWork`] with per-field
//! validation. Records are parsed one at a time, so a malformed record
//! fails alone and never takes its page down with it.

pub mod names;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::Value;

use crate::error::NormalizationError;
use crate::models::raw::{RawAuthorship, RawWork};
use crate::models::{AuthorMention, FetchScope, NormalizedWork};

const DOI_PREFIXES: &[&str] = &["https://doi.org/", "http://doi.org/", "http://dx.doi.org/", "doi:"];
const ORCID_PREFIXES: &[&str] = &["https://orcid.org/", "http://orcid.org/"];

/// Normalize one raw record fetched under `scope`.
///
/// # Errors
///
/// Returns [`NormalizationError`] when the record has no id, no title, no
/// derivable year, a negative citation count, or fields of the wrong shape.
pub fn normalize_record(
    record: &Value,
    scope: &FetchScope,
) -> Result<NormalizedWork, NormalizationError> {
    let record_id = record.get("id").and_then(Value::as_str).and_then(short_id);

    let raw = RawWork::deserialize(record).map_err(|e| {
        NormalizationError::new(record_id.clone(), format!("invalid record shape: {e}"))
    })?;

    let Some(external_id) = raw.id.as_deref().and_then(short_id) else {
        return Err(NormalizationError::new(None, "missing id"));
    };
    let fail = |reason: &str| NormalizationError::new(Some(external_id.clone()), reason);

    let title = non_blank(raw.title.as_deref())
        .or_else(|| non_blank(raw.display_name.as_deref()))
        .ok_or_else(|| fail("missing title"))?;

    let publication_date = raw
        .publication_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());

    let year = raw
        .publication_year
        .or_else(|| publication_date.map(|d| d.year()))
        .or(scope.year)
        .ok_or_else(|| fail("missing publication year"))?;

    let citation_count = match raw.cited_by_count {
        None => 0,
        Some(n) => u64::try_from(n).map_err(|_| fail("negative cited_by_count"))?,
    };

    let location = raw
        .primary_location
        .as_ref()
        .and_then(|l| l.source.as_ref())
        .and_then(|s| non_blank(s.display_name.as_deref()));

    let authors = raw.authorships.as_deref().unwrap_or_default().iter().filter_map(mention).collect();

    Ok(NormalizedWork {
        external_id,
        title,
        year,
        publication_date: publication_date.map(|d| d.format("%Y-%m-%d").to_string()),
        venue: scope.venue.clone(),
        kind: scope.kind,
        doi: raw.doi.as_deref().and_then(|d| strip_prefixes(d, DOI_PREFIXES)),
        abstract_text: raw.abstract_inverted_index.as_ref().and_then(rebuild_abstract),
        location,
        citation_count,
        authors,
    })
}

/// Strip an OpenAlex URL id down to its short form (`https://openalex.org/W1` -> `W1`).
#[must_use]
pub fn short_id(id: &str) -> Option<String> {
    let id = id.trim().trim_end_matches('/');
    let short = id.rsplit('/').next().unwrap_or(id).trim();
    (!short.is_empty()).then(|| short.to_string())
}

/// Rebuild abstract text from an inverted index (word -> positions).
#[must_use]
pub fn rebuild_abstract<S: std::hash::BuildHasher>(
    index: &std::collections::HashMap<String, Vec<usize>, S>,
) -> Option<String> {
    let mut positioned: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |p| (*p, word.as_str())))
        .collect();
    if positioned.is_empty() {
        return None;
    }
    positioned.sort_unstable();
    let words: Vec<&str> = positioned.into_iter().map(|(_, w)| w).collect();
    Some(words.join(" "))
}

/// Build an author mention; authorships without a usable name are dropped.
fn mention(authorship: &RawAuthorship) -> Option<AuthorMention> {
    let author = authorship.author.as_ref();
    let name = author
        .and_then(|a| non_blank(a.display_name.as_deref()))
        .or_else(|| non_blank(authorship.raw_author_name.as_deref()))?;
    names::parse(&name)?;

    let mut affiliations: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for institution in authorship.institutions.as_deref().unwrap_or_default() {
        if let Some(affiliation) = non_blank(institution.display_name.as_deref()) {
            if seen.insert(names::affiliation_key(&affiliation)) {
                affiliations.push(affiliation);
            }
        }
    }

    Some(AuthorMention {
        name,
        affiliations,
        external_id: author.and_then(|a| a.id.as_deref()).and_then(short_id),
        orcid: author.and_then(|a| a.orcid.as_deref()).and_then(|o| strip_prefixes(o, ORCID_PREFIXES)),
    })
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn strip_prefixes(value: &str, prefixes: &[&str]) -> Option<String> {
    let value = value.trim();
    let stripped = prefixes.iter().find_map(|p| value.strip_prefix(p)).unwrap_or(value);
    non_blank(Some(stripped))
}
