//! Raw OpenAlex payload shapes.
//!
//! Every field is optional: the API omits or nulls fields freely, and
//! validation happens in [`crate::normalize`], not here.

use std::collections::HashMap;

use serde::Deserialize;

/// One page of the `/works` listing.
///
/// Records stay as raw JSON so one bad record cannot fail the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorksPage {
    /// Pagination metadata.
    #[serde(default)]
    pub meta: PageMeta,

    /// Raw work records.
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// Listing metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    /// Total matching records.
    #[serde(default)]
    pub count: Option<u64>,

    /// Cursor of the next page; absent on the last page.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// An OpenAlex work record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWork {
    /// Work URL id (`https://openalex.org/W...`).
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub publication_year: Option<i32>,

    /// ISO date (`YYYY-MM-DD`).
    #[serde(default)]
    pub publication_date: Option<String>,

    #[serde(default)]
    pub doi: Option<String>,

    /// OpenAlex work type (`article`, `preprint`, `report`, ...).
    #[serde(default, rename = "type")]
    pub work_type: Option<String>,

    #[serde(default)]
    pub cited_by_count: Option<i64>,

    #[serde(default)]
    pub authorships: Option<Vec<RawAuthorship>>,

    /// Abstract as word -> positions.
    #[serde(default)]
    pub abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,

    #[serde(default)]
    pub primary_location: Option<RawLocation>,
}

/// One author slot on a work.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuthorship {
    #[serde(default)]
    pub author: Option<RawAuthor>,

    #[serde(default)]
    pub institutions: Option<Vec<RawInstitution>>,

    /// Name exactly as printed on the work.
    #[serde(default)]
    pub raw_author_name: Option<String>,
}

/// Author reference inside an authorship.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub orcid: Option<String>,
}

/// Institution reference inside an authorship.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInstitution {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Where a work is hosted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLocation {
    #[serde(default)]
    pub source: Option<RawSource>,
}

/// Host source (journal, repository, working paper series).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSource {
    #[serde(default)]
    pub display_name: Option<String>,
}
