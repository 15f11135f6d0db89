//! Normalized work and author mention shapes.

use serde::{Deserialize, Serialize};

/// Kind of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    /// Published journal article.
    #[default]
    Article,
    /// Preprint, report or other non-journal work.
    WorkingPaper,
}

impl WorkKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::WorkingPaper => "working_paper",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "article" => Some(Self::Article),
            "working_paper" => Some(Self::WorkingPaper),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A work after per-field validation, before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedWork {
    /// Short OpenAlex id (`W...`).
    pub external_id: String,

    pub title: String,

    pub year: i32,

    pub publication_date: Option<String>,

    /// Venue code (`jf`, `rfs`, ..., or `wp`).
    pub venue: String,

    pub kind: WorkKind,

    pub doi: Option<String>,

    /// Abstract rebuilt from the inverted index.
    pub abstract_text: Option<String>,

    /// Host source display name.
    pub location: Option<String>,

    pub citation_count: u64,

    /// Author mentions in byline order.
    pub authors: Vec<AuthorMention>,
}

/// One author as observed on a raw record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorMention {
    /// Display name string.
    pub name: String,

    /// Affiliation strings, deduplicated, in observed order.
    pub affiliations: Vec<String>,

    /// Short OpenAlex author id (`A...`), if present.
    pub external_id: Option<String>,

    /// Bare ORCID, if present.
    pub orcid: Option<String>,
}

impl AuthorMention {
    /// Convenience constructor for a mention without external ids.
    #[must_use]
    pub fn new(name: impl Into<String>, affiliations: &[&str]) -> Self {
        Self {
            name: name.into(),
            affiliations: affiliations.iter().map(|a| (*a).to_string()).collect(),
            external_id: None,
            orcid: None,
        }
    }

    /// Attach an external author id.
    #[must_use]
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }
}

/// A work as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredWork {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub year: i32,
    pub publication_date: Option<String>,
    pub venue: String,
    pub kind: WorkKind,
    pub doi: Option<String>,
    pub location: Option<String>,
    pub citation_count: u64,
    pub retrieved_at: String,
    /// Canonical names of resolved authors, in byline order.
    pub authors: Vec<String>,
}

impl StoredWork {
    /// Get author names as a comma-separated string.
    #[must_use]
    pub fn author_names(&self) -> String {
        self.authors.join(", ")
    }
}

/// Title and abstract of one of an author's works, as fed to agenda extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorPaper {
    pub title: String,
    pub abstract_text: Option<String>,
    pub year: i32,
    pub publication_date: Option<String>,
    pub citation_count: u64,
}
