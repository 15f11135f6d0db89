//! Canonical author records.

use serde::Serialize;

/// A canonical researcher identity as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    /// Store row id.
    pub id: i64,

    /// First observed name string.
    pub canonical_name: String,

    /// Short OpenAlex author id, if resolvable.
    pub external_id: Option<String>,

    pub orcid: Option<String>,

    /// Observed name variants, sorted.
    pub variants: Vec<String>,

    /// Observed affiliation strings, sorted.
    pub affiliations: Vec<String>,
}

impl Author {
    /// Check whether a name string was ever observed for this author.
    #[must_use]
    pub fn has_variant(&self, name: &str) -> bool {
        self.variants.iter().any(|v| v == name)
    }
}

/// Stored research agenda summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agenda {
    pub author_id: i64,
    pub summary: String,
    /// Name of the service that produced it.
    pub source: String,
    pub updated_at: String,
}
