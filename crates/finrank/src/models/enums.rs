//! Enums for ranking and output options.

use serde::{Deserialize, Serialize};

/// Metric a leaderboard is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    /// Number of works in scope.
    #[default]
    #[value(name = "papers", alias = "paper-count")]
    PaperCount,
    /// Sum of citation counts of works in scope.
    #[value(name = "citations", alias = "total-citations")]
    TotalCitations,
}

impl RankMetric {
    /// The other metric, used as first tie-break.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::PaperCount => Self::TotalCitations,
            Self::TotalCitations => Self::PaperCount,
        }
    }
}

impl std::fmt::Display for RankMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaperCount => f.write_str("paper count"),
            Self::TotalCitations => f.write_str("total citations"),
        }
    }
}

/// Output format for reports and exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Markdown table for terminals.
    #[default]
    Markdown,
    /// Flat delimited table.
    Csv,
    /// JSON document.
    Json,
}
