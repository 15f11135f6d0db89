//! Output formatting for terminal reports and exports.

pub mod csv;
pub mod json;
pub mod markdown;

pub use csv::{format_rankings_csv, format_works_csv};
pub use json::{compact_ranking, compact_work, rankings_document};
pub use markdown::{
    format_agenda_report, format_rankings_markdown, format_stats_markdown, format_sync_report,
    format_works_markdown,
};
