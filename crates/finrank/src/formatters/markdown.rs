//! Markdown output formatting.

use crate::agenda::AgendaReport;
use crate::models::StoredWork;
use crate::ranking::RankingRow;
use crate::store::StoreStats;
use crate::sync::SyncReport;

/// Escape a value for a Markdown table cell.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Format a leaderboard as a Markdown table.
#[must_use]
pub fn format_rankings_markdown(title: &str, rows: &[RankingRow]) -> String {
    if rows.is_empty() {
        return format!("# {title}\n\nNo authors found.\n");
    }

    let mut output = format!("# {title} ({} authors)\n\n", rows.len());
    output.push_str("| Rank | Author | Papers | Citations | Latest Paper | Latest Date |\n");
    output.push_str("|---:|---|---:|---:|---|---|\n");

    for row in rows {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            row.rank,
            cell(&row.author),
            row.paper_count,
            row.total_citations,
            cell(row.latest_title.as_deref().unwrap_or("")),
            row.latest_date.as_deref().unwrap_or(""),
        ));
    }

    output
}

/// Format works as a Markdown table.
#[must_use]
pub fn format_works_markdown(works: &[StoredWork]) -> String {
    if works.is_empty() {
        return "No works found.\n".to_string();
    }

    let mut output = format!("# Works ({} results)\n\n", works.len());
    output.push_str("| Year | Venue | Title | Authors | Citations |\n");
    output.push_str("|---:|---|---|---|---:|\n");

    for work in works {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            work.year,
            work.venue,
            cell(&work.title),
            cell(&work.author_names()),
            work.citation_count,
        ));
    }

    output
}

/// Format a sync report.
#[must_use]
pub fn format_sync_report(report: &SyncReport) -> String {
    let mut output = String::from("# Sync Report\n\n");
    output.push_str(&format!(
        "**Inserted**: {} | **Updated**: {} | **Skipped**: {} | **Failed records**: {}\n\n",
        report.inserted, report.updated, report.skipped, report.failed
    ));
    output.push_str(&format!(
        "**Pages**: {} | **Scopes completed**: {}\n",
        report.pages, report.scopes_completed
    ));

    if report.cancelled {
        output.push_str("\n> Cancelled before all scopes finished; committed pages were kept.\n");
    }

    if !report.failed_scopes.is_empty() {
        output.push_str("\n## Failed scopes\n\n");
        output.push_str("| Scope | Page | Resume cursor | Error |\n");
        output.push_str("|---|---:|---|---|\n");
        for failure in &report.failed_scopes {
            output.push_str(&format!(
                "| {} | {} | `{}` | {} |\n",
                failure.scope,
                failure.page,
                failure.cursor,
                cell(&failure.error)
            ));
        }
    }

    output
}

/// Format an agenda batch report.
#[must_use]
pub fn format_agenda_report(report: &AgendaReport) -> String {
    let mut output = format!("# Research Agendas ({})\n\n", report.source);

    if report.summarized.is_empty() {
        output.push_str("No agendas extracted.\n");
    } else {
        output.push_str("| Author | Agenda |\n|---|---|\n");
        for entry in &report.summarized {
            output.push_str(&format!("| {} | {} |\n", cell(&entry.author), cell(&entry.summary)));
        }
    }

    if !report.failures.is_empty() {
        output.push_str(&format!("\n**Failed**: {}\n\n", report.failures.len()));
        for failure in &report.failures {
            output.push_str(&format!("- {}: {}\n", failure.author, failure.error));
        }
    }

    output
}

/// Format store statistics.
#[must_use]
pub fn format_stats_markdown(stats: &StoreStats) -> String {
    let mut output = String::from("# Store\n\n");
    output.push_str(&format!(
        "**Works**: {} ({} articles, {} working papers)\n\n",
        stats.works, stats.articles, stats.working_papers
    ));
    output.push_str(&format!("**Authors**: {} | **Agendas**: {}\n\n", stats.authors, stats.agendas));

    if !stats.by_venue.is_empty() {
        output.push_str("| Venue | Works |\n|---|---:|\n");
        for (venue, n) in &stats.by_venue {
            output.push_str(&format!("| {venue} | {n} |\n"));
        }
        output.push('\n');
    }

    if let Some(last) = &stats.last_retrieved {
        output.push_str(&format!("**Last retrieved**: {last}\n"));
    }

    output
}
