//! Sync and ranking scopes.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::WorkKind;
use crate::config::venues::{self, Venue};
use crate::error::InputError;

/// Publication-year filter: every year, or an explicit set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum YearFilter {
    #[default]
    All,
    Only(BTreeSet<i32>),
}

impl YearFilter {
    /// Single-year filter.
    #[must_use]
    pub fn year(year: i32) -> Self {
        Self::Only(BTreeSet::from([year]))
    }

    /// Inclusive range filter.
    #[must_use]
    pub fn range(start: i32, end: i32) -> Self {
        Self::Only((start..=end).collect())
    }

    #[must_use]
    pub fn contains(&self, year: i32) -> bool {
        match self {
            Self::All => true,
            Self::Only(years) => years.contains(&year),
        }
    }

    /// Explicit years, or `None` for all.
    #[must_use]
    pub fn years(&self) -> Option<Vec<i32>> {
        match self {
            Self::All => None,
            Self::Only(years) => Some(years.iter().copied().collect()),
        }
    }
}

impl FromStr for YearFilter {
    type Err = InputError;

    /// Accepts `all`, `2024`, `2023-2025`, and comma lists of either (`2021,2023-2024`).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("all") || input.eq_ignore_ascii_case("a")
        {
            return Ok(Self::All);
        }

        let mut years = BTreeSet::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some((start, end)) = part.split_once('-') {
                let start = parse_year(start)?;
                let end = parse_year(end)?;
                if start > end {
                    return Err(InputError::validation(
                        "years",
                        format!("range {start}-{end} is reversed"),
                    ));
                }
                years.extend(start..=end);
            } else {
                years.insert(parse_year(part)?);
            }
        }

        if years.is_empty() {
            return Err(InputError::validation("years", format!("no years in '{input}'")));
        }
        Ok(Self::Only(years))
    }
}

fn parse_year(s: &str) -> Result<i32, InputError> {
    let year: i32 = s
        .trim()
        .parse()
        .map_err(|_| InputError::validation("years", format!("'{}' is not a year", s.trim())))?;
    if !(1800..=2200).contains(&year) {
        return Err(InputError::validation("years", format!("{year} is out of range")));
    }
    Ok(year)
}

impl fmt::Display for YearFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(years) => {
                let first = years.first().copied().unwrap_or_default();
                let last = years.last().copied().unwrap_or_default();
                if years.len() == 1 {
                    write!(f, "{first}")
                } else if (last - first + 1) as usize == years.len() {
                    write!(f, "{first}-{last}")
                } else {
                    let parts: Vec<String> = years.iter().map(i32::to_string).collect();
                    f.write_str(&parts.join(","))
                }
            }
        }
    }
}

/// Parse a comma-separated venue list.
///
/// `top3` expands to the three finance journals, `all` to every known journal.
/// The working-paper code `wp` is accepted so rankings can target working papers.
pub fn parse_venues(input: &str) -> Result<BTreeSet<String>, InputError> {
    let mut codes = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let part = part.to_ascii_lowercase();
        match part.as_str() {
            "top3" => codes.extend(venues::TOP3.iter().map(|c| (*c).to_string())),
            "all" => codes.extend(venues::ALL.iter().map(|v| v.code.to_string())),
            venues::WORKING_PAPERS => {
                codes.insert(part);
            }
            code => {
                let venue = venues::find(code).ok_or_else(|| {
                    let known: Vec<&str> = venues::ALL.iter().map(|v| v.code).collect();
                    InputError::validation(
                        "venues",
                        format!("unknown venue '{code}' (known: {}, top3, all)", known.join(", ")),
                    )
                })?;
                codes.insert(venue.code.to_string());
            }
        }
    }
    if codes.is_empty() {
        return Err(InputError::validation("venues", "no venues given"));
    }
    Ok(codes)
}

/// Resolve venue codes to journals that can be fetched by source id.
pub fn resolve_journals(codes: &BTreeSet<String>) -> Result<Vec<&'static Venue>, InputError> {
    codes
        .iter()
        .map(|code| {
            venues::find(code).ok_or_else(|| {
                InputError::validation("venues", format!("'{code}' cannot be fetched as a journal"))
            })
        })
        .collect()
}

/// Scope of a ranking or listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankScope {
    /// Venue codes; empty means every venue.
    pub venues: BTreeSet<String>,
    pub years: YearFilter,
}

impl RankScope {
    #[must_use]
    pub fn new<I, S>(venues: I, years: YearFilter) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { venues: venues.into_iter().map(Into::into).collect(), years }
    }

    /// Human-readable label (`jf+rfs/2024`).
    #[must_use]
    pub fn label(&self) -> String {
        let venues = if self.venues.is_empty() {
            "all".to_string()
        } else {
            self.venues.iter().cloned().collect::<Vec<_>>().join("+")
        };
        format!("{venues}/{}", self.years)
    }
}

/// One unit of fetching: a single OpenAlex filter paged to exhaustion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchScope {
    /// Label used in logs and failure reports (`jf/2024`, `wp/A123`).
    pub label: String,

    /// Venue code assigned to works from this scope.
    pub venue: String,

    pub kind: WorkKind,

    /// OpenAlex `filter` expression.
    pub filter: String,

    /// Year assumed for records that carry none.
    pub year: Option<i32>,

    /// Resume cursor; `None` starts from the first page.
    pub cursor: Option<String>,
}

impl FetchScope {
    /// Articles of one journal in one publication year.
    #[must_use]
    pub fn journal_year(venue: &Venue, year: i32) -> Self {
        Self {
            label: format!("{}/{year}", venue.code),
            venue: venue.code.to_string(),
            kind: WorkKind::Article,
            filter: format!(
                "primary_location.source.id:{},publication_year:{year}",
                venue.source_id
            ),
            year: Some(year),
            cursor: None,
        }
    }

    /// Non-article works of one author published since January 1st of `since_year`.
    #[must_use]
    pub fn working_papers(author_external_id: &str, since_year: i32) -> Self {
        Self {
            label: format!("{}/{author_external_id}", venues::WORKING_PAPERS),
            venue: venues::WORKING_PAPERS.to_string(),
            kind: WorkKind::WorkingPaper,
            filter: format!(
                "authorships.author.id:{author_external_id},type:!article,from_publication_date:{since_year}-01-01"
            ),
            year: None,
            cursor: None,
        }
    }

    /// Restart this scope from a previously returned cursor.
    #[must_use]
    pub fn resume_from(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}
