//! Data models: raw OpenAlex payloads, normalized entities, and scopes.
//!
//! Raw models use `#[serde(default)]` on every field; nothing in `raw`
//! is trusted until it has passed through [`crate::normalize`].

mod author;
mod enums;
pub mod raw;
mod scope;
mod work;

pub use author::{Agenda, Author};
pub use enums::{ExportFormat, RankMetric};
pub use raw::{PageMeta, RawWork, WorksPage};
pub use scope::{FetchScope, RankScope, YearFilter, parse_venues, resolve_journals};
pub use work::{AuthorMention, AuthorPaper, NormalizedWork, StoredWork, WorkKind};
