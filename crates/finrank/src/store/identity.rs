//! Author identity resolution (merge-on-lookup).
//!
//! A mention resolves, in order, to:
//! 1. the author already owning its external author id
//! 2. an author with the same name key, when affiliations overlap or
//!    either side has none
//! 3. an author with the same surname and a compatible given name
//!    (equal, or an initial of it) and an overlapping affiliation
//! 4. a new author
//!
//! Candidates are tried oldest first. A candidate whose external id is set
//! and differs from the mention's is a different person and never matches.

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreResult;
use crate::models::AuthorMention;
use crate::normalize::names::{self, PersonName};

/// Resolve a mention to an author id, creating or enriching authors as needed.
pub(crate) fn resolve(conn: &Connection, mention: &AuthorMention, now: &str) -> StoreResult<i64> {
    let name = person_name(&mention.name);
    let affiliations: HashSet<String> =
        mention.affiliations.iter().map(|a| names::affiliation_key(a)).collect();

    let matched = match by_external_id(conn, mention)? {
        Some(id) => Some(id),
        None => match by_name_key(conn, mention, &name, &affiliations)? {
            Some(id) => Some(id),
            None => by_close_match(conn, mention, &name, &affiliations)?,
        },
    };

    let author_id = match matched {
        Some(id) => id,
        None => {
            conn.execute(
                "INSERT INTO authors (canonical_name, external_id, orcid, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![mention.name, mention.external_id, mention.orcid, now],
            )?;
            let id = conn.last_insert_rowid();
            tracing::trace!(author_id = id, name = %mention.name, "Created author");
            id
        }
    };

    attach(conn, author_id, mention, &name)?;
    Ok(author_id)
}

fn person_name(raw: &str) -> PersonName {
    names::parse(raw).unwrap_or_else(|| {
        let key = raw.trim().to_lowercase();
        PersonName { surname: key.clone(), given: String::new(), key }
    })
}

fn by_external_id(conn: &Connection, mention: &AuthorMention) -> StoreResult<Option<i64>> {
    let Some(external_id) = mention.external_id.as_deref() else {
        return Ok(None);
    };
    Ok(conn
        .query_row("SELECT id FROM authors WHERE external_id = ?1", [external_id], |row| row.get(0))
        .optional()?)
}

fn by_name_key(
    conn: &Connection,
    mention: &AuthorMention,
    name: &PersonName,
    affiliations: &HashSet<String>,
) -> StoreResult<Option<i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT v.author_id, a.external_id
         FROM author_variants v JOIN authors a ON a.id = v.author_id
         WHERE v.name_key = ?1
         ORDER BY v.author_id",
    )?;
    let candidates = stmt
        .query_map([&name.key], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    for (author_id, external_id) in candidates {
        if conflicting_ids(mention, external_id.as_deref()) {
            continue;
        }
        let theirs = author_affiliations(conn, author_id)?;
        if affiliations.is_empty() || theirs.is_empty() || !affiliations.is_disjoint(&theirs) {
            return Ok(Some(author_id));
        }
    }
    Ok(None)
}

fn by_close_match(
    conn: &Connection,
    mention: &AuthorMention,
    name: &PersonName,
    affiliations: &HashSet<String>,
) -> StoreResult<Option<i64>> {
    if affiliations.is_empty() || name.given.is_empty() {
        return Ok(None);
    }

    let mut stmt = conn.prepare_cached(
        "SELECT v.author_id, v.given, a.external_id
         FROM author_variants v JOIN authors a ON a.id = v.author_id
         WHERE v.surname = ?1
         ORDER BY v.author_id",
    )?;
    let candidates = stmt
        .query_map([&name.surname], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Option<String>>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (author_id, given, external_id) in candidates {
        if !names::given_compatible(&name.given, &given)
            || conflicting_ids(mention, external_id.as_deref())
        {
            continue;
        }
        if !affiliations.is_disjoint(&author_affiliations(conn, author_id)?) {
            return Ok(Some(author_id));
        }
    }
    Ok(None)
}

fn conflicting_ids(mention: &AuthorMention, candidate: Option<&str>) -> bool {
    matches!((mention.external_id.as_deref(), candidate), (Some(a), Some(b)) if a != b)
}

fn author_affiliations(conn: &Connection, author_id: i64) -> StoreResult<HashSet<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT affiliation_key FROM author_affiliations WHERE author_id = ?1")?;
    let keys = stmt.query_map([author_id], |row| row.get(0))?.collect::<Result<_, _>>()?;
    Ok(keys)
}

/// Record the mention's name variant and affiliations, and fill missing ids.
fn attach(
    conn: &Connection,
    author_id: i64,
    mention: &AuthorMention,
    name: &PersonName,
) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO author_variants (author_id, name, name_key, surname, given)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![author_id, mention.name, name.key, name.surname, name.given],
    )?;
    for affiliation in &mention.affiliations {
        conn.execute(
            "INSERT OR IGNORE INTO author_affiliations (author_id, affiliation, affiliation_key)
             VALUES (?1, ?2, ?3)",
            params![author_id, affiliation, names::affiliation_key(affiliation)],
        )?;
    }
    if mention.external_id.is_some() || mention.orcid.is_some() {
        conn.execute(
            "UPDATE authors SET external_id = COALESCE(external_id, ?2), orcid = COALESCE(orcid, ?3)
             WHERE id = ?1",
            params![author_id, mention.external_id, mention.orcid],
        )?;
    }
    Ok(())
}
