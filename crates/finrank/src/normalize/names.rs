//! Person-name normalization for author identity matching.

use std::sync::LazyLock;

use regex::Regex;

/// Everything except letters, digits, whitespace, apostrophes and hyphens.
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s'-]+").expect("valid punctuation pattern"));

/// Generational suffixes dropped from the end of a name.
const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];

/// A name reduced to its matching components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonName {
    /// Normalized key: given name, multi-letter middle names, surname.
    pub key: String,

    /// Normalized surname (last token).
    pub surname: String,

    /// Normalized given name (first token); empty for mononyms.
    pub given: String,
}

/// Parse a display name.
///
/// Returns `None` when nothing usable remains after normalization.
#[must_use]
pub fn parse(name: &str) -> Option<PersonName> {
    let ordered = reorder(name);
    let mut tokens = tokenize(&ordered);

    while tokens.len() > 1 && tokens.last().is_some_and(|t| is_suffix(t)) {
        tokens.pop();
    }

    let (surname, rest) = tokens.split_last()?;
    let (given, middles) = match rest.split_first() {
        Some((given, middles)) => (given.clone(), middles),
        None => (String::new(), &[][..]),
    };

    let mut parts: Vec<&str> = Vec::with_capacity(tokens.len());
    if !given.is_empty() {
        parts.push(&given);
    }
    parts.extend(middles.iter().filter(|m| m.chars().count() > 1).map(String::as_str));
    parts.push(surname);

    Some(PersonName { key: parts.join(" "), surname: surname.clone(), given })
}

/// Check whether two normalized given names can denote the same person.
///
/// Equal names match, and a single initial matches any name starting with it.
#[must_use]
pub fn given_compatible(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let initial_of = |short: &str, long: &str| {
        short.chars().count() == 1 && long.chars().next() == short.chars().next()
    };
    initial_of(a, b) || initial_of(b, a)
}

/// Normalize an affiliation string for set comparison.
#[must_use]
pub fn affiliation_key(affiliation: &str) -> String {
    affiliation.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn `Last, First[, Jr.]` into `First Last`; names without commas pass through.
fn reorder(name: &str) -> String {
    let mut parts = name.split(',').map(str::trim).filter(|p| !p.is_empty());
    let Some(first) = parts.next() else {
        return String::new();
    };
    let rest: Vec<&str> = parts.filter(|p| !tokenize(p).iter().all(|t| is_suffix(t))).collect();

    if rest.is_empty() { first.to_string() } else { format!("{} {first}", rest.join(" ")) }
}

fn tokenize(s: &str) -> Vec<String> {
    let lowered = s.to_lowercase();
    PUNCTUATION
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(|t| t.trim_matches(|c| c == '-' || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_suffix(token: &str) -> bool {
    SUFFIXES.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(name: &str) -> String {
        parse(name).map(|n| n.key).unwrap_or_default()
    }

    #[test]
    fn test_basic_key() {
        let name = parse("John Smith").unwrap();
        assert_eq!(name.key, "john smith");
        assert_eq!(name.surname, "smith");
        assert_eq!(name.given, "john");
    }

    #[test]
    fn test_comma_reordering() {
        assert_eq!(key("Smith, John"), "john smith");
        assert_eq!(key("Smith, John, Jr."), "john smith");
        assert_eq!(key("John Smith, Jr."), "john smith");
    }

    #[test]
    fn test_suffixes_and_initials() {
        assert_eq!(key("John A. Smith"), "john smith");
        assert_eq!(key("John Smith III"), "john smith");
        assert_eq!(key("J. Smith"), "j smith");
        assert_eq!(key("John Alan Smith"), "john alan smith");
    }

    #[test]
    fn test_punctuation_and_case() {
        assert_eq!(key("JEAN-PIERRE O'BRIEN"), "jean-pierre o'brien");
        assert_eq!(key("René  Stulz"), "rené stulz");
        assert_eq!(key("R.M. Stulz"), "r stulz");
    }

    #[test]
    fn test_unusable_names() {
        assert!(parse("").is_none());
        assert!(parse("  ,  ").is_none());
        assert!(parse("...").is_none());
    }

    #[test]
    fn test_mononym() {
        let name = parse("Plato").unwrap();
        assert_eq!(name.key, "plato");
        assert!(name.given.is_empty());
    }

    #[test]
    fn test_given_compatible() {
        assert!(given_compatible("john", "john"));
        assert!(given_compatible("j", "john"));
        assert!(given_compatible("john", "j"));
        assert!(!given_compatible("jo", "john"));
        assert!(!given_compatible("jane", "john"));
        assert!(!given_compatible("", "john"));
    }

    #[test]
    fn test_affiliation_key() {
        assert_eq!(affiliation_key("  Harvard   University "), "harvard university");
        assert_eq!(affiliation_key("MIT"), affiliation_key("mit"));
    }

    proptest! {
        #[test]
        fn parse_never_panics(s in "\\PC{0,64}") {
            let _ = parse(&s);
        }

        #[test]
        fn key_is_a_fixed_point(s in "[A-Za-z .,'-]{1,40}") {
            if let Some(name) = parse(&s) {
                let again = parse(&name.key).unwrap();
                prop_assert_eq!(again.key, name.key);
            }
        }

        #[test]
        fn key_ignores_case(s in "[A-Za-z ]{1,30}") {
            prop_assert_eq!(key(&s.to_uppercase()), key(&s.to_lowercase()));
        }
    }
}
