//! Store writer, identity resolution and ranking tests through the public API.

use finrank::Store;
use finrank::error::StoreError;
use finrank::models::{AuthorMention, NormalizedWork, RankMetric, RankScope, WorkKind, YearFilter};
use finrank::ranking;
use finrank::store::UpsertOutcome;

fn work(id: &str, venue: &str, year: i32, citations: u64, authors: Vec<AuthorMention>) -> NormalizedWork {
    NormalizedWork {
        external_id: id.to_string(),
        title: format!("Paper {id}"),
        year,
        publication_date: Some(format!("{year}-06-01")),
        venue: venue.to_string(),
        kind: WorkKind::Article,
        doi: None,
        abstract_text: None,
        location: None,
        citation_count: citations,
        authors,
    }
}

fn write(store: &Store, works: &[NormalizedWork]) {
    let session = store.begin_sync().unwrap();
    session.write_page(works, false).unwrap();
}

#[test]
fn test_initial_and_full_name_merge_at_same_affiliation() {
    let store = Store::open_in_memory().unwrap();
    write(
        &store,
        &[
            work("W1", "jf", 2024, 1, vec![AuthorMention::new("John Smith", &["MIT"])]),
            work("W2", "jf", 2024, 1, vec![AuthorMention::new("J. Smith", &["MIT Sloan", "MIT"])]),
        ],
    );

    let authors = store.authors().unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].canonical_name, "John Smith");
    assert!(authors[0].has_variant("J. Smith"));
    assert_eq!(authors[0].affiliations, vec!["MIT", "MIT Sloan"]);
}

#[test]
fn test_same_name_disjoint_affiliations_stay_apart() {
    let store = Store::open_in_memory().unwrap();
    write(
        &store,
        &[
            work("W1", "jf", 2024, 1, vec![AuthorMention::new("Wei Zhang", &["Tsinghua University"])]),
            work("W2", "rfs", 2024, 1, vec![AuthorMention::new("Wei Zhang", &["Columbia University"])]),
        ],
    );

    assert_eq!(store.authors().unwrap().len(), 2);
}

#[test]
fn test_external_id_links_mentions_across_names() {
    let store = Store::open_in_memory().unwrap();
    write(
        &store,
        &[
            work("W1", "jf", 2024, 1, vec![AuthorMention::new("Jane Doe", &["MIT"]).with_external_id("A1")]),
            work("W2", "jf", 2023, 1, vec![AuthorMention::new("Jane Q. Roe", &[]).with_external_id("A1")]),
        ],
    );

    let author = store.author_by_external_id("A1").unwrap().unwrap();
    assert_eq!(author.canonical_name, "Jane Doe");
    assert!(author.has_variant("Jane Q. Roe"));
    assert_eq!(store.authors().unwrap().len(), 1);
}

#[test]
fn test_writes_are_incremental() {
    let store = Store::open_in_memory().unwrap();
    let first = work("W1", "jf", 2024, 5, vec![AuthorMention::new("Jane Doe", &["MIT"])]);
    let session = store.begin_sync().unwrap();

    assert_eq!(session.upsert(&first, false).unwrap(), UpsertOutcome::Inserted);
    assert_eq!(session.upsert(&first, false).unwrap(), UpsertOutcome::Skipped);

    let mut refreshed = first.clone();
    refreshed.citation_count = 9;
    refreshed.title = "Something Else".to_string();
    assert_eq!(session.upsert(&refreshed, true).unwrap(), UpsertOutcome::Updated);
    drop(session);

    let stored = store.work_by_external_id("W1").unwrap().unwrap();
    assert_eq!(stored.citation_count, 9);
    assert_eq!(stored.title, "Paper W1");
    assert_eq!(store.work_author_ids(stored.id).unwrap().len(), 1);
}

#[test]
fn test_rank_by_papers_and_citations() {
    let store = Store::open_in_memory().unwrap();
    let doe = || AuthorMention::new("Jane Doe", &["MIT"]);
    let roe = || AuthorMention::new("Richard Roe", &["Chicago"]);
    write(
        &store,
        &[
            work("W1", "jf", 2024, 1, vec![doe()]),
            work("W2", "jf", 2023, 2, vec![doe(), roe()]),
            work("W3", "rfs", 2024, 100, vec![roe()]),
        ],
    );

    let all = RankScope::new(Vec::<String>::new(), YearFilter::All);

    let by_papers = ranking::rank(&store, &all, RankMetric::PaperCount, 10).unwrap();
    // Equal paper counts: Roe wins on citations.
    assert_eq!(by_papers[0].author, "Richard Roe");
    assert_eq!(by_papers[1].author, "Jane Doe");

    let jf_only = RankScope::new(["jf"], YearFilter::All);
    let rows = ranking::rank(&store, &jf_only, RankMetric::PaperCount, 10).unwrap();
    assert_eq!(rows[0].author, "Jane Doe");
    assert_eq!(rows[0].paper_count, 2);
    assert_eq!(rows[0].papers_by_year.get(&2023), Some(&1));
    assert_eq!(rows[0].latest_title.as_deref(), Some("Paper W1"));

    let by_year = RankScope::new(["jf", "rfs"], YearFilter::year(2024));
    let rows = ranking::rank(&store, &by_year, RankMetric::TotalCitations, 1).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].author, "Richard Roe");
    assert_eq!(rows[0].total_citations, 100);
}

#[test]
fn test_rank_empty_scope() {
    let store = Store::open_in_memory().unwrap();
    let scope = RankScope::new(["qje"], YearFilter::year(1999));
    assert!(ranking::rank(&store, &scope, RankMetric::PaperCount, 10).unwrap().is_empty());
}

#[test]
fn test_agenda_round_trip_through_session() {
    let store = Store::open_in_memory().unwrap();
    write(&store, &[work("W1", "jf", 2024, 1, vec![AuthorMention::new("Jane Doe", &["MIT"])])]);
    let author_id = store.authors().unwrap()[0].id;

    let session = store.begin_sync().unwrap();
    session.save_agenda(author_id, "Banking and Liquidity", "keywords").unwrap();
    session.save_agenda(author_id, "Bank Runs and Regulation", "openai").unwrap();
    drop(session);

    let agenda = store.agenda(author_id).unwrap().unwrap();
    assert_eq!(agenda.summary, "Bank Runs and Regulation");
    assert_eq!(agenda.source, "openai");
    assert_eq!(store.agendas().unwrap().len(), 1);
}

/// Make inserts of one external id fail from inside SQLite.
fn reject_inserts_of(db: &std::path::Path, external_id: &str) {
    let conn = rusqlite::Connection::open(db).unwrap();
    conn.execute_batch(&format!(
        "CREATE TRIGGER reject_work BEFORE INSERT ON works
         WHEN NEW.external_id = '{external_id}'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;"
    ))
    .unwrap();
}

#[test]
fn test_failed_page_rolls_back_whole_page() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("finrank.db");
    let store = Store::open(&db).unwrap();
    reject_inserts_of(&db, "W2");

    let session = store.begin_sync().unwrap();
    let page = [
        work("W1", "jf", 2024, 5, vec![AuthorMention::new("Jane Doe", &["MIT"])]),
        work("W2", "jf", 2024, 3, vec![AuthorMention::new("Richard Roe", &["Chicago"])]),
    ];
    let result = session.write_page(&page, false);
    assert!(matches!(result, Err(StoreError::Database(_) | StoreError::Conflict(_))));

    let stats = store.stats().unwrap();
    assert_eq!(stats.works, 0);
    assert_eq!(stats.authors, 0);

    // The session stays usable once the bad record is gone.
    session.write_page(&page[..1], false).unwrap();
    assert_eq!(store.stats().unwrap().works, 1);
}
