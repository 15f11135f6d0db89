//! Agenda extraction tests against a mock chat-completions service.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use finrank::agenda::{self, AgendaService, KeywordAgendaService, OpenAiAgendaService};
use finrank::config::Config;
use finrank::error::AgendaError;
use finrank::models::{AuthorMention, NormalizedWork, RankMetric, RankScope, WorkKind, YearFilter};
use finrank::{Store, ranking};

fn reply(content: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

fn seeded_store() -> Store {
    let store = Store::open_in_memory().unwrap();
    let work = |id: &str, title: &str, abstract_text: &str, name: &str| NormalizedWork {
        external_id: id.to_string(),
        title: title.to_string(),
        year: 2024,
        publication_date: None,
        venue: "jf".to_string(),
        kind: WorkKind::Article,
        doi: None,
        abstract_text: Some(abstract_text.to_string()),
        location: None,
        citation_count: 1,
        authors: vec![AuthorMention::new(name, &["MIT"])],
    };

    let session = store.begin_sync().unwrap();
    session
        .write_page(
            &[
                work("W1", "Bank Runs", "Deposit insurance and bank fragility.", "Jane Doe"),
                work("W2", "Green Bonds", "ESG investors and climate risk.", "Jane Doe"),
                work("W3", "Momentum", "Cross-sectional return predictability.", "Richard Roe"),
            ],
            false,
        )
        .unwrap();
    drop(session);
    store
}

fn ranked(store: &Store) -> Vec<ranking::RankingRow> {
    let scope = RankScope::new(["jf"], YearFilter::All);
    ranking::rank(store, &scope, RankMetric::PaperCount, 10).unwrap()
}

#[tokio::test]
async fn test_summaries_are_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("\"Banking and Climate Finance\"")))
        .expect(2)
        .mount(&server)
        .await;

    let store = seeded_store();
    let rows = ranked(&store);
    let service = OpenAiAgendaService::new(&Config::for_testing(&server.uri())).unwrap();

    let report = agenda::extract_agendas(&store, &service, &rows).await.unwrap();

    assert_eq!(report.source, "openai");
    assert_eq!(report.summarized.len(), 2);
    assert!(report.failures.is_empty());

    let stored = store.agenda(rows[0].author_id).unwrap().unwrap();
    assert_eq!(stored.summary, "Banking and Climate Finance");
    assert_eq!(stored.source, "openai");
}

#[tokio::test]
async fn test_one_failure_does_not_abort_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Richard Roe"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Banking Regulation")))
        .mount(&server)
        .await;

    let store = seeded_store();
    let rows = ranked(&store);
    let service = OpenAiAgendaService::new(&Config::for_testing(&server.uri())).unwrap();

    let report = agenda::extract_agendas(&store, &service, &rows).await.unwrap();

    assert_eq!(report.summarized.len(), 1);
    assert_eq!(report.summarized[0].author, "Jane Doe");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].author, "Richard Roe");
    assert!(report.failures[0].error.contains("500"));

    let roe = rows.iter().find(|r| r.author == "Richard Roe").unwrap();
    assert!(store.agenda(roe.author_id).unwrap().is_none());
}

#[tokio::test]
async fn test_empty_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let service = OpenAiAgendaService::new(&Config::for_testing(&server.uri())).unwrap();
    let result = service.summarize("Jane Doe", &[]).await;
    assert!(matches!(result, Err(AgendaError::EmptyResponse)));
}

#[tokio::test]
async fn test_prompt_carries_titles_and_abstracts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Deposit insurance and bank fragility."))
        .and(body_string_contains("gpt-4o-mini"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Banking")))
        .expect(1)
        .mount(&server)
        .await;

    let store = seeded_store();
    let rows: Vec<_> = ranked(&store).into_iter().filter(|r| r.author == "Jane Doe").collect();
    let service = OpenAiAgendaService::new(&Config::for_testing(&server.uri())).unwrap();

    let report = agenda::extract_agendas(&store, &service, &rows).await.unwrap();
    assert_eq!(report.summarized.len(), 1);
}

#[tokio::test]
async fn test_keyword_service_needs_no_network() {
    let store = seeded_store();
    let rows = ranked(&store);

    let report = agenda::extract_agendas(&store, &KeywordAgendaService, &rows).await.unwrap();

    assert_eq!(report.source, "keywords");
    assert_eq!(report.summarized.len(), 2);
    assert_eq!(store.agendas().unwrap().len(), 2);
}

#[tokio::test]
async fn test_agendas_refuse_concurrent_writer() {
    let store = seeded_store();
    let rows = ranked(&store);
    let _session = store.begin_sync().unwrap();

    let result = agenda::extract_agendas(&store, &KeywordAgendaService, &rows).await;
    assert!(result.is_err());
}
