//! Paginated fetcher tests against a mock OpenAlex server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use finrank::client::{Pager, RetryBudget};
use finrank::config::{Config, venues};
use finrank::error::ClientError;
use finrank::models::FetchScope;
use finrank::OpenAlexClient;

fn page(ids: &[&str], next_cursor: Option<&str>) -> serde_json::Value {
    let results: Vec<_> = ids
        .iter()
        .map(|id| json!({"id": format!("https://openalex.org/{id}"), "title": format!("Paper {id}")}))
        .collect();
    json!({"meta": {"count": 3, "next_cursor": next_cursor}, "results": results})
}

fn pager(server: &MockServer) -> Pager {
    let config = Config::for_testing(&server.uri());
    let client = OpenAlexClient::new(&config).unwrap();
    Pager::new(client, RetryBudget::from_config(&config))
}

fn jf_2024() -> FetchScope {
    FetchScope::journal_year(venues::find("jf").unwrap(), 2024)
}

#[tokio::test]
async fn test_pages_follow_cursor_until_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W1", "W2"], Some("c2"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W3"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;

    assert_eq!(pages.len(), 2);
    let first = pages[0].as_ref().unwrap();
    let second = pages[1].as_ref().unwrap();
    assert_eq!(first.number, 1);
    assert_eq!(first.cursor, "*");
    assert_eq!(first.next_cursor.as_deref(), Some("c2"));
    assert_eq!(first.records.len(), 2);
    assert_eq!(second.number, 2);
    assert_eq!(second.records.len(), 1);
    assert_eq!(second.next_cursor, None);
}

#[tokio::test]
async fn test_filter_and_page_size_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("filter", "primary_location.source.id:S5353659,publication_year:2024"))
        .and(query_param("per-page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W1"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;
    assert_eq!(pages.len(), 1);
    assert!(pages[0].is_ok());
}

#[tokio::test]
async fn test_empty_first_page_yields_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[], Some("ignored"))))
        .expect(1)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;
    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_repeated_cursor_stops_paging() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W1"], Some("*"))))
        .expect(1)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;
    assert_eq!(pages.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W1"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].as_ref().unwrap().records.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_budget_exhausted() {
    let server = MockServer::start().await;

    // Budget is 2 waits, so the third 429 fails the page.
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;
    assert_eq!(pages.len(), 1);
    let err = pages[0].as_ref().unwrap_err();
    assert_eq!(err.scope, "jf/2024");
    assert!(matches!(err.cause, ClientError::RateLimited { .. }));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;

    assert_eq!(pages.len(), 1);
    let err = pages[0].as_ref().unwrap_err();
    assert_eq!(err.page, 1);
    assert_eq!(err.cursor, "*");
    assert!(matches!(err.cause, ClientError::Server { status: 503, .. }));
}

#[tokio::test]
async fn test_transient_error_recovers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W1"], None)))
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;
    assert_eq!(pages.len(), 1);
    assert!(pages[0].is_ok());
}

/// Serve two connections: the first promises more body than it sends and
/// hangs up, the second answers with `body`.
async fn truncating_server(body: String) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        for attempt in 0..2 {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            counter.fetch_add(1, Ordering::SeqCst);

            let response = if attempt == 0 {
                format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                    body.len() + 500,
                    &body[..10]
                )
            } else {
                format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
            };
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{addr}"), hits)
}

#[tokio::test]
async fn test_truncated_body_is_retried() {
    let (uri, hits) = truncating_server(page(&["W1"], None).to_string()).await;
    let config = Config::for_testing(&uri);
    let pager = Pager::new(OpenAlexClient::new(&config).unwrap(), RetryBudget::from_config(&config));

    let works = pager.fetch_page(&jf_2024(), 1, "*").await.unwrap();

    assert_eq!(works.results.len(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_json_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"meta\": "))
        .expect(1)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let err = pager.fetch_page(&jf_2024(), 1, "*").await.unwrap_err();
    assert!(matches!(err.cause, ClientError::Parse(_)));
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid filter"))
        .expect(1)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;
    let err = pages[0].as_ref().unwrap_err();
    assert!(matches!(&err.cause, ClientError::BadRequest { message } if message == "invalid filter"));
}

#[tokio::test]
async fn test_failure_on_later_page_keeps_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W1", "W2"], Some("c2"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024()).collect().await;

    assert_eq!(pages.len(), 2);
    assert!(pages[0].is_ok());
    let err = pages[1].as_ref().unwrap_err();
    assert_eq!(err.page, 2);
    assert_eq!(err.cursor, "c2");
}

#[tokio::test]
async fn test_resume_from_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W3"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let pager = pager(&server);
    let pages: Vec<_> = pager.pages(jf_2024().resume_from("c2")).collect().await;
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].as_ref().unwrap().cursor, "c2");
}

#[tokio::test]
async fn test_mailto_is_sent_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("mailto", "me@example.org"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["W1"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::for_testing(&server.uri());
    config.mailto = Some("me@example.org".to_string());
    let client = OpenAlexClient::new(&config).unwrap();
    assert!(client.has_mailto());

    let result = client.list_works("publication_year:2024", "*").await.unwrap();
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.meta.count, Some(3));
}
