/// Fetch loop tests against a mocked solicitations API
/// Covers pagination, termination conditions and retry behavior
use dataprev_sync::errors::SyncError;
use dataprev_sync::solicitation_client::{FetchSettings, SolicitationClient, Termination};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START: &str = "01062025000000";
const END: &str = "01062025120000";

/// Helper function to create a client pointing at the mock server
fn create_test_client(server: &MockServer, max_attempts: u32) -> SolicitationClient {
    SolicitationClient::new(
        format!("{}/solicitacoes", server.uri()),
        "test_token",
        FetchSettings {
            delay: Duration::ZERO,
            max_attempts,
            request_timeout: Duration::from_secs(5),
        },
    )
    .unwrap()
}

async fn mount_page(server: &MockServer, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .and(query_param("nroPagina", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sends_window_params_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .and(query_param("nroPagina", "0"))
        .and(query_param("dataHoraInicio", START))
        .and(query_param("dataHoraFim", END))
        .and(header("Authorization", "test_token"))
        .and(header("Accept", "application/json"))
        .and(header_exists("X-CSRF-TOKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 3);
    let outcome = client.fetch_window(START, END).await;

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.termination, Termination::EmptyPage { page: 0 });
}

#[tokio::test]
async fn test_empty_first_page_returns_nothing() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 0, json!([])).await;

    let client = create_test_client(&mock_server, 3);
    let outcome = client.fetch_window(START, END).await;

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.pages, 0);
    assert!(outcome.termination.is_complete());
}

#[tokio::test]
async fn test_concatenates_pages_in_order() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        0,
        json!({ "content": [{ "idSolicitacao": "1" }, { "idSolicitacao": "2" }] }),
    )
    .await;
    mount_page(&mock_server, 1, json!({ "data": [{ "idSolicitacao": "3" }] })).await;
    mount_page(&mock_server, 2, json!([{ "idSolicitacao": "4" }])).await;
    mount_page(&mock_server, 3, json!({ "content": [] })).await;

    let client = create_test_client(&mock_server, 3);
    let outcome = client.fetch_window(START, END).await;

    let ids: Vec<&str> = outcome
        .records
        .iter()
        .map(|r| r["idSolicitacao"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.termination, Termination::EmptyPage { page: 3 });
}

#[tokio::test]
async fn test_duplicate_page_stops_and_discards_repeat() {
    let mock_server = MockServer::start().await;
    let body = json!({ "content": [{ "idSolicitacao": "1" }, { "idSolicitacao": "2" }] });
    mount_page(&mock_server, 0, body.clone()).await;
    mount_page(&mock_server, 1, body).await;

    // Never requested: the repeat on page 1 ends the loop.
    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .and(query_param("nroPagina", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "idSolicitacao": "9" }])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 3);
    let outcome = client.fetch_window(START, END).await;

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.termination, Termination::DuplicatePage { page: 1 });
}

#[tokio::test]
async fn test_reordered_duplicate_page_is_detected() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        0,
        json!([{ "idSolicitacao": "1", "cpf": "a" }, { "idSolicitacao": "2" }]),
    )
    .await;
    mount_page(
        &mock_server,
        1,
        json!([{ "idSolicitacao": "2" }, { "cpf": "a", "idSolicitacao": "1" }]),
    )
    .await;

    let client = create_test_client(&mock_server, 3);
    let outcome = client.fetch_window(START, END).await;

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.termination, Termination::DuplicatePage { page: 1 });
}

#[tokio::test]
async fn test_retries_exactly_max_attempts_then_stops() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 0, json!([{ "idSolicitacao": "1" }])).await;

    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .and(query_param("nroPagina", "1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(4)
        .mount(&mock_server)
        .await;

    // The loop stops instead of skipping ahead.
    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .and(query_param("nroPagina", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "idSolicitacao": "2" }])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 4);
    let outcome = client.fetch_window(START, END).await;

    assert_eq!(outcome.records, vec![json!({ "idSolicitacao": "1" })]);
    assert_eq!(outcome.pages, 1);
    match outcome.termination {
        Termination::RetriesExhausted {
            page,
            attempts,
            last_error,
        } => {
            assert_eq!(page, 1);
            assert_eq!(attempts, 4);
            assert!(last_error.contains("500"));
        }
        other => panic!("Expected retries to be exhausted, got {:?}", other),
    }

    mock_server.verify().await;
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let mock_server = MockServer::start().await;

    // First two attempts fail, then the page is served.
    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .and(query_param("nroPagina", "0"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 0, json!([{ "idSolicitacao": "1" }])).await;
    mount_page(&mock_server, 1, json!([])).await;

    let client = create_test_client(&mock_server, 3);
    let outcome = client.fetch_window(START, END).await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.termination, Termination::EmptyPage { page: 1 });
}

#[tokio::test]
async fn test_unknown_body_shape_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "token expirado" })),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 2);
    let outcome = client.fetch_window(START, END).await;

    assert!(outcome.records.is_empty());
    assert!(!outcome.termination.is_complete());
}

#[tokio::test]
async fn test_invalid_json_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>manutenção</html>"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 3);
    let outcome = client.fetch_window(START, END).await;

    assert!(outcome.records.is_empty());
    assert!(matches!(
        outcome.termination,
        Termination::RetriesExhausted { page: 0, attempts: 3, .. }
    ));
}

#[tokio::test]
async fn test_fetch_page_reports_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/solicitacoes"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 1);
    let err = client.fetch_page(0, START, END).await.unwrap_err();

    assert!(err.to_string().contains("401"));
    assert!(matches!(err, SyncError::UnexpectedStatus { status: 401, .. }));
}
