//! `WorkflowHttpClient` against a mock workflow service.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use lost_items_core::config::Secret;
use lost_items_core::environment::WorkflowClient;
use lost_items_core::error::WorkflowError;
use lost_items_core::model::{ItemRecord, PurchaseRequest};
use lost_items_workflow::WorkflowHttpClient;
use serde_json::json;
use wiremock::matchers::{basic_auth, body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client(server: &MockServer) -> WorkflowHttpClient {
    WorkflowHttpClient::new(&server.uri(), "lost-items", Secret::new("s3cret".to_string()))
}

fn request() -> PurchaseRequest {
    PurchaseRequest {
        title: Some("The Rust Programming Language".to_string()),
        contributor: Some("Klabnik, Steve".to_string()),
        requester_comments: Some("Lost Item. Barcode: 39151000000001".to_string()),
        existing_folio_item_id: Some("i1".to_string()),
        existing_folio_item: Some(
            ItemRecord::from_value(json!({"id": "i1", "barcode": "39151000000001"})).unwrap(),
        ),
        ..PurchaseRequest::default()
    }
}

#[tokio::test]
async fn test_submit_posts_camel_case_request_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/purchase-requests"))
        .and(basic_auth("lost-items", "s3cret"))
        .and(body_partial_json(json!({
            "title": "The Rust Programming Language",
            "requesterComments": "Lost Item. Barcode: 39151000000001",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 17,
            "key": "PR-17",
            "title": "The Rust Programming Language",
            "creationDate": "2025-01-01T00:00:00Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let saved = client(&server).submit(&request()).await.unwrap();

    assert_eq!(saved.key.as_deref(), Some("PR-17"));
    assert_eq!(saved.id, Some(17));
    // The catalog item travels with the saved request.
    assert_eq!(saved.existing_folio_item_id.as_deref(), Some("i1"));
    assert!(saved.existing_folio_item.is_some());
}

#[tokio::test]
async fn test_catalog_payload_is_never_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/purchase-requests"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = req.body_json().unwrap();
            let leaked = body.get("existingFolioItem").is_some()
                || body.get("existingFolioItemId").is_some();
            if leaked {
                ResponseTemplate::new(400)
            } else {
                ResponseTemplate::new(201).set_body_json(json!({"key": "PR-1"}))
            }
        })
        .mount(&server)
        .await;

    let saved = client(&server).submit(&request()).await.unwrap();

    assert_eq!(saved.key.as_deref(), Some("PR-1"));
}

#[tokio::test]
async fn test_refused_submission_reports_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/purchase-requests"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let error = client(&server).submit(&request()).await.unwrap_err();

    assert_eq!(
        error,
        WorkflowError::UnexpectedStatus {
            status: 500,
            body: "boom".to_string(),
        }
    );
}

#[tokio::test]
async fn test_get_by_key_returns_decision() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/purchase-requests/PR-17"))
        .and(basic_auth("lost-items", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "PR-17",
            "status": "Approved",
            "updateDate": "2025-03-04T10:00:00Z",
            "librarianUsername": "selector",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let loaded = client(&server).get_by_key("PR-17").await.unwrap().unwrap();

    assert_eq!(loaded.status.as_deref(), Some("Approved"));
    assert_eq!(loaded.update_date.as_deref(), Some("2025-03-04T10:00:00Z"));
    assert!(loaded.existing_folio_item.is_none());
}

#[tokio::test]
async fn test_unknown_key_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/purchase-requests/PR-404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let loaded = client(&server).get_by_key("PR-404").await.unwrap();

    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_undecodable_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/purchase-requests/PR-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let error = client(&server).get_by_key("PR-1").await.unwrap_err();

    assert!(matches!(error, WorkflowError::DecodeFailed(_)));
}
