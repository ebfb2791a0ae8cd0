//! Tests of the REST backend against a fake WordPress

mod common;
use serial_test::serial;

use actix_web::{http::StatusCode, test, ResponseError};
use common::backend::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use therapist_reviews::acf::IdList;
use therapist_reviews::app_config::{TimeoutConfig, WordPressConfig};
use therapist_reviews::web::error::ApiError;
use therapist_reviews::wordpress::rest::RestBackend;
use therapist_reviews::wordpress::{
    CommentFieldsPatch, CommentQuery, CommentUpdate, WordPressBackend, WpError,
};
use wiremock::matchers::{body_json, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(base_url: &str, read_seconds: u64) -> RestBackend {
    let config = WordPressConfig {
        backend: "rest".to_string(),
        base_url: format!("{}/", base_url),
        system_username: "system".to_string(),
        system_password: "app password".to_string(),
    };
    let timeouts = TimeoutConfig {
        read_seconds,
        write_seconds: read_seconds,
    };
    RestBackend::new(&config, timeouts).unwrap()
}

#[actix_rt::test]
async fn test_missing_comment_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/comments/5"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "rest_comment_invalid_id",
            "message": "Invalid comment ID.",
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server.uri(), 5);
    let err = backend.get_comment(5).await.unwrap_err();
    assert!(matches!(err, WpError::NotFound(_)));
    assert_eq!(ApiError::from(err).status_code(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_list_comments_query_and_tolerant_acf() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/comments"))
        .and(query_param("post", "9"))
        .and(query_param("status", "approve"))
        .and(query_param("orderby", "date"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 2, "post": 9, "author_name": "Ana",
                "content": { "rendered": "<p>Good</p>" },
                "acf": { "rate": "5", "useful": "3,4", "loved": false }
            },
            { "id": 1, "post": 9, "author_name": "Bo", "acf": [] }
        ])))
        .mount(&server)
        .await;

    let backend = backend_for(&server.uri(), 5);
    let comments = backend
        .list_comments(&CommentQuery::for_post(9))
        .await
        .unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].acf.rating(), Some(5));
    assert_eq!(comments[0].acf.useful.len(), 2);
    assert!(comments[1].acf.useful.is_empty());
}

#[actix_rt::test]
async fn test_update_comment_sends_encoded_lists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/comments/7"))
        .and(body_json(json!({ "acf": { "useful": "3,8", "loved": "" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "post": 9, "acf": { "useful": "3,8", "loved": "" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server.uri(), 5);
    let patch = CommentFieldsPatch {
        useful: Some(IdList::decode("3,8")),
        loved: Some(IdList::new()),
        ..Default::default()
    };
    let updated = backend
        .update_comment(7, &CommentUpdate::acf(patch))
        .await
        .unwrap();
    assert_eq!(updated.acf.useful.encode(), "3,8");
}

#[actix_rt::test]
async fn test_rejected_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "rest_not_logged_in",
            "message": "You are not currently logged in.",
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server.uri(), 5);
    assert!(matches!(
        backend.validate_token("expired").await,
        Err(WpError::Unauthorized)
    ));
}

#[actix_rt::test]
async fn test_slow_wordpress_is_gateway_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/12"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 12 }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let backend = backend_for(&server.uri(), 1);
    let err = backend.get_user(12).await.unwrap_err();
    assert!(matches!(err, WpError::Timeout), "got {:?}", err);

    let api_error = ApiError::from(err);
    assert_eq!(api_error.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(api_error.code(), Some("UPSTREAM_TIMEOUT"));
}

#[actix_rt::test]
async fn test_refused_connection_is_service_unavailable() {
    // Nothing listens on port 1.
    let backend = backend_for("http://127.0.0.1:1", 2);
    let err = backend.get_comment(1).await.unwrap_err();
    assert!(matches!(err, WpError::ConnectionRefused), "got {:?}", err);
    assert_eq!(
        ApiError::from(err).status_code(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[actix_rt::test]
#[serial]
async fn test_upstream_error_reaches_client_as_json() {
    let _ = setup_test_backend();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/therapists/44"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "code": "internal_server_error",
            "message": "There has been a critical error on this website.",
        })))
        .mount(&server)
        .await;

    let rest = Arc::new(backend_for(&server.uri(), 5));
    let app = test_app!(rest);

    let req = test::TestRequest::get()
        .uri("/api/therapists/44")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(
        body["error"],
        json!("There has been a critical error on this website.")
    );
}
