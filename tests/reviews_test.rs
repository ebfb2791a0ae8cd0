//! Integration tests for review submission, listing and owner actions

mod common;
use serial_test::serial;

use actix_web::{http::StatusCode, test};
use common::{backend::*, fixtures::*};
use serde_json::{json, Value};
use therapist_reviews::app_config;
use therapist_reviews::wordpress::STATUS_HOLD;

fn submit(body: Value) -> test::TestRequest {
    test::TestRequest::post().uri("/api/comments").set_json(body)
}

#[actix_rt::test]
#[serial]
async fn test_guest_review_is_held_with_rating() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    let app = test_app!(memory);

    let req = submit(json!({
        "post": therapist.id,
        "content": "Very attentive.",
        "rating": "4",
        "author_name": "Sam",
        "author_email": "sam@example.com",
    }))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["review"]["rating"], json!(4));

    let id = body["review"]["id"].as_u64().unwrap();
    let stored = memory.comment(id).unwrap();
    assert_eq!(stored.status, STATUS_HOLD);
    assert_eq!(stored.author_email, "sam@example.com");
    assert_eq!(stored.acf.rate.as_deref(), Some("4"));
    assert_eq!(stored.acf.anonymous.as_deref(), Some("0"));
}

#[actix_rt::test]
#[serial]
async fn test_invalid_ratings_create_nothing() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    let app = test_app!(memory);

    for rating in [json!(0), json!(6), json!("abc"), json!(null)] {
        let req = submit(json!({
            "post": therapist.id,
            "content": "Fine.",
            "rating": rating,
            "author_email": "sam@example.com",
        }))
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "rating {}", rating);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
    }

    assert_eq!(memory.comment_count(), 0);
}

#[actix_rt::test]
#[serial]
async fn test_second_review_is_duplicate() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    let app = test_app!(memory);

    let review = json!({
        "post": therapist.id,
        "content": "Great listener.",
        "rating": 5,
        "author_email": "sam@example.com",
    });
    let resp = test::call_service(&app, submit(review.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let mut again = review;
    again["author_email"] = json!("SAM@example.com");
    let resp = test::call_service(&app, submit(again).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], json!("DUPLICATE_REVIEW"));
    assert_eq!(memory.comment_count(), 1);
}

#[actix_rt::test]
#[serial]
async fn test_legacy_review_with_email_as_name_is_duplicate() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    create_test_review(&memory, therapist.id, "Old@Example.com", "", 3);
    let app = test_app!(memory);

    let req = submit(json!({
        "post": therapist.id,
        "content": "Again.",
        "rating": 3,
        "author_email": "old@example.com",
    }))
    .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::CONFLICT
    );
}

#[actix_rt::test]
#[serial]
async fn test_signed_in_review_uses_account_identity() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    let user = create_test_user(&memory, "member");
    let app = test_app!(memory);

    let req = submit(json!({
        "post": therapist.id,
        "content": "Helped me a lot.",
        "rating": 5,
        "isAnonymous": true,
    }))
    .insert_header(user.bearer())
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["review"]["authorName"], json!("Anonymous"));
    assert_eq!(body["review"]["isOwn"], json!(true));

    let id = body["review"]["id"].as_u64().unwrap();
    let stored = memory.comment(id).unwrap();
    assert_eq!(stored.author, user.id);
    assert_eq!(stored.author_email, user.email);
    assert!(stored.acf.is_anonymous());
}

#[actix_rt::test]
#[serial]
async fn test_meta_fallback_when_acf_fails() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    memory.set_fail_acf_updates(true);
    let app = test_app!(memory);

    let req = submit(json!({
        "post": therapist.id,
        "content": "Good.",
        "rating": 2,
        "author_email": "meta@example.com",
    }))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    // One rejected ACF write, one meta write.
    assert_eq!(memory.comment_update_count(), 2);

    let body: Value = test::read_body_json(resp).await;
    let stored = memory.comment(body["review"]["id"].as_u64().unwrap()).unwrap();
    assert_eq!(stored.acf.rating(), Some(2));
}

#[actix_rt::test]
#[serial]
async fn test_field_write_failure_is_swallowed() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    memory.set_fail_acf_updates(true);
    memory.set_fail_meta_updates(true);
    let app = test_app!(memory);

    let req = submit(json!({
        "post": therapist.id,
        "content": "Good.",
        "rating": 4,
        "author_email": "lost@example.com",
    }))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["review"]["rating"], json!(4));
    assert_eq!(memory.comment_count(), 1);
}

#[actix_rt::test]
#[serial]
async fn test_list_and_check_user_review() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    create_test_review(&memory, therapist.id, "Ana", "ana@example.com", 5);
    create_test_review(&memory, therapist.id, "Bo", "bo@example.com", 4);
    let pending = create_test_review(&memory, therapist.id, "Cy", "cy@example.com", 1);
    memory.set_comment_status(pending.id, STATUS_HOLD);
    let app = test_app!(memory);

    let req = test::TestRequest::get()
        .uri(&format!("/api/comments?post={}", therapist.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["reviews"].as_array().unwrap().len(), 2);
    assert_eq!(body["summary"]["averageRating"], json!(4.5));
    assert!(body["reviews"][0].get("authorEmail").is_none());

    // Pending reviews still count for the duplicate check.
    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/comments?checkUserReview&post={}&authorEmail=cy@example.com",
            therapist.id
        ))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["hasReviewed"], json!(true));
    assert_eq!(body["reviewId"], json!(pending.id));

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/comments?checkUserReview&post={}&authorEmail=new@example.com",
            therapist.id
        ))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["hasReviewed"], json!(false));
}

#[actix_rt::test]
#[serial]
async fn test_only_owner_can_change_or_delete() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    let owner = create_test_user(&memory, "owner");
    let stranger = create_test_user(&memory, "stranger");
    let review = create_test_review(&memory, therapist.id, "owner", &owner.email, 4);
    let app = test_app!(memory);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/comments/{}", review.id))
        .insert_header(stranger.bearer())
        .set_json(json!({ "isAnonymous": true }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::patch()
        .uri(&format!("/api/comments/{}", review.id))
        .insert_header(owner.bearer())
        .set_json(json!({ "isAnonymous": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(memory.comment(review.id).unwrap().acf.is_anonymous());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/comments/{}", review.id))
        .insert_header(stranger.bearer())
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );
    assert!(memory.comment(review.id).is_some());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/comments/{}", review.id))
        .insert_header(owner.bearer())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(memory.comment(review.id).is_none());
}

#[actix_rt::test]
#[serial]
async fn test_string_rating_with_zero_fraction_is_accepted() {
    let memory = setup_test_backend();
    let therapist = create_test_therapist(&memory, "Dr Rivera");
    let app = test_app!(memory);

    let req = submit(json!({
        "post": therapist.id,
        "content": "Calm and kind.",
        "rating": "4.0",
        "author_email": "kim@example.com",
    }))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["review"]["rating"], json!(4));
}

#[actix_rt::test]
#[serial]
async fn test_duplicate_scan_reaches_past_first_page() {
    let memory = setup_test_backend();
    let mut config = test_config();
    config.limits.duplicate_scan_limit = 150;
    app_config::set_config(config);

    let therapist = create_test_therapist(&memory, "Dr Rivera");
    create_test_review(&memory, therapist.id, "Early", "early@example.com", 5);
    for i in 0..120 {
        create_test_review(
            &memory,
            therapist.id,
            "Reader",
            &format!("reader{}@example.com", i),
            4,
        );
    }
    let app = test_app!(memory);

    let req = submit(json!({
        "post": therapist.id,
        "content": "Back again.",
        "rating": 5,
        "author_email": "early@example.com",
    }))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(memory.comment_count(), 121);
}

#[actix_rt::test]
#[serial]
async fn test_duplicate_scan_stops_at_limit() {
    let memory = setup_test_backend();
    let mut config = test_config();
    config.limits.duplicate_scan_limit = 100;
    app_config::set_config(config);

    let therapist = create_test_therapist(&memory, "Dr Rivera");
    create_test_review(&memory, therapist.id, "Early", "early@example.com", 5);
    for i in 0..100 {
        create_test_review(
            &memory,
            therapist.id,
            "Reader",
            &format!("reader{}@example.com", i),
            4,
        );
    }
    let app = test_app!(memory);

    let req = submit(json!({
        "post": therapist.id,
        "content": "Back again.",
        "rating": 5,
        "author_email": "early@example.com",
    }))
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}
