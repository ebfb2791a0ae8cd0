mod common;
use serial_test::serial;

use actix_web::{http::StatusCode, test};
use common::{backend::*, fixtures::*};
use serde_json::json;
use std::time::Duration;
use therapist_reviews::app_config;
use therapist_reviews::rate_limit::{
    check_reaction_rate_limit, check_review_rate_limit, RateLimiter,
};

#[core::prelude::v1::test]
#[serial]
fn test_review_rate_limit_uses_config() {
    let mut config = test_config();
    config.rate_limit.reviews_per_hour = 2;
    app_config::set_config(config);

    for i in 0..2 {
        assert!(
            check_review_rate_limit("ip:198.51.100.40").is_ok(),
            "Review {} should be allowed within rate limit",
            i + 1
        );
    }
    let err = check_review_rate_limit("ip:198.51.100.40").unwrap_err();
    assert!(err.retry_after_seconds > 0);
    assert!(err.retry_after_seconds <= 3600);

    // Another identifier is unaffected
    assert!(check_review_rate_limit("ip:198.51.100.41").is_ok());
}

#[core::prelude::v1::test]
#[serial]
fn test_reaction_rate_limit_per_user() {
    let mut config = test_config();
    config.rate_limit.reactions_per_minute = 3;
    app_config::set_config(config);

    for _ in 0..3 {
        check_reaction_rate_limit(424_242).unwrap();
    }
    assert!(check_reaction_rate_limit(424_242).is_err());
    assert!(check_reaction_rate_limit(424_243).is_ok());
}

#[core::prelude::v1::test]
fn test_window_expiry() {
    let limiter = RateLimiter::new();
    let window = Duration::from_millis(50);

    limiter.check_rate_limit("expiry", "user", 1, window).unwrap();
    assert!(limiter.check_rate_limit("expiry", "user", 1, window).is_err());

    std::thread::sleep(Duration::from_millis(80));
    assert!(
        limiter.check_rate_limit("expiry", "user", 1, window).is_ok(),
        "Old requests should fall out of the window"
    );
}

#[actix_rt::test]
#[serial]
async fn test_limited_reaction_returns_429_with_retry_after() {
    let memory = setup_test_backend();
    let mut config = test_config();
    config.rate_limit.reactions_per_minute = 1;
    app_config::set_config(config);

    let therapist = create_test_therapist(&memory, "Dr Rivera");
    let comment = create_review_with_reactions(&memory, 0, therapist.id, "", "");
    let user = create_test_user(&memory, "hasty");
    // User ids restart with every memory backend; forget earlier tests.
    therapist_reviews::rate_limit::RATE_LIMITER.clear_requests("reaction", &user.id.to_string());
    let app = test_app!(memory);

    let toggle = || {
        test::TestRequest::post()
            .uri(&format!("/api/comments/{}/reactions", comment.id))
            .insert_header(user.bearer())
            .set_json(json!({ "reactionType": "useful" }))
            .to_request()
    };

    assert_eq!(test::call_service(&app, toggle()).await.status(), StatusCode::OK);
    let resp = test::call_service(&app, toggle()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key("retry-after"));
}

#[actix_rt::test]
#[serial]
async fn test_zero_limit_disables_feedback() {
    let memory = setup_test_backend();
    let mut config = test_config();
    config.rate_limit.feedback_per_hour = 0;
    app_config::set_config(config);
    therapist_reviews::email::take_mock_outbox();
    let app = test_app!(memory);

    let req = test::TestRequest::post()
        .uri("/api/feedback")
        .insert_header(("x-forwarded-for", "198.51.100.77"))
        .set_json(json!({
            "name": "Sam",
            "email": "sam@example.com",
            "message": "Is anyone reading these?",
            "website": "",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        resp.headers().get("retry-after").and_then(|v| v.to_str().ok()),
        Some("3600")
    );
    assert!(therapist_reviews::email::take_mock_outbox().is_empty());
}
