//! Feedback form endpoint

use crate::email::templates::{send_feedback_email, Feedback};
use crate::rate_limit::{check_feedback_rate_limit, client_ip};
use crate::web::error::ApiError;
use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(send_feedback);
}

#[derive(Deserialize, Validate)]
pub struct FeedbackRequest {
    #[serde(default)]
    #[validate(length(max = 100))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 1, max = 5000))]
    message: String,
    /// Honeypot. Hidden from people, filled in by bots.
    #[serde(default)]
    website: String,
}

#[post("/api/feedback")]
async fn send_feedback(
    req: HttpRequest,
    body: web::Json<FeedbackRequest>,
) -> Result<HttpResponse, ApiError> {
    let ok = || HttpResponse::Ok().json(serde_json::json!({ "success": true }));

    if !body.website.trim().is_empty() {
        log::info!("Dropped feedback with honeypot filled from {}", client_ip(&req));
        return Ok(ok());
    }

    body.validate()?;
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message cannot be blank".to_owned()));
    }
    check_feedback_rate_limit(&client_ip(&req))?;

    let feedback = Feedback {
        name: body.name.trim().to_owned(),
        email: body.email.trim().to_owned(),
        message: body.message.trim().to_owned(),
    };
    send_feedback_email(&feedback).await.map_err(|e| {
        log::error!("send_feedback: {}", e);
        ApiError::Internal("Could not send your message. Please try again later.".to_owned())
    })?;

    Ok(ok())
}
