//! JSON error responses.
//!
//! Handlers never let an error escape as HTML or a bare status: everything
//! becomes `{"success": false, "error": "...", "code"?: "..."}`.

use crate::wordpress::WpError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;
use serde::Serialize;

/// Machine-readable code clients check to show "already reviewed".
pub const DUPLICATE_REVIEW: &str = "DUPLICATE_REVIEW";

#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "You have already reviewed this therapist.")]
    DuplicateReview,
    #[display(fmt = "{}", _0)]
    PayloadTooLarge(String),
    #[display(fmt = "{}", _0)]
    UnsupportedMediaType(String),
    #[display(fmt = "Too many requests. Try again in {} seconds.", retry_after_seconds)]
    TooManyRequests { retry_after_seconds: u64 },
    #[display(fmt = "{}", message)]
    Upstream { status: u16, message: String },
    #[display(fmt = "The server took too long to respond. Please try again.")]
    GatewayTimeout,
    #[display(fmt = "{}", _0)]
    BadGateway(String),
    #[display(fmt = "The server refused the connection. Please try again later.")]
    ServiceUnavailable,
    #[display(fmt = "{}", _0)]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

impl ApiError {
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::DuplicateReview => Some(DUPLICATE_REVIEW),
            ApiError::GatewayTimeout => Some("UPSTREAM_TIMEOUT"),
            ApiError::ServiceUnavailable => Some("UPSTREAM_UNAVAILABLE"),
            _ => None,
        }
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Authentication required".to_owned())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateReview => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if let ApiError::TooManyRequests {
            retry_after_seconds,
        } = self
        {
            response.insert_header(("Retry-After", retry_after_seconds.to_string()));
        }
        response.json(ErrorBody {
            success: false,
            error: self.to_string(),
            code: self.code(),
        })
    }
}

impl From<WpError> for ApiError {
    fn from(err: WpError) -> Self {
        match err {
            WpError::Timeout => ApiError::GatewayTimeout,
            WpError::ConnectionReset => ApiError::BadGateway(
                "Connection to the server was reset. Please try again.".to_owned(),
            ),
            WpError::ConnectionRefused => ApiError::ServiceUnavailable,
            WpError::Network(msg) => {
                log::error!("WordPress unreachable: {}", msg);
                ApiError::BadGateway("Could not reach the server.".to_owned())
            }
            WpError::Unauthorized => ApiError::Unauthorized("Invalid or expired token".to_owned()),
            WpError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            WpError::Upstream { status, message } => ApiError::Upstream { status, message },
            WpError::Decode(msg) => {
                log::error!("Unexpected WordPress response: {}", msg);
                ApiError::BadGateway("Unexpected response from the server.".to_owned())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, _)| field.to_string())
            .collect();
        ApiError::BadRequest(format!("Invalid fields: {}", fields.join(", ")))
    }
}

impl From<actix_multipart::MultipartError> for ApiError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        log::warn!("multipart read error: {}", err);
        ApiError::BadRequest("Error interpreting upload.".to_owned())
    }
}

impl From<crate::rate_limit::RateLimitError> for ApiError {
    fn from(err: crate::rate_limit::RateLimitError) -> Self {
        ApiError::TooManyRequests {
            retry_after_seconds: err.retry_after_seconds,
        }
    }
}

/// Extractor error handlers so malformed JSON/query/path input is reported in the same shape.
pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

pub fn query_config() -> actix_web::web::QueryConfig {
    actix_web::web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

pub fn path_config() -> actix_web::web::PathConfig {
    actix_web::web::PathConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}
