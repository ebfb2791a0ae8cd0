//! Review (comment) endpoints

use crate::middleware::ClientCtx;
use crate::rate_limit::{check_review_rate_limit, client_ip};
use crate::reviews::{
    self, find_duplicate, is_owner, parse_flag, parse_id, RatingSummary, ReviewAuthor, ReviewView,
};
use crate::web::error::ApiError;
use crate::wordpress::{Backend, CommentFieldsPatch, CommentQuery};
use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_comments)
        .service(create_comment)
        .service(update_comment)
        .service(delete_comment);
}

#[derive(Deserialize)]
struct CreateCommentRequest {
    post: Option<Value>,
    content: Option<String>,
    rating: Option<Value>,
    #[serde(rename = "isAnonymous", alias = "anonymous")]
    is_anonymous: Option<Value>,
    proof: Option<String>,
    /// Guest display name. `author` is accepted for older clients.
    #[serde(alias = "author")]
    author_name: Option<String>,
    #[serde(alias = "authorEmail")]
    author_email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCommentsQuery {
    post: Option<String>,
    include: Option<String>,
    check_user_review: Option<String>,
    author_email: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCommentRequest {
    #[serde(alias = "anonymous")]
    is_anonymous: Option<Value>,
}

#[derive(Serialize)]
struct ReviewResponse {
    success: bool,
    message: &'static str,
    review: ReviewView,
}

#[derive(Serialize)]
struct ReviewListResponse {
    success: bool,
    reviews: Vec<ReviewView>,
    summary: RatingSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HasReviewedResponse {
    success: bool,
    has_reviewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    review_id: Option<u64>,
}

#[derive(Serialize)]
struct DeletedResponse {
    success: bool,
    deleted: u64,
}

fn guest_author(body: &CreateCommentRequest) -> Result<ReviewAuthor, ApiError> {
    let email = body
        .author_email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required fields: author_email".to_owned()))?;
    if !validator::validate_email(email) {
        return Err(ApiError::BadRequest("Invalid email address".to_owned()));
    }
    let name = body
        .author_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(email);

    Ok(ReviewAuthor {
        id: None,
        name: name.to_owned(),
        email: email.to_owned(),
    })
}

/// Submit a review. It is held for moderation.
#[post("/api/comments")]
async fn create_comment(
    req: HttpRequest,
    client: ClientCtx,
    backend: web::Data<Backend>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let review = reviews::validate(
        body.post.as_ref(),
        body.content.as_deref(),
        body.rating.as_ref(),
        body.is_anonymous.as_ref(),
        body.proof.as_deref(),
    )?;

    let author = match client.get_user() {
        Some(user) => ReviewAuthor::from(user),
        None => guest_author(&body)?,
    };

    let limit_key = match author.id {
        Some(id) => format!("user:{}", id),
        None => format!("ip:{}", client_ip(&req)),
    };
    check_review_rate_limit(&limit_key)?;

    let created = reviews::submit_review(&backend, review, author).await?;

    Ok(HttpResponse::Created().json(ReviewResponse {
        success: true,
        message: "Review submitted and awaiting moderation",
        review: ReviewView::new(&created, client.get_user()),
    }))
}

/// List reviews.
///
/// - `?post=<id>`: approved reviews of a therapist
/// - `?include=1,2,3`: approved reviews by id
/// - `?checkUserReview&post=<id>&authorEmail=<email>`: whether that email
///   already reviewed the therapist
#[get("/api/comments")]
async fn list_comments(
    client: ClientCtx,
    backend: web::Data<Backend>,
    query: web::Query<ListCommentsQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let post = match query.post.as_deref() {
        Some(raw) => Some(
            parse_id(Some(&Value::String(raw.to_owned())))
                .ok_or_else(|| ApiError::BadRequest("Invalid post id".to_owned()))?,
        ),
        None => None,
    };

    if query.check_user_review.is_some() {
        let post =
            post.ok_or_else(|| ApiError::BadRequest("Missing required fields: post".to_owned()))?;
        let email = query
            .author_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_owned)
            .or_else(|| client.get_user().map(|user| user.email.clone()))
            .ok_or_else(|| {
                ApiError::BadRequest("Missing required fields: authorEmail".to_owned())
            })?;

        let existing = find_duplicate(&backend, post, &email).await?;
        return Ok(HttpResponse::Ok().json(HasReviewedResponse {
            success: true,
            has_reviewed: existing.is_some(),
            review_id: existing.map(|c| c.id),
        }));
    }

    let include: Vec<u64> = query
        .include
        .as_deref()
        .map(|raw| crate::acf::IdList::decode(raw).to_ids())
        .unwrap_or_default();

    if post.is_none() && include.is_empty() {
        return Err(ApiError::BadRequest(
            "Provide a post id or an include list".to_owned(),
        ));
    }

    let comment_query = CommentQuery {
        post,
        include,
        status: None,
        per_page: query.per_page.unwrap_or(100).clamp(1, 100),
        page: query.page.unwrap_or(1).max(1),
    };
    let comments = backend.list_comments(&comment_query).await?;

    Ok(HttpResponse::Ok().json(ReviewListResponse {
        success: true,
        summary: RatingSummary::of(&comments),
        reviews: comments
            .iter()
            .map(|comment| ReviewView::new(comment, client.get_user()))
            .collect(),
    }))
}

/// Change the anonymity of one's own review.
#[patch("/api/comments/{comment_id}")]
async fn update_comment(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<u64>,
    body: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = client.require_login()?;
    let raw = body
        .is_anonymous
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("Missing required fields: isAnonymous".to_owned()))?;

    let comment = backend.get_comment(path.into_inner()).await?;
    if !is_owner(&comment, user) {
        return Err(ApiError::Forbidden(
            "You can only change your own reviews".to_owned(),
        ));
    }

    let patch = CommentFieldsPatch {
        anonymous: Some(if parse_flag(Some(raw)) { "1" } else { "0" }.to_owned()),
        ..Default::default()
    };
    let updated = reviews::update_fields(&backend, comment.id, &patch).await?;

    Ok(HttpResponse::Ok().json(ReviewResponse {
        success: true,
        message: "Review updated",
        review: ReviewView::new(&updated, Some(user)),
    }))
}

/// Delete one's own review.
#[delete("/api/comments/{comment_id}")]
async fn delete_comment(
    client: ClientCtx,
    backend: web::Data<Backend>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let user = client.require_login()?;
    let comment = backend.get_comment(path.into_inner()).await?;
    if !is_owner(&comment, user) {
        return Err(ApiError::Forbidden(
            "You can only delete your own reviews".to_owned(),
        ));
    }

    backend.delete_comment(comment.id).await?;
    log::info!("User {} deleted review {}", user.id, comment.id);

    Ok(HttpResponse::Ok().json(DeletedResponse {
        success: true,
        deleted: comment.id,
    }))
}
