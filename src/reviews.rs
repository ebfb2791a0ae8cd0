//! Therapist reviews.
//!
//! A review is a WordPress comment on a therapist post. Rating, anonymity
//! and proof live in ACF fields that are written in a second request after
//! the comment exists, because the comments endpoint ignores `acf` on
//! create.

use crate::app_config;
use crate::reactions::{ReactionCounts, ReactionKind, ReactionState};
use crate::web::error::ApiError;
use crate::wordpress::{
    Backend, CommentFieldsPatch, CommentQuery, CommentUpdate, NewComment, WpComment, WpResult,
    WpUser, MAX_PER_PAGE, STATUS_HOLD,
};
use serde::Serialize;
use serde_json::Value;

/// Display name of reviews whose author asked to stay anonymous.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// A review that passed input validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidReview {
    pub post: u64,
    pub content: String,
    pub rating: u8,
    pub anonymous: bool,
    pub proof: Option<String>,
}

/// Who is submitting the review.
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewAuthor {
    /// WordPress user id when the caller is signed in.
    pub id: Option<u64>,
    pub name: String,
    pub email: String,
}

impl From<&WpUser> for ReviewAuthor {
    fn from(user: &WpUser) -> Self {
        Self {
            id: Some(user.id),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Parse a positive id given as a JSON number or numeric string.
pub fn parse_id(value: Option<&Value>) -> Option<u64> {
    let id = match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id > 0)
}

fn whole_number(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 1e9).then(|| f as i64)
}

/// Parse a rating given as a JSON number or string. Must be an integer 1..=5.
pub fn parse_rating(value: Option<&Value>) -> Result<u8, ApiError> {
    let invalid = || ApiError::BadRequest("Rating must be a whole number from 1 to 5".to_owned());

    let rating: i64 = match value {
        None | Some(Value::Null) => {
            return Err(ApiError::BadRequest(
                "Missing required fields: rating".to_owned(),
            ))
        }
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            None => n.as_f64().and_then(whole_number).ok_or_else(invalid)?,
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => i,
                Err(_) => s
                    .parse::<f64>()
                    .ok()
                    .and_then(whole_number)
                    .ok_or_else(invalid)?,
            }
        }
        Some(_) => return Err(invalid()),
    };

    if (1..=5).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(invalid())
    }
}

/// Parse a loose boolean flag ("1", "true", true, 1).
pub fn parse_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "yes" | "on"),
        _ => false,
    }
}

/// Validate the raw fields of a submission.
pub fn validate(
    post: Option<&Value>,
    content: Option<&str>,
    rating: Option<&Value>,
    anonymous: Option<&Value>,
    proof: Option<&str>,
) -> Result<ValidReview, ApiError> {
    let content = content.map(str::trim).unwrap_or_default();

    let mut missing = Vec::new();
    if post.map_or(true, Value::is_null) {
        missing.push("post");
    }
    if content.is_empty() {
        missing.push("content");
    }
    if rating.map_or(true, Value::is_null) {
        missing.push("rating");
    }
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let post = parse_id(post)
        .ok_or_else(|| ApiError::BadRequest("Invalid therapist id".to_owned()))?;
    let rating = parse_rating(rating)?;

    let max_length = app_config::limits().max_review_length;
    if content.chars().count() > max_length as usize {
        return Err(ApiError::BadRequest(format!(
            "Review must be at most {} characters",
            max_length
        )));
    }

    Ok(ValidReview {
        post,
        content: content.to_owned(),
        rating,
        anonymous: parse_flag(anonymous),
        proof: proof
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned),
    })
}

/// Whether `comment` was written by the holder of `email`.
///
/// Current reviews carry the email in `author_email`. Older ones stored the
/// email as the author name, which only counts when the review is not
/// anonymous.
pub fn is_by_email(comment: &WpComment, email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() {
        return false;
    }
    if comment.author_email.trim().eq_ignore_ascii_case(email) {
        return true;
    }
    !comment.acf.is_anonymous() && comment.author_name.trim().eq_ignore_ascii_case(email)
}

/// Look for an earlier review of `post` by `email`.
///
/// Only the most recent `duplicate_scan_limit` comments are scanned, in any
/// moderation state. Limits above one WordPress page are fetched page by page.
pub async fn find_duplicate(
    backend: &Backend,
    post: u64,
    email: &str,
) -> WpResult<Option<WpComment>> {
    let scan_limit = app_config::limits().duplicate_scan_limit;
    let limit = scan_limit as usize;
    let mut query = CommentQuery {
        post: Some(post),
        status: Some("all".to_owned()),
        per_page: scan_limit.clamp(1, MAX_PER_PAGE),
        page: 1,
        ..Default::default()
    };

    let mut scanned = 0;
    while scanned < limit {
        let page = backend.list_comments(&query).await?;
        let fetched = page.len();
        if let Some(found) = page
            .into_iter()
            .take(limit - scanned)
            .find(|comment| is_by_email(comment, email))
        {
            return Ok(Some(found));
        }
        scanned += fetched;
        if fetched < query.per_page as usize {
            break;
        }
        query.page += 1;
    }
    Ok(None)
}

fn review_fields(review: &ValidReview) -> CommentFieldsPatch {
    CommentFieldsPatch {
        rate: Some(review.rating.to_string()),
        anonymous: Some(if review.anonymous { "1" } else { "0" }.to_owned()),
        proof: review.proof.clone(),
        ..Default::default()
    }
}

/// Write comment fields through ACF, falling back to registered meta keys
/// when the ACF write is rejected.
pub async fn update_fields(
    backend: &Backend,
    comment_id: u64,
    patch: &CommentFieldsPatch,
) -> WpResult<WpComment> {
    match backend
        .update_comment(comment_id, &CommentUpdate::acf(patch.clone()))
        .await
    {
        Ok(updated) => Ok(updated),
        Err(err) => {
            log::warn!(
                "ACF update of comment {} failed, retrying as meta: {}",
                comment_id,
                err
            );
            backend
                .update_comment(comment_id, &CommentUpdate::meta(patch.clone()))
                .await
        }
    }
}

/// Store the rating fields of a freshly created review.
///
/// Failure is logged and the caller still gets the comment with the fields
/// applied locally, since the review itself was created.
async fn write_review_fields(
    backend: &Backend,
    mut comment: WpComment,
    patch: CommentFieldsPatch,
) -> WpComment {
    match update_fields(backend, comment.id, &patch).await {
        Ok(updated) => updated,
        Err(err) => {
            log::error!(
                "Could not store rating for comment {}; review kept without it: {}",
                comment.id,
                err
            );
            patch.apply_to(&mut comment.acf);
            comment
        }
    }
}

/// Create a review held for moderation.
pub async fn submit_review(
    backend: &Backend,
    review: ValidReview,
    author: ReviewAuthor,
) -> Result<WpComment, ApiError> {
    if find_duplicate(backend, review.post, &author.email)
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateReview);
    }

    let new_comment = NewComment {
        post: review.post,
        content: review.content.clone(),
        author: author.id,
        author_name: author.name,
        author_email: author.email,
        status: STATUS_HOLD.to_owned(),
    };
    let created = backend.create_comment(&new_comment).await?;
    log::info!(
        "Review {} created on therapist {} (awaiting moderation)",
        created.id,
        created.post
    );

    Ok(write_review_fields(backend, created, review_fields(&review)).await)
}

/// Whether `user` wrote `comment`.
pub fn is_owner(comment: &WpComment, user: &WpUser) -> bool {
    (comment.author != 0 && comment.author == user.id) || is_by_email(comment, &user.email)
}

/// Number of rated reviews and their mean rating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub review_count: usize,
    pub average_rating: Option<f64>,
}

impl RatingSummary {
    pub fn of(comments: &[WpComment]) -> Self {
        let ratings: Vec<u8> = comments.iter().filter_map(|c| c.acf.rating()).collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
            // One decimal place.
            Some((f64::from(sum) / ratings.len() as f64 * 10.0).round() / 10.0)
        };
        Self {
            review_count: comments.len(),
            average_rating,
        }
    }
}

/// A review as returned to clients.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: u64,
    pub post: u64,
    pub author_name: String,
    pub content: String,
    pub rating: Option<u8>,
    pub is_anonymous: bool,
    pub proof: Option<String>,
    pub date: String,
    pub status: String,
    pub reactions: ReactionCounts,
    pub user_reaction: Option<ReactionKind>,
    /// True when the caller wrote this review.
    pub is_own: bool,
}

impl ReviewView {
    pub fn new(comment: &WpComment, viewer: Option<&WpUser>) -> Self {
        let anonymous = comment.acf.is_anonymous();
        let state = ReactionState::from_fields(&comment.acf);
        Self {
            id: comment.id,
            post: comment.post,
            author_name: if anonymous {
                ANONYMOUS_NAME.to_owned()
            } else {
                comment.author_name.clone()
            },
            content: comment.content.rendered.clone(),
            rating: comment.acf.rating(),
            is_anonymous: anonymous,
            proof: comment.acf.proof.clone(),
            date: comment.date.clone(),
            status: comment.status.clone(),
            reactions: state.counts(),
            user_reaction: viewer.and_then(|user| state.reaction_of(&user.id.to_string())),
            is_own: viewer.map_or(false, |user| is_owner(comment, user)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordpress::{CommentFields, Rendered};
    use serde_json::json;

    fn comment(author: u64, name: &str, email: &str, anonymous: bool) -> WpComment {
        WpComment {
            id: 1,
            post: 2,
            author,
            author_name: name.to_string(),
            author_email: email.to_string(),
            content: Rendered {
                rendered: "<p>Great</p>".to_string(),
            },
            date: String::new(),
            status: "approved".to_string(),
            acf: CommentFields {
                rate: Some("4".to_string()),
                anonymous: Some(if anonymous { "1" } else { "0" }.to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_parse_rating_accepts_numbers_and_strings() {
        assert_eq!(parse_rating(Some(&json!(4))).unwrap(), 4);
        assert_eq!(parse_rating(Some(&json!("5"))).unwrap(), 5);
        assert_eq!(parse_rating(Some(&json!(" 1 "))).unwrap(), 1);
        assert_eq!(parse_rating(Some(&json!(3.0))).unwrap(), 3);
    }

    #[test]
    fn test_parse_rating_strings_follow_number_rules() {
        assert_eq!(parse_rating(Some(&json!("4.0"))).unwrap(), 4);
        assert_eq!(parse_rating(Some(&json!(4.0))).unwrap(), 4);
        for bad in [json!("2.5"), json!("6.0"), json!("NaN"), json!("inf")] {
            assert!(parse_rating(Some(&bad)).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_parse_rating_rejects_out_of_range_and_garbage() {
        for bad in [json!(0), json!(6), json!("abc"), json!(-1), json!(2.5), json!(true)] {
            assert!(
                matches!(parse_rating(Some(&bad)), Err(ApiError::BadRequest(_))),
                "{} should be rejected",
                bad
            );
        }
        assert!(parse_rating(None).is_err());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(Some(&json!(12))), Some(12));
        assert_eq!(parse_id(Some(&json!("12"))), Some(12));
        assert_eq!(parse_id(Some(&json!(0))), None);
        assert_eq!(parse_id(Some(&json!("x"))), None);
        assert_eq!(parse_id(None), None);
    }

    #[test]
    fn test_is_by_email_matches_case_insensitively() {
        let c = comment(0, "Sam", "Sam@Example.com", false);
        assert!(is_by_email(&c, "sam@example.com"));
        assert!(!is_by_email(&c, "other@example.com"));
        assert!(!is_by_email(&c, ""));
    }

    #[test]
    fn test_legacy_name_match_ignores_anonymous() {
        let legacy = comment(0, "sam@example.com", "", false);
        assert!(is_by_email(&legacy, "sam@example.com"));

        let anonymous = comment(0, "sam@example.com", "", true);
        assert!(!is_by_email(&anonymous, "sam@example.com"));
    }

    #[test]
    fn test_legacy_name_match_ignores_case() {
        let legacy = comment(0, "Sam@Example.com", "", false);
        assert!(is_by_email(&legacy, "sam@example.com"));
        assert!(is_by_email(&legacy, " SAM@EXAMPLE.COM "));
    }

    #[test]
    fn test_view_hides_anonymous_author() {
        let c = comment(9, "Sam", "sam@example.com", true);
        let view = ReviewView::new(&c, None);
        assert_eq!(view.author_name, ANONYMOUS_NAME);
        assert_eq!(view.rating, Some(4));
        assert!(!view.is_own);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("authorEmail").is_none());
        assert_eq!(json["isAnonymous"], json!(true));
    }

    #[test]
    fn test_rating_summary() {
        let mut a = comment(1, "A", "a@example.com", false);
        a.acf.rate = Some("5".to_string());
        let mut b = comment(2, "B", "b@example.com", false);
        b.acf.rate = Some("4".to_string());
        let mut unrated = comment(3, "C", "c@example.com", false);
        unrated.acf.rate = None;

        let summary = RatingSummary::of(&[a, b, unrated]);
        assert_eq!(summary.review_count, 3);
        assert_eq!(summary.average_rating, Some(4.5));
        assert_eq!(RatingSummary::of(&[]).average_rating, None);
    }

    #[test]
    fn test_owner_by_id_or_email() {
        let c = comment(9, "Sam", "sam@example.com", false);
        let owner = WpUser {
            id: 9,
            email: String::new(),
            name: "Sam".to_string(),
            acf: Default::default(),
        };
        let by_email = WpUser {
            id: 4,
            email: "SAM@example.com".to_string(),
            ..owner.clone()
        };
        let stranger = WpUser {
            id: 5,
            email: "x@example.com".to_string(),
            ..owner.clone()
        };
        assert!(is_owner(&c, &owner));
        assert!(is_owner(&c, &by_email));
        assert!(!is_owner(&c, &stranger));
    }
}
