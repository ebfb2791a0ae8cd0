//! WordPress gateway.
//!
//! WordPress owns every persistent record: users, review comments,
//! therapist posts and media. Handlers reach it through the
//! [`WordPressBackend`] trait. Two backends exist:
//! - `rest`: a real WordPress over its REST API
//! - `memory`: an in-process store for local development and tests

pub mod memory;
pub mod rest;

use crate::acf::{self, IdList};
use actix_web::web::Bytes;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Comment status WordPress assigns to reviews awaiting moderation.
pub const STATUS_HOLD: &str = "hold";
/// Comment status of published reviews.
pub const STATUS_APPROVED: &str = "approved";

pub type WpResult<T> = Result<T, WpError>;

/// Failures talking to WordPress.
#[derive(Clone, Debug)]
pub enum WpError {
    /// The request did not complete within its timeout
    Timeout,
    /// The connection was reset mid-request
    ConnectionReset,
    /// Nothing accepted the connection
    ConnectionRefused,
    /// Any other transport failure
    Network(String),
    /// The token was missing, invalid or expired
    Unauthorized,
    /// The resource does not exist
    NotFound(String),
    /// WordPress answered with an error status
    Upstream { status: u16, message: String },
    /// WordPress answered with a body we could not interpret
    Decode(String),
}

impl std::fmt::Display for WpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WpError::Timeout => write!(f, "WordPress request timed out"),
            WpError::ConnectionReset => write!(f, "WordPress connection reset"),
            WpError::ConnectionRefused => write!(f, "WordPress connection refused"),
            WpError::Network(msg) => write!(f, "WordPress network error: {}", msg),
            WpError::Unauthorized => write!(f, "Invalid or expired token"),
            WpError::NotFound(what) => write!(f, "Not found: {}", what),
            WpError::Upstream { status, message } => {
                write!(f, "WordPress returned {}: {}", status, message)
            }
            WpError::Decode(msg) => write!(f, "Unexpected WordPress response: {}", msg),
        }
    }
}

impl std::error::Error for WpError {}

/// Custom fields attached to a user.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserFields {
    pub favorites_therapists: IdList,
    #[serde(deserialize_with = "acf::deserialize_loose_string")]
    pub profile_photo: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WpUser {
    pub id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "acf::deserialize_fields")]
    pub acf: UserFields,
}

/// A token issued by the JWT plugin.
#[derive(Clone, Debug)]
pub struct AuthToken {
    pub token: String,
    pub user: WpUser,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Partial user update. Unset fields are left alone.
#[derive(Clone, Debug, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acf: Option<UserFieldsPatch>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct UserFieldsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorites_therapists: Option<IdList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}

/// Custom fields attached to a review comment.
///
/// `rate` and `anonymous` are strings in ACF ("1".."5", "0"/"1").
/// The four reaction fields list the user ids that reacted with that type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentFields {
    #[serde(deserialize_with = "acf::deserialize_loose_string")]
    pub rate: Option<String>,
    #[serde(deserialize_with = "acf::deserialize_loose_string")]
    pub anonymous: Option<String>,
    #[serde(deserialize_with = "acf::deserialize_loose_string")]
    pub proof: Option<String>,
    pub useful: IdList,
    pub loved: IdList,
    pub thankful: IdList,
    #[serde(rename = "oh-no")]
    pub oh_no: IdList,
}

impl CommentFields {
    pub fn rating(&self) -> Option<u8> {
        self.rate
            .as_deref()
            .and_then(|r| r.trim().parse().ok())
            .filter(|r| (1..=5).contains(r))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.anonymous.as_deref(), Some("1") | Some("true"))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WpComment {
    pub id: u64,
    pub post: u64,
    /// WordPress user id of the author, 0 for guests
    #[serde(default)]
    pub author: u64,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "acf::deserialize_fields")]
    pub acf: CommentFields,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewComment {
    pub post: u64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<u64>,
    pub author_name: String,
    pub author_email: String,
    pub status: String,
}

/// Writable subset of [`CommentFields`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CommentFieldsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub useful: Option<IdList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loved: Option<IdList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thankful: Option<IdList>,
    #[serde(rename = "oh-no", skip_serializing_if = "Option::is_none")]
    pub oh_no: Option<IdList>,
}

impl CommentFieldsPatch {
    /// Overlay the set values onto stored fields.
    pub fn apply_to(&self, fields: &mut CommentFields) {
        if let Some(rate) = &self.rate {
            fields.rate = Some(rate.clone());
        }
        if let Some(anonymous) = &self.anonymous {
            fields.anonymous = Some(anonymous.clone());
        }
        if let Some(proof) = &self.proof {
            fields.proof = Some(proof.clone());
        }
        if let Some(useful) = &self.useful {
            fields.useful = useful.clone();
        }
        if let Some(loved) = &self.loved {
            fields.loved = loved.clone();
        }
        if let Some(thankful) = &self.thankful {
            fields.thankful = thankful.clone();
        }
        if let Some(oh_no) = &self.oh_no {
            fields.oh_no = oh_no.clone();
        }
    }
}

/// A comment update goes either through ACF or, as a fallback, through
/// registered meta keys.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CommentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acf: Option<CommentFieldsPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<CommentFieldsPatch>,
}

impl CommentUpdate {
    pub fn acf(patch: CommentFieldsPatch) -> Self {
        Self {
            acf: Some(patch),
            meta: None,
        }
    }

    pub fn meta(patch: CommentFieldsPatch) -> Self {
        Self {
            acf: None,
            meta: Some(patch),
        }
    }
}

/// Largest page WordPress collection endpoints will return.
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Clone, Debug, Default)]
pub struct CommentQuery {
    pub post: Option<u64>,
    pub include: Vec<u64>,
    /// None means "approved only", the WordPress default
    pub status: Option<String>,
    pub per_page: u32,
    pub page: u32,
}

impl CommentQuery {
    pub fn for_post(post: u64) -> Self {
        Self {
            post: Some(post),
            per_page: MAX_PER_PAGE,
            page: 1,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct MediaUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WpMedia {
    pub id: u64,
    pub source_url: String,
}

/// A media file fetched back from WordPress uploads.
pub struct MediaObject {
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TherapistFields {
    pub specialties: String,
    pub city: String,
    #[serde(deserialize_with = "acf::deserialize_loose_string")]
    pub photo: Option<String>,
    #[serde(deserialize_with = "acf::deserialize_loose_string")]
    pub price: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Therapist {
    pub id: u64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default, deserialize_with = "acf::deserialize_fields")]
    pub acf: TherapistFields,
}

#[derive(Clone, Debug, Default)]
pub struct TherapistQuery {
    pub search: Option<String>,
    pub include: Vec<u64>,
    pub per_page: u32,
    pub page: u32,
}

/// Everything this service needs from WordPress.
#[async_trait]
pub trait WordPressBackend: Send + Sync {
    /// Resolve a JWT to the user it belongs to.
    async fn validate_token(&self, token: &str) -> WpResult<WpUser>;

    /// Exchange credentials for a JWT.
    async fn issue_token(&self, email: &str, password: &str) -> WpResult<AuthToken>;

    /// Create an account through the JWT plugin registration endpoint.
    async fn register_user(&self, user: &NewUser) -> WpResult<WpUser>;

    async fn find_user_by_email(&self, email: &str) -> WpResult<Option<WpUser>>;

    async fn get_user(&self, id: u64) -> WpResult<WpUser>;

    async fn update_user(&self, id: u64, update: &UserUpdate) -> WpResult<WpUser>;

    async fn get_comment(&self, id: u64) -> WpResult<WpComment>;

    async fn list_comments(&self, query: &CommentQuery) -> WpResult<Vec<WpComment>>;

    async fn create_comment(&self, comment: &NewComment) -> WpResult<WpComment>;

    async fn update_comment(&self, id: u64, update: &CommentUpdate) -> WpResult<WpComment>;

    async fn delete_comment(&self, id: u64) -> WpResult<()>;

    async fn upload_media(&self, upload: MediaUpload) -> WpResult<WpMedia>;

    /// Fetch a file below `wp-content/uploads/`.
    async fn fetch_media(&self, path: &str) -> WpResult<MediaObject>;

    async fn get_therapist(&self, id: u64) -> WpResult<Therapist>;

    async fn list_therapists(&self, query: &TherapistQuery) -> WpResult<Vec<Therapist>>;
}

/// Shared handle stored as actix app data.
pub type Backend = Arc<dyn WordPressBackend>;

/// Build the backend named in configuration.
pub fn from_config(config: &crate::app_config::AppConfig) -> Result<Backend, WpError> {
    match config.wordpress.backend.as_str() {
        "memory" => {
            log::warn!("Using the in-memory WordPress backend. Nothing will be persisted.");
            Ok(Arc::new(memory::MemoryBackend::new()))
        }
        "rest" => Ok(Arc::new(rest::RestBackend::new(
            &config.wordpress,
            config.timeouts.clone(),
        )?)),
        other => Err(WpError::Network(format!(
            "Unknown WordPress backend '{}'",
            other
        ))),
    }
}
