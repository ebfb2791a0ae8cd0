//! WordPress REST backend.
//!
//! System calls are signed with Basic-Auth application-password
//! credentials. User calls carry the user's JWT as a bearer token. Every
//! request is bounded by the configured read or write timeout.

use super::{
    AuthToken, CommentQuery, CommentUpdate, MediaObject, MediaUpload, NewComment, NewUser,
    Therapist, TherapistQuery, UserUpdate, WordPressBackend, WpComment, WpError, WpMedia,
    WpResult, WpUser, MAX_PER_PAGE,
};
use crate::app_config::{TimeoutConfig, WordPressConfig};
use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = "TherapistReviews/1.0";

pub struct RestBackend {
    client: reqwest::Client,
    /// Site root without trailing slash
    base_url: String,
    username: String,
    password: String,
    timeouts: TimeoutConfig,
}

/// Error body WordPress returns from REST endpoints.
#[derive(Deserialize)]
struct WpErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Token response from the JWT login plugin.
#[derive(Deserialize)]
struct PluginResponse<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

#[derive(Deserialize)]
struct JwtData {
    jwt: String,
}

#[derive(Deserialize)]
struct PluginRegistration {
    #[serde(default)]
    success: bool,
    id: Option<u64>,
    #[serde(default)]
    message: String,
}

impl RestBackend {
    pub fn new(config: &WordPressConfig, timeouts: TimeoutConfig) -> WpResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| WpError::Network(format!("Failed to create HTTP client: {}", e)))?;

        if config.system_username.is_empty() {
            log::warn!("No WordPress system username configured; write calls will be rejected.");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            username: config.system_username.clone(),
            password: config.system_password.clone(),
            timeouts,
        })
    }

    fn api_url(&self, route: &str) -> String {
        format!("{}/wp-json{}", self.base_url, route)
    }

    /// A request signed with the system credentials.
    fn system(&self, method: Method, route: &str, timeout: Duration) -> RequestBuilder {
        self.client
            .request(method, self.api_url(route))
            .basic_auth(&self.username, Some(&self.password))
            .timeout(timeout)
    }

    fn read(&self, route: &str) -> RequestBuilder {
        self.system(Method::GET, route, self.timeouts.read())
    }

    fn write(&self, method: Method, route: &str) -> RequestBuilder {
        self.system(method, route, self.timeouts.write())
    }

    async fn send(builder: RequestBuilder) -> WpResult<Response> {
        builder.send().await.map_err(map_transport_error)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder, what: &str) -> WpResult<T> {
        let response = Self::send(builder).await?;
        let response = check_status(response, what).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| WpError::Decode(format!("{}: {}", what, e)))
    }
}

/// Classify a reqwest failure so callers can tell timeouts from resets from refusals.
pub fn map_transport_error(err: reqwest::Error) -> WpError {
    if err.is_timeout() {
        return WpError::Timeout;
    }

    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                    return WpError::ConnectionReset
                }
                std::io::ErrorKind::ConnectionRefused => return WpError::ConnectionRefused,
                std::io::ErrorKind::TimedOut => return WpError::Timeout,
                _ => {}
            }
        }
        source = cause.source();
    }

    if err.is_connect() {
        WpError::ConnectionRefused
    } else {
        WpError::Network(err.to_string())
    }
}

async fn check_status(response: Response, what: &str) -> WpResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(WpError::NotFound(what.to_owned()));
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<WpErrorBody>(&body) {
        Ok(parsed) if !parsed.message.is_empty() => {
            if parsed.code == "rest_comment_invalid_id" || parsed.code == "rest_user_invalid_id" {
                return Err(WpError::NotFound(what.to_owned()));
            }
            parsed.message
        }
        _ => body,
    };
    log::warn!("WordPress {} failed with {}: {}", what, status, message);
    Err(WpError::Upstream {
        status: status.as_u16(),
        message,
    })
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl WordPressBackend for RestBackend {
    async fn validate_token(&self, token: &str) -> WpResult<WpUser> {
        let builder = self
            .client
            .get(self.api_url("/wp/v2/users/me"))
            .query(&[("context", "edit")])
            .bearer_auth(token)
            .timeout(self.timeouts.read());
        let response = Self::send(builder).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
                Err(WpError::Unauthorized)
            }
            _ => {
                let response = check_status(response, "current user").await?;
                response
                    .json::<WpUser>()
                    .await
                    .map_err(|e| WpError::Decode(format!("current user: {}", e)))
            }
        }
    }

    async fn issue_token(&self, email: &str, password: &str) -> WpResult<AuthToken> {
        let builder = self
            .client
            .post(self.api_url("/simple-jwt-login/v1/auth"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .timeout(self.timeouts.read());
        let response = Self::send(builder).await?;
        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(WpError::Unauthorized);
        }
        let response = check_status(response, "token").await?;
        let body: PluginResponse<JwtData> = response
            .json()
            .await
            .map_err(|e| WpError::Decode(format!("token: {}", e)))?;
        let jwt = match body.data {
            Some(data) if body.success => data.jwt,
            _ => return Err(WpError::Unauthorized),
        };
        let user = self.validate_token(&jwt).await?;
        Ok(AuthToken { token: jwt, user })
    }

    async fn register_user(&self, user: &NewUser) -> WpResult<WpUser> {
        let auth_code = crate::app_config::auth().registration_auth_code;
        let builder = self
            .client
            .post(self.api_url("/simple-jwt-login/v1/users"))
            .json(&serde_json::json!({
                "email": user.email,
                "password": user.password,
                "display_name": user.name,
                "AUTH_KEY": auth_code,
            }))
            .timeout(self.timeouts.write());
        let response = Self::send(builder).await?;
        let response = check_status(response, "registration").await?;
        let body: PluginRegistration = response
            .json()
            .await
            .map_err(|e| WpError::Decode(format!("registration: {}", e)))?;
        match body.id {
            Some(id) if body.success => self.get_user(id).await,
            _ => Err(WpError::Upstream {
                status: 400,
                message: body.message,
            }),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> WpResult<Option<WpUser>> {
        let builder = self.read("/wp/v2/users").query(&[
            ("search", email),
            ("search_columns", "email"),
            ("context", "edit"),
        ]);
        let users: Vec<WpUser> = Self::send_json(builder, "users").await?;
        Ok(users
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn get_user(&self, id: u64) -> WpResult<WpUser> {
        let builder = self
            .read(&format!("/wp/v2/users/{}", id))
            .query(&[("context", "edit")]);
        Self::send_json(builder, &format!("user {}", id)).await
    }

    async fn update_user(&self, id: u64, update: &UserUpdate) -> WpResult<WpUser> {
        let builder = self
            .write(Method::POST, &format!("/wp/v2/users/{}", id))
            .query(&[("context", "edit")])
            .json(update);
        Self::send_json(builder, &format!("user {}", id)).await
    }

    async fn get_comment(&self, id: u64) -> WpResult<WpComment> {
        let builder = self
            .read(&format!("/wp/v2/comments/{}", id))
            .query(&[("context", "edit")]);
        Self::send_json(builder, &format!("comment {}", id)).await
    }

    async fn list_comments(&self, query: &CommentQuery) -> WpResult<Vec<WpComment>> {
        let mut params: Vec<(&str, String)> = vec![
            ("context", "edit".to_owned()),
            ("orderby", "date".to_owned()),
            ("order", "desc".to_owned()),
            ("per_page", query.per_page.clamp(1, MAX_PER_PAGE).to_string()),
            ("page", query.page.max(1).to_string()),
        ];
        if let Some(post) = query.post {
            params.push(("post", post.to_string()));
        }
        if !query.include.is_empty() {
            params.push(("include", join_ids(&query.include)));
        }
        // WordPress names the approved state "approve" in queries
        let status = match query.status.as_deref() {
            None | Some(super::STATUS_APPROVED) => "approve",
            Some(other) => other,
        };
        params.push(("status", status.to_owned()));

        let builder = self.read("/wp/v2/comments").query(&params);
        Self::send_json(builder, "comments").await
    }

    async fn create_comment(&self, comment: &NewComment) -> WpResult<WpComment> {
        let builder = self
            .write(Method::POST, "/wp/v2/comments")
            .query(&[("context", "edit")])
            .json(comment);
        Self::send_json(builder, "comment").await
    }

    async fn update_comment(&self, id: u64, update: &CommentUpdate) -> WpResult<WpComment> {
        let builder = self
            .write(Method::POST, &format!("/wp/v2/comments/{}", id))
            .query(&[("context", "edit")])
            .json(update);
        Self::send_json(builder, &format!("comment {}", id)).await
    }

    async fn delete_comment(&self, id: u64) -> WpResult<()> {
        let builder = self
            .write(Method::DELETE, &format!("/wp/v2/comments/{}", id))
            .query(&[("force", "true")]);
        let response = Self::send(builder).await?;
        check_status(response, &format!("comment {}", id)).await?;
        Ok(())
    }

    async fn upload_media(&self, upload: MediaUpload) -> WpResult<WpMedia> {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            upload.filename.replace('"', "")
        );
        let builder = self
            .write(Method::POST, "/wp/v2/media")
            .header(header::CONTENT_TYPE, upload.content_type)
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(upload.data);
        Self::send_json(builder, "media").await
    }

    async fn fetch_media(&self, path: &str) -> WpResult<MediaObject> {
        if path.split('/').any(|segment| segment == "..") {
            return Err(WpError::NotFound(path.to_owned()));
        }
        let url = format!(
            "{}/wp-content/uploads/{}",
            self.base_url,
            path.trim_start_matches('/')
        );
        let builder = self.client.get(url).timeout(self.timeouts.read());
        let response = Self::send(builder).await?;
        let response = check_status(response, path).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let data = response.bytes().await.map_err(map_transport_error)?;
        Ok(MediaObject { content_type, data })
    }

    async fn get_therapist(&self, id: u64) -> WpResult<Therapist> {
        let builder = self.read(&format!("/wp/v2/therapists/{}", id));
        Self::send_json(builder, &format!("therapist {}", id)).await
    }

    async fn list_therapists(&self, query: &TherapistQuery) -> WpResult<Vec<Therapist>> {
        let mut params: Vec<(&str, String)> = vec![
            ("per_page", query.per_page.clamp(1, MAX_PER_PAGE).to_string()),
            ("page", query.page.max(1).to_string()),
        ];
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search", search.to_owned()));
        }
        if !query.include.is_empty() {
            params.push(("include", join_ids(&query.include)));
        }
        let builder = self.read("/wp/v2/therapists").query(&params);
        Self::send_json(builder, "therapists").await
    }
}
