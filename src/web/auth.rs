//! Sign-in endpoints.
//!
//! Tokens are JWTs issued by the WordPress JWT plugin. Browsers get them as
//! the `authToken` cookie; API clients can read `token` from the body and
//! send it as a bearer token instead.

use super::profile::ProfileView;
use crate::app_config;
use crate::middleware::client_ctx::{AUTH_COOKIE, USER_COOKIE};
use crate::middleware::ClientCtx;
use crate::web::error::ApiError;
use crate::wordpress::{AuthToken, Backend, NewUser, WpError, WpUser};
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(login)
        .service(register)
        .service(facebook)
        .service(logout)
        .service(validate);
}

/// Key derivation context for passwords of Facebook-created accounts.
const FACEBOOK_PASSWORD_CONTEXT: &str = "therapist-reviews 2024 facebook account password";

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    #[validate(length(min = 1, max = 100))]
    name: String,
}

#[derive(Deserialize, Validate)]
pub struct FacebookRequest {
    /// Facebook user id
    #[serde(alias = "userID", alias = "userId")]
    #[validate(length(min = 1))]
    id: String,
    #[validate(email)]
    email: String,
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
struct SessionResponse {
    success: bool,
    token: String,
    user: ProfileView,
}

#[derive(Serialize)]
struct ValidateResponse {
    success: bool,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<ProfileView>,
}

/// The public part of the user stored in the `userData` cookie.
#[derive(Serialize)]
struct UserCookieData<'a> {
    id: u64,
    name: &'a str,
    email: &'a str,
}

fn build_cookie(name: &'static str, value: String) -> Cookie<'static> {
    let auth = app_config::auth();
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(auth.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(i64::from(auth.cookie_max_age_days)))
        .finish()
}

/// `authToken` and `userData` cookies for a fresh session.
pub fn session_cookies(token: &str, user: &WpUser) -> Result<[Cookie<'static>; 2], ApiError> {
    let user_data = serde_json::to_string(&UserCookieData {
        id: user.id,
        name: &user.name,
        email: &user.email,
    })
    .map_err(|e| ApiError::Internal(e.to_string()))?;
    let user_data: String = url::form_urlencoded::byte_serialize(user_data.as_bytes()).collect();

    Ok([
        build_cookie(AUTH_COOKIE, token.to_owned()),
        build_cookie(USER_COOKIE, user_data),
    ])
}

fn session_response(session: AuthToken) -> Result<HttpResponse, ApiError> {
    let [auth_cookie, user_cookie] = session_cookies(&session.token, &session.user)?;
    Ok(HttpResponse::Ok()
        .cookie(auth_cookie)
        .cookie(user_cookie)
        .json(SessionResponse {
            success: true,
            user: ProfileView::from(&session.user),
            token: session.token,
        }))
}

fn bad_credentials(err: WpError) -> ApiError {
    match err {
        WpError::Unauthorized | WpError::NotFound(_) => {
            ApiError::Unauthorized("Invalid email or password".to_owned())
        }
        other => other.into(),
    }
}

/// Password of an account created through Facebook sign-in.
///
/// Derived from the Facebook id and the registration secret so the same
/// person always maps to the same password and nobody else can compute it.
pub fn facebook_password(facebook_id: &str) -> String {
    let auth = app_config::auth();
    let mut hasher = blake3::Hasher::new_derive_key(FACEBOOK_PASSWORD_CONTEXT);
    hasher.update(auth.registration_auth_code.as_bytes());
    hasher.update(b":");
    hasher.update(auth.facebook_app_id.as_bytes());
    hasher.update(b":");
    hasher.update(facebook_id.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[post("/api/auth/login")]
async fn login(
    backend: web::Data<Backend>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    let session = backend
        .issue_token(body.email.trim(), &body.password)
        .await
        .map_err(bad_credentials)?;

    log::info!("User {} signed in", session.user.id);
    session_response(session)
}

#[post("/api/auth/register")]
async fn register(
    backend: web::Data<Backend>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    let email = body.email.trim();

    if backend.find_user_by_email(email).await?.is_some() {
        return Err(ApiError::BadRequest(
            "An account with this email already exists".to_owned(),
        ));
    }

    let user = backend
        .register_user(&NewUser {
            email: email.to_owned(),
            password: body.password.clone(),
            name: body.name.trim().to_owned(),
        })
        .await?;
    log::info!("Registered user {}", user.id);

    let session = backend
        .issue_token(email, &body.password)
        .await
        .map_err(bad_credentials)?;
    session_response(session)
}

/// Exchange a Facebook profile for a session, creating the account on
/// first sign-in.
#[post("/api/auth/facebook")]
async fn facebook(
    backend: web::Data<Backend>,
    body: web::Json<FacebookRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    let email = body.email.trim();
    let password = facebook_password(body.id.trim());

    if backend.find_user_by_email(email).await?.is_none() {
        let name = match body.name.trim() {
            "" => email.split('@').next().unwrap_or(email),
            name => name,
        };
        let user = backend
            .register_user(&NewUser {
                email: email.to_owned(),
                password: password.clone(),
                name: name.to_owned(),
            })
            .await?;
        log::info!("Registered user {} from Facebook sign-in", user.id);
    }

    let session = backend
        .issue_token(email, &password)
        .await
        .map_err(|err| match err {
            WpError::Unauthorized => ApiError::Unauthorized(
                "This email is registered with a password. Sign in with email instead.".to_owned(),
            ),
            other => other.into(),
        })?;
    session_response(session)
}

#[post("/api/auth/logout")]
async fn logout() -> HttpResponse {
    let mut auth_cookie = build_cookie(AUTH_COOKIE, String::new());
    auth_cookie.make_removal();
    let mut user_cookie = build_cookie(USER_COOKIE, String::new());
    user_cookie.make_removal();

    HttpResponse::Ok()
        .cookie(auth_cookie)
        .cookie(user_cookie)
        .json(serde_json::json!({ "success": true }))
}

/// Whether the presented token is still good.
#[get("/api/auth/validate")]
async fn validate(client: ClientCtx) -> Result<HttpResponse, ApiError> {
    let user = match client.require_login() {
        Ok(user) => Some(ProfileView::from(user)),
        Err(ApiError::Unauthorized(_)) => None,
        Err(err) => return Err(err),
    };

    Ok(HttpResponse::Ok().json(ValidateResponse {
        success: true,
        valid: user.is_some(),
        user,
    }))
}
