//! Signed-in user's profile: photo upload, profile read and display name.

use crate::app_config;
use crate::media::{check_image_type, check_size, photo_filename, rewrite_media_url};
use crate::middleware::ClientCtx;
use crate::rate_limit::check_upload_rate_limit;
use crate::web::error::ApiError;
use crate::wordpress::{Backend, MediaUpload, UserFieldsPatch, UserUpdate, WpUser};
use actix_multipart::Multipart;
use actix_web::{get, post, put, web, HttpResponse};
use futures_util::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(upload_photo)
        .service(view_me)
        .service(update_profile);
}

/// Multipart field names accepted for the photo.
const PHOTO_FIELDS: [&str; 3] = ["image", "photo", "file"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadPhotoResponse {
    success: bool,
    url: String,
    media_id: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    pub favorites: Vec<u64>,
}

impl From<&WpUser> for ProfileView {
    fn from(user: &WpUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            photo: user.acf.profile_photo.as_deref().map(rewrite_media_url),
            favorites: user.acf.favorites_therapists.to_ids(),
        }
    }
}

#[derive(Serialize)]
struct ProfileResponse {
    success: bool,
    user: ProfileView,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    #[serde(alias = "name")]
    #[validate(length(min = 1, max = 100))]
    display_name: String,
}

/// Replace the caller's profile photo.
///
/// The declared type and the size are checked while reading the form, so a
/// rejected file never reaches WordPress.
#[post("/api/users/upload-photo")]
async fn upload_photo(
    client: ClientCtx,
    backend: web::Data<Backend>,
    mut multipart: Multipart,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require_login()?.id;
    check_upload_rate_limit(user_id)?;

    let max_bytes = app_config::limits().max_photo_size_bytes();
    let mut photo: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = multipart.try_next().await? {
        let is_photo = field
            .content_disposition()
            .get_name()
            .map_or(false, |name| PHOTO_FIELDS.contains(&name));
        if !is_photo || photo.is_some() {
            continue;
        }

        let content_type = check_image_type(field.content_type().map(|m| m.essence_str()))?;

        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let bytes = chunk?;
            check_size(buf.len() + bytes.len(), max_bytes)?;
            buf.extend_from_slice(&bytes);
        }
        photo = Some((content_type, buf));
    }

    let (content_type, data) =
        photo.ok_or_else(|| ApiError::BadRequest("No image uploaded".to_owned()))?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("Upload is empty".to_owned()));
    }

    let media = backend
        .upload_media(MediaUpload {
            filename: photo_filename(user_id, &content_type),
            content_type,
            data: data.into(),
        })
        .await?;

    // Sequential on purpose: the user field needs the media URL.
    let update = UserUpdate {
        acf: Some(UserFieldsPatch {
            profile_photo: Some(media.source_url.clone()),
            ..Default::default()
        }),
        ..Default::default()
    };
    backend.update_user(user_id, &update).await?;

    log::info!("User {} uploaded profile photo {}", user_id, media.id);

    Ok(HttpResponse::Ok().json(UploadPhotoResponse {
        success: true,
        url: rewrite_media_url(&media.source_url),
        media_id: media.id,
    }))
}

#[get("/api/users/me")]
async fn view_me(
    client: ClientCtx,
    backend: web::Data<Backend>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require_login()?.id;
    let user = backend.get_user(user_id).await?;

    Ok(HttpResponse::Ok().json(ProfileResponse {
        success: true,
        user: ProfileView::from(&user),
    }))
}

#[put("/api/users/profile")]
async fn update_profile(
    client: ClientCtx,
    backend: web::Data<Backend>,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require_login()?.id;
    body.validate()?;
    let name = body.display_name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Display name cannot be blank".to_owned()));
    }

    let update = UserUpdate {
        name: Some(name.to_owned()),
        ..Default::default()
    };
    let user = backend.update_user(user_id, &update).await?;

    Ok(HttpResponse::Ok().json(ProfileResponse {
        success: true,
        user: ProfileView::from(&user),
    }))
}
