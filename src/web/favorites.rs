//! Favorite therapist endpoints

use crate::favorites::{self, FavoritesChange};
use crate::middleware::ClientCtx;
use crate::rate_limit::check_favorites_rate_limit;
use crate::reviews::parse_id;
use crate::web::error::ApiError;
use crate::wordpress::Backend;
use actix_web::{delete, get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_favorites)
        .service(add_favorite)
        .service(remove_favorite);
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteRequest {
    therapist_id: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteQuery {
    therapist_id: Option<String>,
}

#[derive(Serialize)]
struct FavoritesResponse {
    success: bool,
    favorites: Vec<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteChangeResponse {
    success: bool,
    therapist_id: u64,
    /// Present on add: false when the therapist already was a favorite
    #[serde(skip_serializing_if = "Option::is_none")]
    added: Option<bool>,
    /// Present on remove: false when the therapist was not a favorite
    #[serde(skip_serializing_if = "Option::is_none")]
    removed: Option<bool>,
    favorites: Vec<u64>,
}

fn therapist_id(raw: Option<&Value>) -> Result<u64, ApiError> {
    if raw.map_or(true, Value::is_null) {
        return Err(ApiError::BadRequest("Missing therapistId".to_owned()));
    }
    parse_id(raw).ok_or_else(|| ApiError::BadRequest("Invalid therapistId".to_owned()))
}

#[get("/api/users/favorites")]
async fn list_favorites(
    client: ClientCtx,
    backend: web::Data<Backend>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require_login()?.id;
    let favorites = favorites::list(&backend, user_id).await?;

    Ok(HttpResponse::Ok().json(FavoritesResponse {
        success: true,
        favorites,
    }))
}

/// Add a therapist to the caller's favorites. Adding twice is a no-op.
#[post("/api/users/favorites")]
async fn add_favorite(
    client: ClientCtx,
    backend: web::Data<Backend>,
    body: web::Json<FavoriteRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require_login()?.id;
    let therapist_id = therapist_id(body.therapist_id.as_ref())?;
    check_favorites_rate_limit(user_id)?;

    let FavoritesChange { changed, favorites } =
        favorites::add(&backend, user_id, therapist_id).await?;

    Ok(HttpResponse::Ok().json(FavoriteChangeResponse {
        success: true,
        therapist_id,
        added: Some(changed),
        removed: None,
        favorites,
    }))
}

/// Remove a therapist from the caller's favorites.
///
/// The id may come in a JSON body or as `?therapistId=`.
#[delete("/api/users/favorites")]
async fn remove_favorite(
    client: ClientCtx,
    backend: web::Data<Backend>,
    query: web::Query<FavoriteQuery>,
    body: Option<web::Json<FavoriteRequest>>,
) -> Result<HttpResponse, ApiError> {
    let user_id = client.require_login()?.id;
    let raw = body
        .and_then(|body| body.into_inner().therapist_id)
        .or_else(|| query.into_inner().therapist_id.map(Value::String));
    let therapist_id = therapist_id(raw.as_ref())?;
    check_favorites_rate_limit(user_id)?;

    let FavoritesChange { changed, favorites } =
        favorites::remove(&backend, user_id, therapist_id).await?;

    Ok(HttpResponse::Ok().json(FavoriteChangeResponse {
        success: true,
        therapist_id,
        added: None,
        removed: Some(changed),
        favorites,
    }))
}
