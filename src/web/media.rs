//! Proxy for files in WordPress uploads.

use crate::media::is_safe_media_path;
use crate::web::error::ApiError;
use crate::wordpress::Backend;
use actix_web::http::header::{self, CacheControl, CacheDirective};
use actix_web::{get, web, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_media);
}

#[get("/api/media/{tail:.*}")]
async fn view_media(
    backend: web::Data<Backend>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let tail = path.into_inner();
    if !is_safe_media_path(&tail) {
        return Err(ApiError::NotFound("Media not found".to_owned()));
    }

    let object = backend.fetch_media(&tail).await?;
    let content_type = object
        .content_type
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, content_type))
        .insert_header(CacheControl(vec![
            CacheDirective::Public,
            CacheDirective::MaxAge(86400u32),
        ]))
        .body(object.data))
}
