pub mod auth;
pub mod comments;
pub mod error;
pub mod favorites;
pub mod feedback;
pub mod media;
pub mod profile;
pub mod reactions;
pub mod therapists;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Malformed input is answered in the same JSON shape as every other error.
    conf.app_data(error::json_config())
        .app_data(error::query_config())
        .app_data(error::path_config());

    auth::configure(conf);
    comments::configure(conf);
    favorites::configure(conf);
    feedback::configure(conf);
    media::configure(conf);
    profile::configure(conf);
    reactions::configure(conf);
    therapists::configure(conf);
}

/// Fallback for unknown routes.
pub async fn not_found() -> Result<actix_web::HttpResponse, error::ApiError> {
    Err(error::ApiError::NotFound("Not found".to_owned()))
}
