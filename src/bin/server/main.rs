use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use anyhow::Context;
use env_logger::Env;
use std::time::Duration;
use therapist_reviews::app_config;
use therapist_reviews::middleware::ClientCtx;
use therapist_reviews::wordpress::{self, Backend};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    app_config::init();

    let config = app_config::get_config();
    let backend: Backend =
        wordpress::from_config(&config).context("WordPress backend failed to initialize")?;

    // Spawn rate limiter cleanup task
    actix_web::rt::spawn(async {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(300)); // Every 5 minutes
        loop {
            interval.tick().await;
            therapist_reviews::rate_limit::cleanup_old_entries_public();
            log::debug!("Rate limiter cleanup completed");
        }
    });

    let bind_address = config.site.bind_address.clone();
    log::info!("Listening on {}", bind_address);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(Data::new(backend.clone()))
            // Security headers - applied to all responses
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("X-XSS-Protection", "0")) // Disable legacy XSS filter
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
                    .add((
                        "Permissions-Policy",
                        "geolocation=(), microphone=(), camera=()",
                    )),
            )
            .wrap(ClientCtx::default())
            .wrap(Logger::new("%a %r %s %Dms"))
            .configure(therapist_reviews::web::configure)
            .default_service(web::to(therapist_reviews::web::not_found))
    })
    .bind(&bind_address)
    .with_context(|| format!("Could not bind {}", bind_address))?
    .run()
    .await
    .context("HTTP server failed")
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env file is fine; configuration may come from the environment.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
