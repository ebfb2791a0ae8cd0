pub mod backend;
pub mod fixtures;

/// Build the full app around a memory backend, the way the server does.
#[macro_export]
macro_rules! test_app {
    ($memory:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(
                    $memory.clone() as therapist_reviews::wordpress::Backend
                ))
                .wrap(therapist_reviews::middleware::ClientCtx::default())
                .configure(therapist_reviews::web::configure)
                .default_service(actix_web::web::to(therapist_reviews::web::not_found)),
        )
        .await
    };
}
