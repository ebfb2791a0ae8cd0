//! Test backend setup and management
#![allow(dead_code)]

use std::sync::Arc;
use therapist_reviews::app_config::{self, AppConfig};
use therapist_reviews::wordpress::memory::MemoryBackend;

/// Configuration used by integration tests.
///
/// Rate limits are high enough not to interfere; tests of the limiter
/// lower them explicitly.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.wordpress.backend = "memory".to_string();
    config.auth.registration_auth_code = "test-auth-code".to_string();
    config.email.mock = true;
    config.email.feedback_recipient = "owner@example.com".to_string();
    config.rate_limit.reviews_per_hour = 10_000;
    config.rate_limit.reactions_per_minute = 10_000;
    config.rate_limit.favorites_per_minute = 10_000;
    config.rate_limit.uploads_per_hour = 10_000;
    config.rate_limit.feedback_per_hour = 10_000;
    config
}

/// Install the test configuration and return an empty memory backend.
pub fn setup_test_backend() -> Arc<MemoryBackend> {
    app_config::set_config(test_config());
    Arc::new(MemoryBackend::new())
}
