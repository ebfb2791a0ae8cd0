/// Rate limiting for write endpoints
///
/// Implements sliding window rate limiting using in-memory storage (DashMap).
/// This is suitable for single-instance deployments. Limits are read from
/// the `rate_limit` section of the application configuration on every
/// check. A limit of 0 turns the action off.
///
/// # Example Usage
///
/// ```rust,ignore
/// use crate::rate_limit::check_review_rate_limit;
///
/// // In a review handler
/// check_review_rate_limit(&identifier)?;
/// ```
use actix_web::HttpRequest;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Global rate limiter instance
pub static RATE_LIMITER: Lazy<Arc<RateLimiter>> = Lazy::new(|| Arc::new(RateLimiter::new()));

/// Rate limiter using in-memory storage
pub struct RateLimiter {
    /// Map of (action:identifier) -> Request timestamps
    requests: DashMap<String, Vec<Instant>>,
}

/// Error returned when rate limit is exceeded
#[derive(Debug, Clone)]
pub struct RateLimitError {
    /// Number of seconds until the rate limit resets
    pub retry_after_seconds: u64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }

    /// Record a request and fail if `identifier` already made `max_requests`
    /// requests for `action` within `window`.
    pub fn check_rate_limit(
        &self,
        action: &str,
        identifier: &str,
        max_requests: usize,
        window: Duration,
    ) -> Result<(), RateLimitError> {
        let key = format!("{}:{}", action, identifier);
        let now = Instant::now();

        let mut entry = self.requests.entry(key).or_default();

        // Sliding window
        entry.retain(|&timestamp| now.duration_since(timestamp) < window);

        if entry.len() >= max_requests {
            // A limit of 0 disables the action, so there may be no oldest request.
            let retry_after_seconds = match entry.first() {
                Some(&oldest) => {
                    let retry_after = window.saturating_sub(now.duration_since(oldest));
                    retry_after.as_secs() + 1 // Round up
                }
                None => window.as_secs(),
            };

            return Err(RateLimitError {
                retry_after_seconds,
            });
        }

        entry.push(now);

        Ok(())
    }

    /// Drop timestamps older than the longest window and forget idle keys.
    pub fn cleanup_old_entries(&self) {
        let now = Instant::now();
        self.requests.retain(|_, timestamps| {
            timestamps.retain(|&timestamp| now.duration_since(timestamp) < HOUR);
            !timestamps.is_empty()
        });
    }

    /// Clear all requests for a specific action/identifier
    pub fn clear_requests(&self, action: &str, identifier: &str) {
        let key = format!("{}:{}", action, identifier);
        self.requests.remove(&key);
    }

    /// Get the number of tracked keys (for monitoring/debugging)
    pub fn tracked_keys_count(&self) -> usize {
        self.requests.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the client IP address for anonymous rate limiting.
///
/// Checks X-Forwarded-For (first entry), then X-Real-IP, then the peer.
pub fn client_ip(req: &HttpRequest) -> String {
    let from_header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|candidate| candidate.parse::<IpAddr>().is_ok())
            .map(str::to_owned)
    };

    from_header("x-forwarded-for")
        .or_else(|| from_header("x-real-ip"))
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Review submissions, per user id or IP
pub fn check_review_rate_limit(identifier: &str) -> Result<(), RateLimitError> {
    let limit = app_config::rate_limit().reviews_per_hour as usize;
    RATE_LIMITER.check_rate_limit("review", identifier, limit, HOUR)
}

/// Reaction toggles, per user
pub fn check_reaction_rate_limit(user_id: u64) -> Result<(), RateLimitError> {
    let limit = app_config::rate_limit().reactions_per_minute as usize;
    RATE_LIMITER.check_rate_limit("reaction", &user_id.to_string(), limit, MINUTE)
}

/// Favorite additions and removals, per user
pub fn check_favorites_rate_limit(user_id: u64) -> Result<(), RateLimitError> {
    let limit = app_config::rate_limit().favorites_per_minute as usize;
    RATE_LIMITER.check_rate_limit("favorite", &user_id.to_string(), limit, MINUTE)
}

/// Profile photo uploads, per user
pub fn check_upload_rate_limit(user_id: u64) -> Result<(), RateLimitError> {
    let limit = app_config::rate_limit().uploads_per_hour as usize;
    RATE_LIMITER.check_rate_limit("upload", &user_id.to_string(), limit, HOUR)
}

/// Feedback form, per IP
pub fn check_feedback_rate_limit(ip: &str) -> Result<(), RateLimitError> {
    let limit = app_config::rate_limit().feedback_per_hour as usize;
    RATE_LIMITER.check_rate_limit("feedback", ip, limit, HOUR)
}

/// Called periodically from the server's background task.
pub fn cleanup_old_entries_public() {
    RATE_LIMITER.cleanup_old_entries();
}
