//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with THERAPY_, nested with `__`)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! WordPress system credentials, the registration auth code and SMTP
//! passwords belong in environment variables, not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub bind_address: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Therapist Reviews".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// WordPress connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordPressConfig {
    /// Backend: "rest" for a real WordPress, "memory" for local development
    pub backend: String,
    /// Site root, e.g. https://cms.example.com (no trailing /wp-json)
    pub base_url: String,
    /// Basic-Auth system user (should be in env var THERAPY_WORDPRESS__SYSTEM_USERNAME)
    #[serde(default)]
    pub system_username: String,
    /// Application password for the system user
    #[serde(default)]
    pub system_password: String,
}

impl Default for WordPressConfig {
    fn default() -> Self {
        Self {
            backend: "rest".to_string(),
            base_url: "http://localhost:8000".to_string(),
            system_username: String::new(),
            system_password: String::new(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret the JWT plugin requires for registration
    #[serde(default)]
    pub registration_auth_code: String,
    /// Facebook app id, used when deriving passwords for Facebook accounts
    pub facebook_app_id: String,
    /// Lifetime of the authToken/userData cookies
    pub cookie_max_age_days: u32,
    /// Mark cookies Secure (requires HTTPS)
    pub cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration_auth_code: String::new(),
            facebook_app_id: String::new(),
            cookie_max_age_days: 7,
            cookie_secure: false,
        }
    }
}

/// Content limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum profile photo size in MB
    pub max_photo_size_mb: u32,
    /// How many recent comments the duplicate review guard inspects
    pub duplicate_scan_limit: u32,
    /// Therapists per page (default)
    pub therapists_per_page: u32,
    /// Maximum review length in characters
    pub max_review_length: u32,
}

impl LimitsConfig {
    pub fn max_photo_size_bytes(&self) -> usize {
        self.max_photo_size_mb as usize * 1024 * 1024
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_photo_size_mb: 5,
            duplicate_scan_limit: 100,
            therapists_per_page: 20,
            max_review_length: 5000,
        }
    }
}

/// Upstream request timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Reads and token validation
    pub read_seconds: u64,
    /// Creates, updates, deletes and uploads
    pub write_seconds: u64,
}

impl TimeoutConfig {
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_seconds)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_seconds)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_seconds: 8,
            write_seconds: 10,
        }
    }
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// SMTP server host
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// Use TLS for SMTP
    pub smtp_tls: bool,
    /// SMTP username (if required)
    pub smtp_username: String,
    /// SMTP password (should be in env var THERAPY_EMAIL__SMTP_PASSWORD)
    #[serde(default)]
    pub smtp_password: String,
    /// From address for emails
    pub from_address: String,
    /// From name for emails
    pub from_name: String,
    /// Where feedback form submissions are delivered
    pub feedback_recipient: String,
    /// Log emails instead of sending them
    pub mock: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_tls: true,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: "noreply@localhost".to_string(),
            from_name: "Therapist Reviews".to_string(),
            feedback_recipient: "feedback@localhost".to_string(),
            mock: false,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Reviews per hour per user or IP
    pub reviews_per_hour: u32,
    /// Reaction toggles per minute per user
    pub reactions_per_minute: u32,
    /// Favorite changes per minute per user
    pub favorites_per_minute: u32,
    /// Photo uploads per hour per user
    pub uploads_per_hour: u32,
    /// Feedback messages per hour per IP
    pub feedback_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            reviews_per_hour: 5,
            reactions_per_minute: 30,
            favorites_per_minute: 30,
            uploads_per_hour: 10,
            feedback_per_hour: 3,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub wordpress: WordPressConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutConfig,
    pub email: EmailConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g. THERAPY_WORDPRESS__BASE_URL, THERAPY_EMAIL__SMTP_PASSWORD
            .add_source(
                Environment::with_prefix("THERAPY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Initialize application configuration
///
/// Triggers the lazy load and logs where WordPress is expected.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: site.name = {}, wordpress = {} ({})",
        config.site.name,
        config.wordpress.base_url,
        config.wordpress.backend
    );
}

/// Replace the global configuration. Used by tests and the memory backend setup.
pub fn set_config(new_config: AppConfig) {
    if let Ok(mut config) = APP_CONFIG.write() {
        *config = new_config;
    }
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

pub fn site() -> SiteConfig {
    get_config().site
}

pub fn wordpress() -> WordPressConfig {
    get_config().wordpress
}

pub fn auth() -> AuthConfig {
    get_config().auth
}

pub fn limits() -> LimitsConfig {
    get_config().limits
}

pub fn timeouts() -> TimeoutConfig {
    get_config().timeouts
}

pub fn email() -> EmailConfig {
    get_config().email
}

pub fn rate_limit() -> RateLimitConfig {
    get_config().rate_limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.wordpress.backend, "rest");
        assert_eq!(config.limits.max_photo_size_mb, 5);
        assert_eq!(config.limits.duplicate_scan_limit, 100);
        assert_eq!(config.auth.cookie_max_age_days, 7);
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.read(), Duration::from_secs(8));
        assert_eq!(timeouts.write(), Duration::from_secs(10));
    }

    #[test]
    fn test_photo_size_bytes() {
        assert_eq!(LimitsConfig::default().max_photo_size_bytes(), 5 * 1024 * 1024);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
name = "Test Reviews"

[wordpress]
backend = "memory"
base_url = "https://cms.example.com"

[limits]
max_photo_size_mb = 2

[timeouts]
read_seconds = 3
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.site.name, "Test Reviews");
        assert_eq!(config.wordpress.backend, "memory");
        assert_eq!(config.wordpress.base_url, "https://cms.example.com");
        assert_eq!(config.limits.max_photo_size_mb, 2);
        assert_eq!(config.timeouts.read_seconds, 3);
        // Defaults should still apply for unspecified values
        assert_eq!(config.timeouts.write_seconds, 10);
        assert_eq!(config.limits.duplicate_scan_limit, 100);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.site.name, "Therapist Reviews");
        assert_eq!(config.email.smtp_port, 587);
    }
}
