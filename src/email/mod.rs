/// Email sending functionality
///
/// This module provides email sending capabilities using lettre with SMTP.
/// Supports both real SMTP sending and mock mode for development/testing.

pub mod smtp;
pub mod templates;

use crate::app_config;
use once_cell::sync::Lazy;
use std::sync::Mutex;

/// Email sending result
pub type EmailResult<T> = Result<T, EmailError>;

/// Email errors
#[derive(Debug)]
pub enum EmailError {
    /// SMTP configuration error
    ConfigError(String),
    /// Email building error
    BuildError(lettre::error::Error),
    /// Email sending error
    SendError(lettre::transport::smtp::Error),
}

impl std::fmt::Display for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailError::ConfigError(msg) => write!(f, "Email config error: {}", msg),
            EmailError::BuildError(e) => write!(f, "Email build error: {}", e),
            EmailError::SendError(e) => write!(f, "Email send error: {}", e),
        }
    }
}

impl std::error::Error for EmailError {}

impl From<lettre::error::Error> for EmailError {
    fn from(e: lettre::error::Error) -> Self {
        EmailError::BuildError(e)
    }
}

impl From<lettre::transport::smtp::Error> for EmailError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        EmailError::SendError(e)
    }
}

/// An outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Messages "sent" while `email.mock` is on, newest last.
static MOCK_OUTBOX: Lazy<Mutex<Vec<OutgoingEmail>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Drain the mock outbox.
pub fn take_mock_outbox() -> Vec<OutgoingEmail> {
    match MOCK_OUTBOX.lock() {
        Ok(mut outbox) => std::mem::take(&mut *outbox),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}

/// Send an email
pub async fn send_email(email: OutgoingEmail) -> EmailResult<()> {
    let config = app_config::email();

    if config.mock {
        // Mock mode: just log the email
        log::info!("MOCK EMAIL:");
        log::info!("  To: {}", email.to);
        log::info!("  Subject: {}", email.subject);
        log::info!("  Body: {}", email.body_text);
        match MOCK_OUTBOX.lock() {
            Ok(mut outbox) => outbox.push(email),
            Err(poisoned) => poisoned.into_inner().push(email),
        }
        return Ok(());
    }

    smtp::send_email(&config, &email).await
}
