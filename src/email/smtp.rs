/// SMTP email sending implementation
use super::{EmailError, EmailResult, OutgoingEmail};
use crate::app_config::EmailConfig;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

fn mailbox(raw: &str, what: &str) -> EmailResult<Mailbox> {
    raw.parse()
        .map_err(|e| EmailError::ConfigError(format!("Invalid {} address: {}", what, e)))
}

/// Build the lettre message for `email`.
pub fn build_message(config: &EmailConfig, email: &OutgoingEmail) -> EmailResult<Message> {
    let from = mailbox(
        &format!("{} <{}>", config.from_name, config.from_address),
        "from",
    )?;
    let to = mailbox(&email.to, "to")?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.as_str());
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(mailbox(reply_to, "reply-to")?);
    }

    // Add body (either plain text only, or multipart with HTML)
    let message = if let Some(html) = &email.body_html {
        builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.body_text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone()),
                ),
        )?
    } else {
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.body_text.clone())?
    };

    Ok(message)
}

/// Send an email via SMTP
pub async fn send_email(config: &EmailConfig, email: &OutgoingEmail) -> EmailResult<()> {
    let message = build_message(config, email)?;

    let mut builder = if config.smtp_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };
    builder = builder.port(config.smtp_port);
    if !config.smtp_username.is_empty() {
        builder = builder.credentials(Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        ));
    }

    builder.build().send(message).await?;

    log::info!("Email sent successfully to: {}", email.to);

    Ok(())
}
