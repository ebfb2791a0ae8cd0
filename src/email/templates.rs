/// Email template functions
///
/// This module provides functions to generate the emails the site sends.
use super::{send_email, EmailResult, OutgoingEmail};
use crate::app_config;

/// A message left through the feedback form.
#[derive(Clone, Debug)]
pub struct Feedback {
    pub name: String,
    pub email: String,
    pub message: String,
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the feedback email for the configured recipient.
pub fn feedback_email(feedback: &Feedback, recipient: &str, site_name: &str) -> OutgoingEmail {
    let sender = if feedback.name.is_empty() {
        feedback.email.clone()
    } else {
        format!("{} <{}>", feedback.name, feedback.email)
    };

    let body_text = format!(
        r#"New feedback from {}

{}

---
{}
"#,
        sender, feedback.message, site_name
    );

    let body_html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Feedback</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2>New feedback</h2>
        <p>From <strong>{}</strong></p>
        <p style="white-space: pre-wrap;">{}</p>
        <hr style="margin: 30px 0; border: none; border-top: 1px solid #ddd;">
        <p style="color: #666; font-size: 0.9em;">{}</p>
    </div>
</body>
</html>
"#,
        escape_html(&sender),
        escape_html(&feedback.message),
        escape_html(site_name)
    );

    // Names with commas or quotes would not parse as a mailbox.
    let reply_to = if feedback.name.chars().all(|c| c.is_alphanumeric() || c == ' ') {
        sender
    } else {
        feedback.email.clone()
    };

    OutgoingEmail {
        to: recipient.to_string(),
        reply_to: Some(reply_to),
        subject: format!("[{}] Feedback from {}", site_name, feedback.email),
        body_text,
        body_html: Some(body_html),
    }
}

/// Send a feedback form submission to the site owners.
pub async fn send_feedback_email(feedback: &Feedback) -> EmailResult<()> {
    let recipient = app_config::email().feedback_recipient;
    let site_name = app_config::site().name;
    send_email(feedback_email(feedback, &recipient, &site_name)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_email_escapes_html() {
        let feedback = Feedback {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            message: "<script>alert(1)</script>".to_string(),
        };
        let email = feedback_email(&feedback, "owner@example.com", "Therapist Reviews");
        assert_eq!(email.to, "owner@example.com");
        assert_eq!(email.reply_to.as_deref(), Some("Sam <sam@example.com>"));
        assert!(email.body_text.contains("<script>"));
        let html = email.body_html.unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_odd_names_reply_to_bare_address() {
        let feedback = Feedback {
            name: "Doe, Jane".to_string(),
            email: "jane@example.com".to_string(),
            message: "hi".to_string(),
        };
        let email = feedback_email(&feedback, "owner@example.com", "Site");
        assert_eq!(email.reply_to.as_deref(), Some("jane@example.com"));
    }
}
