use lettre::{
    Message, SmtpTransport, Transport,
    message::{SinglePart, header},
    transport::smtp::authentication::Credentials,
};

use super::MailError;
use crate::config::SmtpConfig;

/// Send an HTML email through the configured SMTP relay
///
/// `placeholders` are literal `{{key}}` markers replaced in `template` before
/// sending. The SMTP conversation is blocking, so it runs on tokio's blocking
/// pool instead of a runtime worker.
pub async fn send_email(
    smtp: &SmtpConfig,
    to_email: &str,
    subject: &str,
    template: &str,
    placeholders: &[(String, String)],
) -> Result<(), MailError> {
    let mut html_template = template.to_string();
    for (key, value) in placeholders {
        html_template = html_template.replace(key, value)
    }

    let email = Message::builder()
        .from(smtp.username.parse()?)
        .to(to_email.parse()?)
        .subject(subject)
        .singlepart(
            SinglePart::builder()
                .header(header::ContentType::TEXT_HTML)
                .body(html_template),
        )?;

    // STARTTLS: starts unencrypted, upgrades to TLS
    let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
    let mailer = SmtpTransport::starttls_relay(&smtp.server)?
        .credentials(creds)
        .port(smtp.port)
        .build();

    tokio::task::spawn_blocking(move || mailer.send(&email)).await??;

    tracing::debug!(to = %to_email, subject, "Email sent");
    Ok(())
}
