use super::{MailError, sendmail::send_email};
use crate::config::SmtpConfig;

const CONFIRMATION_TEMPLATE: &str = include_str!("templates/Confirmation-code.html");

pub async fn send_confirmation_code_email(
    smtp: &SmtpConfig,
    to_email: &str,
    username: &str,
    code: &str,
) -> Result<(), MailError> {
    let subject = "Your confirmation code";
    let placeholders = vec![
        ("{{username}}".to_string(), username.to_string()),
        ("{{confirmation_code}}".to_string(), code.to_string()),
    ];

    send_email(smtp, to_email, subject, CONFIRMATION_TEMPLATE, &placeholders).await
}
