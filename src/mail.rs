pub mod mails;
pub mod sendmail;

use crate::config::SmtpConfig;

pub type MailError = Box<dyn std::error::Error + Send + Sync>;

/// Outbound email collaborator used by the signup flow
///
/// An `Err` means the message was not handed off; failures after hand-off
/// are only logged.
pub trait Mailer {
    async fn send_confirmation_code(
        &self,
        to_email: &str,
        username: &str,
        code: &str,
    ) -> Result<(), MailError>;
}

#[derive(Debug, Clone)]
pub enum MailClient {
    Smtp(SmtpConfig),
    /// Development backend: the code goes to the server log, not to an inbox
    Log,
}

impl MailClient {
    pub fn from_config(smtp: Option<SmtpConfig>) -> Self {
        match smtp {
            Some(smtp) => MailClient::Smtp(smtp),
            None => MailClient::Log,
        }
    }
}

impl Mailer for MailClient {
    async fn send_confirmation_code(
        &self,
        to_email: &str,
        username: &str,
        code: &str,
    ) -> Result<(), MailError> {
        match self {
            // Delivery runs detached; the SMTP round trip never holds up the caller
            MailClient::Smtp(smtp) => {
                let (smtp, to_email, username, code) = (
                    smtp.clone(),
                    to_email.to_string(),
                    username.to_string(),
                    code.to_string(),
                );
                tokio::spawn(async move {
                    if let Err(e) =
                        mails::send_confirmation_code_email(&smtp, &to_email, &username, &code)
                            .await
                    {
                        tracing::error!(to = %to_email, "Failed to send confirmation email: {}", e);
                    }
                });
                Ok(())
            }
            MailClient::Log => {
                tracing::info!(to = %to_email, username, confirmation_code = %code, "Confirmation email (log backend)");
                Ok(())
            }
        }
    }
}
