//! Email service for account confirmation and password reset links

use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};

use crate::config::EmailConfig;

/// A message handed to the mail transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Messages captured by the in-memory transport
#[derive(Debug, Clone, Default)]
pub struct Outbox(Arc<Mutex<Vec<OutgoingEmail>>>);

impl Outbox {
    pub fn messages(&self) -> Vec<OutgoingEmail> {
        self.0.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Most recent message sent to `to`
    pub fn last_to(&self, to: &str) -> Option<OutgoingEmail> {
        self.messages().into_iter().rev().find(|m| m.to == to)
    }

    fn push(&self, email: OutgoingEmail) -> Result<()> {
        self.0
            .lock()
            .map_err(|_| anyhow!("Outbox lock poisoned"))?
            .push(email);
        Ok(())
    }
}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Log,
    Memory(Outbox),
}

/// Email service for sending account emails
pub struct EmailService {
    from: String,
    transport: Transport,
}

impl EmailService {
    /// SMTP relay when `smtp_host` is set, the log otherwise
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        if config.smtp_host.is_empty() {
            tracing::info!("No SMTP host configured, account emails will be logged");
            return Ok(Self {
                from: config.from_address.clone(),
                transport: Transport::Log,
            });
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            from: config.from_address.clone(),
            transport: Transport::Smtp(builder.build()),
        })
    }

    /// Capture messages in memory instead of sending them
    pub fn in_memory(from: impl Into<String>) -> (Self, Outbox) {
        let outbox = Outbox::default();
        let service = Self {
            from: from.into(),
            transport: Transport::Memory(outbox.clone()),
        };
        (service, outbox)
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        match &self.transport {
            Transport::Smtp(mailer) => {
                let email = Message::builder()
                    .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
                    .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
                    .subject(subject)
                    .header(ContentType::TEXT_PLAIN)
                    .body(body.to_string())
                    .map_err(|e| anyhow!("Failed to build email: {}", e))?;

                mailer
                    .send(email)
                    .await
                    .map_err(|e| anyhow!("Failed to send email: {}", e))?;
            }
            Transport::Log => {
                tracing::info!(to = %to, subject = %subject, "Email not sent (no SMTP host):\n{}", body);
            }
            Transport::Memory(outbox) => outbox.push(OutgoingEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            })?,
        }
        Ok(())
    }

    pub async fn send_activation(&self, to: &str, username: &str, link: &str) -> Result<()> {
        let body = format!(
            "Hi {},\n\nPlease confirm your email address to activate your account:\n\n{}\n\nIf you did not sign up, you can ignore this email.\n",
            username, link
        );
        self.send(to, "Activate your account", &body).await
    }

    pub async fn send_password_reset(&self, to: &str, username: &str, link: &str) -> Result<()> {
        let body = format!(
            "Hi {},\n\nSomeone asked to reset the password for your account. Use this link to choose a new one:\n\n{}\n\nIf it was not you, you can ignore this email.\n",
            username, link
        );
        self.send(to, "Reset your password", &body).await
    }
}
