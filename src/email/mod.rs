//! Outgoing email: transport, report rendering and the daily schedule.
//!
//! Delivery goes through the [`Mailer`] trait:
//! - [`SmtpMailer`]: lettre SMTP relay with login credentials
//! - [`DisabledMailer`]: used when SMTP is not configured, fails every send
//! - [`MemoryMailer`]: keeps messages in memory for inspection

pub mod report;
pub mod schedule;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP is not configured (set SMTP_USER and SMTP_PASS)")]
    NotConfigured,
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// An HTML email to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// Relay through `host` over TLS, authenticating as `user`. Mail is sent from `user`.
    pub fn new(host: &str, user: &str, password: &str) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| MailError::Smtp(e.to_string()))?
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();
        Ok(Self {
            transport,
            from: user.to_string(),
        })
    }
}

fn parse_mailbox(address: &str) -> Result<lettre::message::Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let email = Message::builder()
            .from(parse_mailbox(&self.from)?)
            .to(parse_mailbox(&message.to)?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;
        tracing::info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}

/// Stand-in when no SMTP credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::warn!(to = %message.to, "email not sent: SMTP is not configured");
        Err(MailError::NotConfigured)
    }
}

/// Records messages instead of sending them. Addresses listed in
/// `failing` are rejected.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `address` fail.
    pub fn fail_for(&self, address: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(address.to_string());
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let rejected = self
            .failing
            .lock()
            .map(|f| f.iter().any(|a| a == &message.to))
            .unwrap_or(false);
        if rejected {
            return Err(MailError::Smtp(format!("550 mailbox unavailable: {}", message.to)));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "件名".to_string(),
            html: "<p>本文</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_mailer_records_and_fails() {
        let mailer = MemoryMailer::new();
        mailer.fail_for("bad@example.com");

        mailer.send(&message("ok@example.com")).await.unwrap();
        assert!(mailer.send(&message("bad@example.com")).await.is_err());
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].to, "ok@example.com");
    }

    #[tokio::test]
    async fn test_disabled_mailer_always_fails() {
        let err = DisabledMailer.send(&message("a@example.com")).await.unwrap_err();
        assert!(matches!(err, MailError::NotConfigured));
    }

    #[test]
    fn test_parse_mailbox() {
        assert!(parse_mailbox("ops@example.com").is_ok());
        assert!(matches!(
            parse_mailbox("not an address"),
            Err(MailError::InvalidAddress { .. })
        ));
    }
}
