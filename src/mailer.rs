//! Delivery of one-time codes
//!
//! Delivery is best effort: callers log a failed delivery and carry on, the code is issued
//! either way.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::otp::CODE_LIFETIME_MINUTES;

/// Port on which SMTP servers expect TLS from the first byte
const IMPLICIT_TLS_PORT: u16 = 465;

/// Mail delivery errors
#[derive(Debug, Error)]
pub enum MailError {
    /// No way to deliver mail is configured
    #[error("Email delivery is not configured")]
    NotConfigured,

    /// Sender or recipient is not a valid address
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The message could not be built
    #[error("Invalid email message: {0}")]
    Message(#[from] lettre::error::Error),

    /// The SMTP server refused or could not be reached
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Something that can deliver one-time codes to an email address
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a one-time code
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailError>;
}

/// Mailer shared by all requests
pub type SharedMailer = Arc<dyn Mailer>;

/// Setup the mailer based on the SMTP configuration
///
/// Without configuration every delivery fails with [`MailError::NotConfigured`]
///
/// # Errors
///
/// Will return `Err` when the SMTP configuration is invalid
pub fn setup(smtp: Option<&SmtpConfig>) -> Result<SharedMailer, MailError> {
    let mailer: SharedMailer = match smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => Arc::new(DisabledMailer),
    };

    Ok(mailer)
}

/// Mailer sending through an SMTP server
pub struct SmtpMailer {
    /// Pooled SMTP transport
    transport: AsyncSmtpTransport<Tokio1Executor>,

    /// Sender of all messages
    from: Mailbox,
}

impl SmtpMailer {
    /// Create an SMTP mailer
    pub fn new(smtp: &SmtpConfig) -> Result<Self, MailError> {
        let from = smtp.from.parse()?;

        let builder = if smtp.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
        };

        let builder = builder.port(smtp.port);

        let builder = match (&smtp.username, &smtp.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.parse()?)
            .subject("Your verification code")
            .header(ContentType::TEXT_PLAIN)
            .body(code_body(code))?;

        self.transport.send(message).await?;

        tracing::debug!("Delivered one-time code to {email}");

        Ok(())
    }
}

/// Mailer used when no SMTP server is configured
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_code(&self, _email: &str, _code: &str) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

fn code_body(code: &str) -> String {
    format!(
        "Your verification code is {code}.\n\nThe code is valid for {CODE_LIFETIME_MINUTES} minutes.\n"
    )
}
