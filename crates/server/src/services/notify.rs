//! Account notifications.
//!
//! The user service reports [`NotificationEvent`]s through the [`Notifier`]
//! port. Message bodies are rendered from the Askama templates under
//! `templates/email/`, so every transport sends the same text.
//!
//! # Transports
//!
//! - [`EmailNotifier`] - SMTP via lettre
//! - [`LogNotifier`] - writes the rendered message to the log; used when SMTP
//!   is not configured
//! - [`CaptureNotifier`] - keeps rendered messages in memory for tests

use std::sync::{Mutex, PoisonError};

use askama::Template;
use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::time::error::Elapsed;

use staple_core::{Email, NotificationEvent};

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    recipient: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    recipient: &'a str,
    password: &'a str,
}

#[derive(Template)]
#[template(path = "email/confirm_code.txt")]
struct ConfirmCodeText<'a> {
    recipient: &'a str,
    code: &'a str,
}

/// Errors that can occur when delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// The transport refused the message.
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// The transport did not finish before the deadline.
    #[error("delivery timed out")]
    TimedOut(#[from] Elapsed),
}

/// A notification rendered to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    /// `[YYYY-MM-DD] <event> Notification`
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

impl RenderedNotification {
    /// Render `event` for `recipient`.
    ///
    /// `payload` is the new password for [`NotificationEvent::PasswordReset`],
    /// the code for [`NotificationEvent::ConfirmCode`], and ignored for
    /// [`NotificationEvent::Welcome`].
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Template` if rendering fails.
    pub fn render(
        recipient: &Email,
        event: NotificationEvent,
        payload: &str,
    ) -> Result<Self, NotifyError> {
        let recipient = recipient.as_str();
        let body = match event {
            NotificationEvent::Welcome => WelcomeText { recipient }.render()?,
            NotificationEvent::PasswordReset => PasswordResetText {
                recipient,
                password: payload,
            }
            .render()?,
            NotificationEvent::ConfirmCode => ConfirmCodeText {
                recipient,
                code: payload,
            }
            .render()?,
        };

        Ok(Self {
            subject: format!("[{}] {event} Notification", Utc::now().format("%Y-%m-%d")),
            body,
        })
    }
}

/// Delivers account notifications to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `event` to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the message cannot be rendered or delivered.
    async fn notify(
        &self,
        recipient: &Email,
        event: NotificationEvent,
        payload: &str,
    ) -> Result<(), NotifyError>;
}

// =============================================================================
// SMTP
// =============================================================================

/// Sends notifications as plain text email.
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailNotifier {
    /// Create a new email notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(
        &self,
        recipient: &Email,
        event: NotificationEvent,
        payload: &str,
    ) -> Result<(), NotifyError> {
        let rendered = RenderedNotification::render(recipient, event, payload)?;

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(recipient
                .as_str()
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(recipient.to_string()))?)
            .subject(&rendered.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(rendered.body)?;

        self.mailer.send(email).await?;

        tracing::info!(to = %recipient, event = %event, "Notification sent");
        Ok(())
    }
}

// =============================================================================
// Log
// =============================================================================

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        recipient: &Email,
        event: NotificationEvent,
        payload: &str,
    ) -> Result<(), NotifyError> {
        let rendered = RenderedNotification::render(recipient, event, payload)?;
        tracing::info!(
            to = %recipient,
            subject = %rendered.subject,
            body = %rendered.body,
            "SMTP not configured; notification logged"
        );
        Ok(())
    }
}

// =============================================================================
// Capture
// =============================================================================

/// One notification recorded by [`CaptureNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedNotification {
    pub recipient: Email,
    pub event: NotificationEvent,
    pub payload: String,
    pub rendered: RenderedNotification,
}

/// Records rendered notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct CaptureNotifier {
    sent: Mutex<Vec<CapturedNotification>>,
    failure: Mutex<Option<String>>,
}

impl CaptureNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery fail with `message`, or clear the failure.
    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = message.map(str::to_owned);
    }

    /// Everything delivered so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<CapturedNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payload of the most recent `event` sent to `recipient`.
    #[must_use]
    pub fn last_payload(&self, recipient: &Email, event: NotificationEvent) -> Option<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|n| &n.recipient == recipient && n.event == event)
            .map(|n| n.payload.clone())
    }
}

#[async_trait]
impl Notifier for CaptureNotifier {
    async fn notify(
        &self,
        recipient: &Email,
        event: NotificationEvent,
        payload: &str,
    ) -> Result<(), NotifyError> {
        if let Some(message) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(NotifyError::Rejected(message));
        }

        let rendered = RenderedNotification::render(recipient, event, payload)?;
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedNotification {
                recipient: recipient.clone(),
                event,
                payload: payload.to_owned(),
                rendered,
            });
        Ok(())
    }
}
