use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use thiserror::Error;

use crate::config::AppConfig;

/// The message kinds the storefront sends. All of them are best-effort:
/// callers go through [`send_detached`] and never wait on delivery.
#[derive(Debug, Clone)]
pub enum Notice {
    Welcome,
    PasswordReset { token: String },
    OrderConfirmation { payment_link: String },
}

impl Notice {
    fn subject(&self) -> &'static str {
        match self {
            Notice::Welcome => "Welcome to the pharmacy",
            Notice::PasswordReset { .. } => "Password recovery",
            Notice::OrderConfirmation { .. } => "Your purchase order",
        }
    }

    fn html_body(&self) -> String {
        match self {
            Notice::Welcome => {
                "<div><p>Welcome! Your account is ready, happy browsing.</p></div>".to_string()
            }
            Notice::PasswordReset { token } => format!(
                "<div><p>Click the button below to reset your password.</p>\
                 <a href=\"https://pharmacy-front.netlify.app/reset/{token}\">Reset password</a></div>"
            ),
            Notice::OrderConfirmation { payment_link } => format!(
                "<div><p>Thank you for your purchase! Follow the link to complete the payment.</p>\
                 <a href=\"{payment_link}\">Finish payment</a></div>"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to_email: &str, notice: Notice) -> Result<(), NotifyError>;
}

/// SMTP notifier. Transport is built once at startup.
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotifier {
    pub fn new(config: &AppConfig) -> Result<Self, SmtpError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }
        Ok(Self {
            mailer: builder.build(),
            from_address: config.smtp_from.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to_email: &str, notice: Notice) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(notice.subject())
            .header(ContentType::TEXT_HTML)
            .body(notice.html_body())?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Fire-and-forget delivery: spawn, log on failure, keep no handle.
/// Used only after the durable part of an operation has committed.
pub fn send_detached(notifier: Arc<dyn Notifier>, to_email: String, notice: Notice) {
    tokio::spawn(async move {
        if let Err(err) = notifier.send(&to_email, notice).await {
            tracing::warn!(error = %err, to = %to_email, "notification failed");
        }
    });
}
