//! Outbound mail.
//!
//! One process-wide `Mailer` handle is constructed in `main` and injected
//! through `AppState`. Verification mail is best-effort: a send failure is
//! logged and never fails the registration that triggered it.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, verify_url: &str);
}

/// SMTP mailer over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, verify_url: &str) {
        let message = Message::builder()
            .from(match self.from.parse() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Invalid SMTP_FROM address '{}': {e}", self.from);
                    return;
                }
            })
            .to(match to.parse() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Invalid recipient address: {e}");
                    return;
                }
            })
            .subject("Verify your email address")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Welcome!\n\nPlease confirm your email address by opening this link:\n\n{verify_url}\n\nThe link expires in 24 hours. If you did not create an account, you can ignore this mail.\n"
            ));

        let message = match message {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to build verification mail: {e}");
                return;
            }
        };

        if let Err(e) = self.transport.send(message).await {
            warn!("Failed to send verification mail to {to}: {e}");
        }
    }
}

/// Fallback when SMTP is not configured (local development): the link is
/// logged so the flow stays testable end to end.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, verify_url: &str) {
        info!("SMTP not configured; verification link for {to}: {verify_url}");
    }
}
