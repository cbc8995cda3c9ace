//! Outgoing email
//!
//! SMTP delivery through lettre. With SMTP disabled, messages are written
//! to the log instead.

use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::{AppError, AppResult};

/// Mail sender shared through the application state
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    /// Sender mailbox; absent in log-only mode
    from: Option<Mailbox>,
}

/// A rendered message ready to send
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mailer {
    pub fn from_config(config: &SmtpConfig) -> AppResult<Self> {
        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Configuration(format!("Invalid from address: {}", e)))?;

        if !config.enabled {
            return Ok(Self::log_only());
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AppError::Configuration(format!("SMTP relay error: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport: Some(transport),
            from: Some(from),
        })
    }

    /// A mailer that only logs
    pub fn log_only() -> Self {
        Self {
            transport: None,
            from: None,
        }
    }

    pub async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::info!(to = %email.to, subject = %email.subject, body = %email.body, "email (smtp disabled)");
            return Ok(());
        };

        let message = Message::builder()
            .from(from.clone())
            .to(email
                .to
                .parse()
                .map_err(|e| AppError::EmailDelivery(format!("Invalid to address: {}", e)))?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| AppError::EmailDelivery(format!("Failed to build email: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailDelivery(e.to_string()))?;

        tracing::debug!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }

    /// Send in the background; failures are logged only
    pub fn dispatch(&self, email: OutgoingEmail) {
        let mailer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&email).await {
                tracing::warn!(to = %email.to, error = %e, "failed to deliver email");
            }
        });
    }
}

pub fn email_verification(to: &str, frontend_url: &str, token: &str) -> OutgoingEmail {
    let link = format!("{}/verify-email?token={}", frontend_url.trim_end_matches('/'), token);
    OutgoingEmail {
        to: to.to_string(),
        subject: "Verify your Tradeflow account".to_string(),
        body: format!(
            "Welcome to Tradeflow!\n\nConfirm your email address by opening the link below:\n{}\n\nThe link expires in 24 hours.",
            link
        ),
    }
}

pub fn company_verification(
    to: &str,
    company_name: &str,
    frontend_url: &str,
    token: &str,
) -> OutgoingEmail {
    let link = format!(
        "{}/verify-company?token={}",
        frontend_url.trim_end_matches('/'),
        token
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Verify company {}", company_name),
        body: format!(
            "Confirm the registration of {} on Tradeflow:\n{}\n\nUnverified companies are removed automatically.",
            company_name, link
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_link_points_at_frontend() {
        let email = email_verification("a@example.com", "https://app.example.com/", "abc");
        assert!(email
            .body
            .contains("https://app.example.com/verify-email?token=abc"));
    }

    #[tokio::test]
    async fn disabled_smtp_logs_instead_of_sending() {
        let mailer = Mailer::log_only();
        let email = company_verification("a@example.com", "ACME", "http://localhost", "t");
        assert!(mailer.send(&email).await.is_ok());
    }
}
