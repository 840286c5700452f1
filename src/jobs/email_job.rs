//! Email background job.
//!
//! Password-reset mails are enqueued by the auth service and processed
//! here by the worker. Without SMTP configuration the job logs the
//! mail instead of sending it, which is what development wants.

use serde::{Deserialize, Serialize};
use std::env;

use crate::errors::AppError;

/// Email job payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJob {
    /// Recipient email address
    pub to: String,
    /// Email subject line
    pub subject: String,
    /// Email body content (plain text)
    pub body: String,
}

impl EmailJob {
    /// Create a new email job
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// The password-reset mail sent by the forgot-password flow
    pub fn password_reset(to: impl Into<String>, reset_token: &str) -> Self {
        Self::new(
            to,
            "Reset your SkillSwap password",
            format!(
                "A password reset was requested for your account.\n\n\
                 Reset token: {}\n\n\
                 The token expires in one hour. If you did not request \
                 this, you can ignore this email.",
                reset_token
            ),
        )
    }
}

/// SMTP settings from environment
struct EmailConfig {
    smtp_host: Option<String>,
    smtp_from: String,
}

impl EmailConfig {
    fn from_env() -> Self {
        Self {
            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_from: env::var("SMTP_FROM").unwrap_or_else(|_| "noreply@skillswap.dev".to_string()),
        }
    }

    fn is_configured(&self) -> bool {
        self.smtp_host.is_some()
    }
}

/// Email job handler - processes email sending jobs
pub async fn email_job_handler(job: EmailJob) -> Result<(), AppError> {
    let config = EmailConfig::from_env();

    tracing::info!(
        to = %job.to,
        from = %config.smtp_from,
        subject = %job.subject,
        "Processing email job"
    );

    if !config.is_configured() {
        // Development mode: log the email instead of sending
        tracing::info!(
            "=== EMAIL (not sent, SMTP unconfigured) ===\n\
             From: {}\nTo: {}\nSubject: {}\nBody:\n{}\n\
             ===========================================",
            config.smtp_from,
            job.to,
            job.subject,
            job.body
        );
        return Ok(());
    }

    // TODO: wire lettre for real SMTP delivery; until then a
    // configured host is treated like the unconfigured case.
    tracing::warn!("SMTP is configured but no transport is built in; email not sent");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_reset_mail_carries_the_token() {
        let job = EmailJob::password_reset("user@example.com", "tok-123");

        assert_eq!(job.to, "user@example.com");
        assert!(job.body.contains("tok-123"));
        assert!(job.subject.contains("password"));
    }

    #[tokio::test]
    async fn handler_succeeds_without_smtp() {
        let job = EmailJob::new("user@example.com", "Hi", "Body");
        assert!(email_job_handler(job).await.is_ok());
    }
}
