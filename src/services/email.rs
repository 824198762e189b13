//! Email delivery over SMTP
//!
//! SMTP parameters live in the settings table so admins can change them
//! without a restart.

use crate::db::repositories::SettingsRepository;
use crate::models::setting::keys;
use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

pub struct EmailService {
    settings_repo: Arc<dyn SettingsRepository>,
}

impl EmailService {
    pub fn new(settings_repo: Arc<dyn SettingsRepository>) -> Self {
        Self { settings_repo }
    }

    /// Whether SMTP is configured at all.
    pub async fn is_configured(&self) -> bool {
        matches!(
            self.settings_repo.get(keys::SMTP_HOST).await,
            Ok(Some(host)) if !host.is_empty()
        )
    }

    /// Send a team invitation link.
    pub async fn send_team_invite(
        &self,
        to_email: &str,
        team_name: &str,
        invite_url: &str,
    ) -> Result<()> {
        let subject = format!("You have been invited to join {}", team_name);
        let body = format!(
            "Hello,\n\nYou have been invited to join the team \"{}\" on Zyvarin.\n\n\
             Accept the invitation here:\n{}\n\n\
             The invitation expires in 7 days. If you were not expecting this email, \
             you can ignore it.\n\nThe Zyvarin team",
            team_name, invite_url
        );
        self.send(to_email, &subject, &body).await
    }

    /// Send a plain test email so admins can verify their SMTP settings.
    pub async fn send_test_email(&self, to_email: &str) -> Result<()> {
        self.send(
            to_email,
            "Zyvarin SMTP test",
            "If you can read this, outgoing email is configured correctly.",
        )
        .await
    }

    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<()> {
        let smtp_host = self.require_setting(keys::SMTP_HOST).await?;
        let smtp_port: u16 = self
            .get_setting(keys::SMTP_PORT)
            .await
            .unwrap_or_else(|| "587".to_string())
            .parse()
            .unwrap_or(587);
        let smtp_username = self.require_setting(keys::SMTP_USERNAME).await?;
        let smtp_password = self.require_setting(keys::SMTP_PASSWORD).await?;
        let smtp_from = self.require_setting(keys::SMTP_FROM).await?;

        let email = Message::builder()
            .from(
                smtp_from
                    .parse()
                    .map_err(|e| anyhow!("Invalid from address: {}", e))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let creds = Credentials::new(smtp_username, smtp_password);
        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
                .credentials(creds)
                .port(smtp_port)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Option<String> {
        self.settings_repo.get(key).await.ok().flatten()
    }

    async fn require_setting(&self, key: &str) -> Result<String> {
        self.get_setting(key)
            .await
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("Setting '{}' is not configured", key))
    }
}
