//! Mailgun HTTP API mail transport.
//!
//! Sends plain-text mail through Mailgun's messages endpoint. Errors carry
//! enough context (status code, response preview) for the delivery log.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;

use super::EmailMessage;
use crate::config::Config;

/// Mail transport over Mailgun's HTTP API.
#[derive(Clone)]
pub struct MailgunMailer {
    client: Client,
    api_base: String,
    domain: String,
    api_key: String,
    from_email: String,
}

impl MailgunMailer {
    /// Build a mailer from configuration. Fails when the Mailgun key or
    /// domain is missing, which the notifier treats as a startup error.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .mailgun_api_key
            .clone()
            .context("MAILGUN_API_KEY is required")?;
        let domain = config
            .mailgun_domain
            .clone()
            .context("MAILGUN_DOMAIN is required")?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: config.mailgun_api_base.clone(),
            domain,
            api_key,
            from_email: config.from_email.clone(),
        })
    }

    /// Send one email. An error here means the message may not have been
    /// delivered; the caller decides whether that matters.
    pub async fn send(&self, message: &EmailMessage) -> Result<()> {
        let url = format!("{}/v3/{}/messages", self.api_base, self.domain);

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.from_email.as_str()),
                ("to", message.to.as_str()),
                ("subject", message.subject.as_str()),
                ("text", message.body.as_str()),
            ])
            .send()
            .await
            .context("Mailgun request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(500).collect();
            bail!("Mailgun rejected message: {} {}", status, preview);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer_config() -> Config {
        let mut config = Config::from_env();
        config.mailgun_api_key = Some("key-test".to_string());
        config.mailgun_domain = Some("mg.example.com".to_string());
        config.mailgun_api_base = "https://api.mailgun.net".to_string();
        config
    }

    #[test]
    fn test_from_config_requires_key_and_domain() {
        let mut config = mailer_config();
        config.mailgun_api_key = None;
        assert!(MailgunMailer::from_config(&config).is_err());

        let mut config = mailer_config();
        config.mailgun_domain = None;
        assert!(MailgunMailer::from_config(&config).is_err());

        assert!(MailgunMailer::from_config(&mailer_config()).is_ok());
    }
}
