use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use atelier_core::mail::{Mailer, OutgoingMail};

use crate::config::SmtpConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(5);

/// SMTP relay transport.
///
/// Port 465 uses implicit TLS, 587 upgrades with STARTTLS, anything else is
/// treated as a plain local relay (Mailpit, a sidecar MTA).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let host = config
            .host
            .as_deref()
            .context("smtp host is not configured")?;
        let from: Mailbox = config
            .from
            .parse()
            .context("invalid ATELIER_SMTP_FROM")?;

        let mut builder = match config.port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        }
        .port(config.port)
        .timeout(Some(SMTP_TIMEOUT));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        let to: Mailbox = mail.to.parse().context("invalid recipient address")?;
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = mail.reply_to.as_deref() {
            let reply_to: Mailbox = reply_to.parse().context("invalid reply-to address")?;
            builder = builder.reply_to(reply_to);
        }
        let message = builder
            .body(mail.body)
            .context("smtp message build failed")?;
        self.transport
            .send(message)
            .await
            .context("smtp send failed")?;
        Ok(())
    }
}

/// Logs mail instead of sending it. Used when no relay is configured or
/// `ATELIER_SMTP_NOOP` is set.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            "SMTP noop transport enabled; mail not dispatched"
        );
        Ok(())
    }
}

pub fn mailer_from_config(config: &SmtpConfig) -> Arc<dyn Mailer> {
    if config.noop || config.host.is_none() {
        return Arc::new(NoopMailer);
    }
    match SmtpMailer::new(config) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            tracing::error!(error = %e, "SMTP transport misconfigured; mail disabled");
            Arc::new(NoopMailer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp(host: Option<&str>, noop: bool) -> SmtpConfig {
        SmtpConfig {
            host: host.map(str::to_string),
            port: 2525,
            username: None,
            password: None,
            from: "studio@example.com".to_string(),
            noop,
        }
    }

    #[tokio::test]
    async fn noop_mailer_always_succeeds() {
        let mailer = NoopMailer;
        let result = mailer
            .send(OutgoingMail {
                to: "owner@example.com".to_string(),
                subject: "Hi".to_string(),
                body: "Body".to_string(),
                reply_to: None,
            })
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn smtp_mailer_requires_host() {
        assert!(SmtpMailer::new(&smtp(None, false)).is_err());
    }

    #[test]
    fn smtp_mailer_rejects_bad_from_address() {
        let mut cfg = smtp(Some("localhost"), false);
        cfg.from = "not an address".to_string();
        assert!(SmtpMailer::new(&cfg).is_err());
    }

    #[tokio::test]
    async fn local_relay_builds() {
        assert!(SmtpMailer::new(&smtp(Some("localhost"), false)).is_ok());
    }
}
