use anyhow::{anyhow, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::config::MailConfig;

const SIGNUP_SUBJECT: &str = "Registration";
const SIGNUP_BODY: &str = "You have successfully registered on the site.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
enum Transport {
    Smtp(Arc<AsyncSmtpTransport<Tokio1Executor>>),
    Memory(Arc<Mutex<Vec<OutgoingMail>>>),
}

/// Outbound mail over SMTP, or into an in-memory outbox when no SMTP host
/// is configured.
#[derive(Clone)]
pub struct Mailer {
    transport: Transport,
    from: Mailbox,
    signup_fail_silently: bool,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|err| anyhow!("invalid MAIL_FROM address: {}", err))?;

        let transport = if config.smtp_host.trim().is_empty() {
            warn!("SMTP host not configured; mail goes to the in-memory outbox");
            Transport::Memory(Arc::new(Mutex::new(Vec::new())))
        } else {
            let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|err| anyhow!("failed to configure SMTP transport: {}", err))?
                .port(config.smtp_port);

            let builder = match (&config.smtp_username, &config.smtp_password) {
                (Some(username), Some(password)) => {
                    builder.credentials(Credentials::new(username.clone(), password.clone()))
                }
                _ => builder,
            };

            Transport::Smtp(Arc::new(builder.build()))
        };

        Ok(Self {
            transport,
            from,
            signup_fail_silently: config.signup_fail_silently,
        })
    }

    pub fn is_smtp(&self) -> bool {
        matches!(self.transport, Transport::Smtp(_))
    }

    /// Mail captured by the in-memory transport. Always empty for SMTP.
    pub fn outbox(&self) -> Vec<OutgoingMail> {
        match &self.transport {
            Transport::Memory(outbox) => outbox.lock().map(|mail| mail.clone()).unwrap_or_default(),
            Transport::Smtp(_) => Vec::new(),
        }
    }

    /// Registration notice. Whether a delivery failure reaches the caller
    /// is governed by `SIGNUP_EMAIL_FAIL_SILENTLY`.
    pub async fn send_signup_notice(&self, recipient: &str) -> Result<()> {
        match self.send(recipient, SIGNUP_SUBJECT, SIGNUP_BODY).await {
            Ok(()) => Ok(()),
            Err(err) if self.signup_fail_silently => {
                warn!(error = ?err, recipient, "failed to send signup notice");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|err| anyhow!("invalid recipient {}: {}", recipient, err))?;

        match &self.transport {
            Transport::Smtp(transport) => {
                let message = Message::builder()
                    .from(self.from.clone())
                    .to(to)
                    .subject(subject)
                    .header(header::ContentType::TEXT_PLAIN)
                    .body(body.to_string())
                    .map_err(|err| anyhow!("failed to build message: {}", err))?;
                transport
                    .send(message)
                    .await
                    .map_err(|err| anyhow!("failed to send mail: {}", err))?;
            }
            Transport::Memory(outbox) => {
                let mut outbox = outbox
                    .lock()
                    .map_err(|_| anyhow!("outbox lock poisoned"))?;
                outbox.push(OutgoingMail {
                    to: to.email.to_string(),
                    subject: subject.to_string(),
                    body: body.to_string(),
                });
            }
        }

        info!(recipient, subject, "mail sent");
        Ok(())
    }
}
