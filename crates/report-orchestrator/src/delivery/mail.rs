//! SMTP mail transport

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::{MailTransport, OutgoingEmail};
use crate::config::MailConfig;
use crate::error::{Error, Result};

/// Sends mail through the configured SMTP relay
pub struct SmtpMailer {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let builder = if config.use_tls {
            SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| Error::mail(format!("invalid SMTP relay {}: {}", config.smtp_host, e)))?
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
        };
        let builder = builder.port(config.smtp_port);
        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };

        let sender = config
            .sender
            .parse::<Mailbox>()
            .map_err(|e| Error::Config(format!("invalid sender '{}': {}", config.sender, e)))?;

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(email.subject.clone());
        for recipient in &email.to {
            let mailbox = recipient
                .to_string()
                .parse::<Mailbox>()
                .map_err(|e| Error::mail(format!("invalid recipient '{}': {}", recipient, e)))?;
            builder = builder.to(mailbox);
        }

        if email.attachments.is_empty() {
            return builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.body.clone())
                .map_err(|e| Error::mail(e.to_string()));
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone()));
        for path in &email.attachments {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("attachment")
                .to_string();
            let bytes = std::fs::read(path)?;
            let content_type = ContentType::parse("application/octet-stream")
                .map_err(|e| Error::mail(e.to_string()))?;
            parts = parts.singlepart(Attachment::new(file_name).body(bytes, content_type));
        }
        builder.multipart(parts).map_err(|e| Error::mail(e.to_string()))
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if email.to.is_empty() {
            return Ok(());
        }
        let message = self.build_message(email)?;
        self.transport
            .send(&message)
            .map_err(|e| Error::mail(format!("SMTP send failed: {}", e)))?;
        tracing::debug!("Mail '{}' sent to {} recipient(s)", email.subject, email.to.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
