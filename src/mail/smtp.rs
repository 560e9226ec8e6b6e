use anyhow::{Context, Result};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::{Account, ServerConfig};
use crate::mail::imap::is_localhost;
use crate::mail::{MailTransport, OutboundMessage};

pub(crate) fn to_lettre(msg: &OutboundMessage) -> Result<Message> {
    let from: Mailbox = msg
        .from
        .parse()
        .with_context(|| format!("invalid sender {:?}", msg.from))?;
    let to: Mailbox = msg
        .to
        .parse()
        .with_context(|| format!("invalid recipient {:?}", msg.to))?;

    let email = Message::builder()
        .from(from)
        .to(to)
        .subject(msg.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(msg.body.clone())?;
    Ok(email)
}

/// SMTP submission over STARTTLS, or implicit TLS when `starttls` is off.
pub struct SmtpSender {
    mailer: SmtpTransport,
    host: String,
}

impl SmtpSender {
    pub fn new(cfg: &ServerConfig, account: &Account) -> Result<Self> {
        let creds = Credentials::new(account.username.clone(), account.password.clone());

        let mut tlsb = TlsParameters::builder(cfg.host.clone());
        if is_localhost(&cfg.host) {
            tlsb = tlsb
                .dangerous_accept_invalid_certs(true)
                .dangerous_accept_invalid_hostnames(true);
        }
        let tls = tlsb.build().context("building TLS parameters")?;

        let tls = if cfg.starttls {
            Tls::Required(tls)
        } else {
            Tls::Wrapper(tls)
        };

        let mailer = SmtpTransport::builder_dangerous(&cfg.host)
            .port(cfg.port)
            .credentials(creds)
            .tls(tls)
            .build();

        Ok(Self {
            mailer,
            host: format!("{}:{}", cfg.host, cfg.port),
        })
    }
}

impl MailTransport for SmtpSender {
    fn submit(&self, message: &OutboundMessage) -> Result<()> {
        let email = to_lettre(message)?;

        info!(server = %self.host, to = %message.to, "submitting message");
        let response = self
            .mailer
            .send(&email)
            .with_context(|| format!("submitting to {}", self.host))?;
        info!(code = %response.code(), "message accepted");
        Ok(())
    }
}
