use anyhow::{anyhow, Context, Result};
use native_tls::{TlsConnector, TlsStream};
use std::net::TcpStream;
use tracing::{debug, info};

use crate::config::{Account, ServerConfig};
use crate::mail::Mailbox;

const INBOX: &str = "INBOX";

type Session = imap::Session<TlsStream<TcpStream>>;

pub(crate) fn is_localhost(host: &str) -> bool {
    host == "127.0.0.1" || host == "localhost"
}

fn tls_connector_for(cfg: &ServerConfig) -> Result<TlsConnector> {
    let mut b = TlsConnector::builder();

    if is_localhost(&cfg.host) {
        b.danger_accept_invalid_certs(true);
        b.danger_accept_invalid_hostnames(true);
    }

    Ok(b.build()?)
}

fn connect(cfg: &ServerConfig, account: &Account) -> Result<Session> {
    let tls = tls_connector_for(cfg)?;

    info!(
        host = %cfg.host,
        port = cfg.port,
        starttls = cfg.starttls,
        "connecting to IMAP server"
    );
    let client = if cfg.starttls {
        imap::connect_starttls((cfg.host.as_str(), cfg.port), &cfg.host, &tls)
    } else {
        imap::connect((cfg.host.as_str(), cfg.port), &cfg.host, &tls)
    };
    let client = client.with_context(|| format!("connecting to {}:{}", cfg.host, cfg.port))?;

    let session = client
        .login(&account.username, &account.password)
        .map_err(|e| e.0)
        .context("IMAP login")?;

    Ok(session)
}

/// An authenticated IMAP session with the inbox selected.
///
/// [`ImapMailbox::close`] ends the session cleanly. If the value is dropped
/// without it, the session is logged out anyway.
pub struct ImapMailbox {
    session: Option<Session>,
}

impl ImapMailbox {
    pub fn open(cfg: &ServerConfig, account: &Account) -> Result<Self> {
        let mut mailbox = Self {
            session: Some(connect(cfg, account)?),
        };

        let selected = mailbox
            .session()?
            .select(INBOX)
            .with_context(|| format!("selecting {INBOX}"))?;

        debug!(exists = selected.exists, "inbox selected");
        Ok(mailbox)
    }

    fn session(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| anyhow!("IMAP session already closed"))
    }

    pub fn close(mut self) -> Result<()> {
        if let Some(mut sess) = self.session.take() {
            end_session(&mut sess)?;
            info!("IMAP session closed");
        }
        Ok(())
    }
}

/// The two commands that end a session with a mailbox selected.
trait SessionEnd {
    fn close_mailbox(&mut self) -> Result<()>;
    fn logout(&mut self) -> Result<()>;
}

impl SessionEnd for Session {
    fn close_mailbox(&mut self) -> Result<()> {
        Ok(self.close()?)
    }

    fn logout(&mut self) -> Result<()> {
        Ok(imap::Session::logout(self)?)
    }
}

/// Sends CLOSE then LOGOUT. LOGOUT is attempted even when CLOSE fails.
fn end_session<S: SessionEnd>(sess: &mut S) -> Result<()> {
    let closed = sess.close_mailbox().context("closing mailbox");
    let logged_out = sess.logout().context("IMAP logout");
    closed?;
    logged_out
}

impl Drop for ImapMailbox {
    fn drop(&mut self) {
        if let Some(mut sess) = self.session.take() {
            let _ = sess.logout();
        }
    }
}

impl Mailbox for ImapMailbox {
    fn message_ids(&mut self) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = self
            .session()?
            .search("ALL")
            .context("searching mailbox")?
            .into_iter()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch_raw(&mut self, id: u32) -> Result<Option<Vec<u8>>> {
        let fetches = self
            .session()?
            .fetch(id.to_string(), "BODY.PEEK[]")
            .context("FETCH")?;
        Ok(fetches.iter().find_map(|f| f.body()).map(<[u8]>::to_vec))
    }
}
