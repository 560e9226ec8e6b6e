use clap::CommandFactory;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::config::{Account, Config};
use crate::error::{MailError, Result};
use crate::mail::imap::ImapMailbox;
use crate::mail::smtp::SmtpSender;
use crate::mail::{inbox, MailTransport, MessageSummary, OutboundMessage};
use crate::ui;

pub fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load(cli.config.as_deref())?;

    match command {
        Command::Send { to, subject, body } => {
            let transport =
                SmtpSender::new(&config.smtp, &config.account).map_err(MailError::transport)?;
            send(&config.account, &transport, &to, &subject, &body)?;
            ui::print_sent()?;
        }
        Command::Receive { limit } => {
            let messages = receive(&config, limit)?;
            ui::print_summaries(&messages)?;
        }
    }

    Ok(())
}

pub fn send<T: MailTransport>(
    account: &Account,
    transport: &T,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<()> {
    let message = OutboundMessage::build(&account.username, to, subject, body);
    transport.submit(&message).map_err(MailError::transport)?;
    info!(to, "message sent");
    Ok(())
}

fn receive(config: &Config, limit: usize) -> Result<Vec<MessageSummary>> {
    let mut mailbox =
        ImapMailbox::open(&config.imap, &config.account).map_err(MailError::retrieval)?;
    let messages = inbox::fetch_recent(&mut mailbox, limit).map_err(MailError::retrieval)?;
    mailbox.close().map_err(MailError::retrieval)?;
    Ok(messages)
}
