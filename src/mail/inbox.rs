use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::mail::{decode, Mailbox, MessageSummary};

/// Summaries of the `limit` newest messages, newest first.
///
/// Listing or fetching errors end the batch. A message that does not decode
/// cleanly still gets a summary with whatever could be recovered.
pub fn fetch_recent<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    limit: usize,
) -> Result<Vec<MessageSummary>> {
    let ids = mailbox.message_ids().context("listing messages")?;
    let picked = &ids[ids.len().saturating_sub(limit)..];
    info!(total = ids.len(), picked = picked.len(), "fetching recent messages");

    let mut out = Vec::with_capacity(picked.len());
    for &id in picked.iter().rev() {
        let Some(raw) = mailbox
            .fetch_raw(id)
            .with_context(|| format!("fetching message {id}"))?
        else {
            warn!(id, "server returned no data for message, skipping");
            continue;
        };

        debug!(id, bytes = raw.len(), "decoding message");
        out.push(decode::decode(&raw));
    }

    Ok(out)
}
