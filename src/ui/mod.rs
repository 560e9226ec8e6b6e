use std::io::{self, Write};

use crate::mail::MessageSummary;

mod list;

/// Prints the summaries to stdout, in the order given.
pub fn print_summaries(messages: &[MessageSummary]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    list::write_all(&mut out, messages)
}

pub fn print_sent() -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "Email sent successfully.")
}
