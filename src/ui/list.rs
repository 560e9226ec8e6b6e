use std::io::{self, Write};

use crate::mail::MessageSummary;

pub fn write_summary<W: Write>(out: &mut W, m: &MessageSummary) -> io::Result<()> {
    let ellipsis = if m.truncated { "..." } else { "" };

    writeln!(out, "From: {}", m.from)?;
    writeln!(out, "Subject: {}", m.subject)?;
    writeln!(out, "Body: {}{ellipsis}", m.excerpt)?;
    writeln!(out, "---")
}

pub fn write_all<W: Write>(out: &mut W, messages: &[MessageSummary]) -> io::Result<()> {
    for m in messages {
        write_summary(out, m)?;
    }
    out.flush()
}
