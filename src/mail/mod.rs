use anyhow::Result;

pub mod decode;
pub mod imap;
pub mod inbox;
pub mod smtp;

/// Number of body characters kept in a summary.
pub const PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn build(from: &str, to: &str, subject: &str, body: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSummary {
    pub from: String,
    pub subject: String,
    pub excerpt: String,
    pub truncated: bool,
}

impl MessageSummary {
    pub fn new(from: String, subject: String, body: &str) -> Self {
        let (excerpt, truncated) = excerpt(body, PREVIEW_CHARS);
        Self {
            from,
            subject,
            excerpt,
            truncated,
        }
    }
}

fn excerpt(body: &str, max_chars: usize) -> (String, bool) {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => (body[..cut].to_string(), true),
        None => (body.to_string(), false),
    }
}

/// Outbound side: submits one finished message.
#[cfg_attr(test, mockall::automock)]
pub trait MailTransport {
    fn submit(&self, message: &OutboundMessage) -> Result<()>;
}

/// Inbound side: an authenticated session with one mailbox selected.
#[cfg_attr(test, mockall::automock)]
pub trait Mailbox {
    /// All message ids, oldest first.
    fn message_ids(&mut self) -> Result<Vec<u32>>;

    /// The full raw message, or `None` when the server returned no data for it.
    fn fetch_raw(&mut self, id: u32) -> Result<Option<Vec<u8>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_body_is_not_truncated() {
        let s = MessageSummary::new("a@b".into(), "s".into(), "hi");
        assert_eq!(s.excerpt, "hi");
        assert!(!s.truncated);
    }

    #[test]
    fn test_exact_length_body_is_not_truncated() {
        let body = "x".repeat(PREVIEW_CHARS);
        let s = MessageSummary::new(String::new(), String::new(), &body);
        assert_eq!(s.excerpt, body);
        assert!(!s.truncated);
    }

    #[test]
    fn test_long_body_is_cut_at_preview_length() {
        let body = "y".repeat(PREVIEW_CHARS + 50);
        let s = MessageSummary::new(String::new(), String::new(), &body);
        assert_eq!(s.excerpt.chars().count(), PREVIEW_CHARS);
        assert_eq!(s.excerpt, &body[..PREVIEW_CHARS]);
        assert!(s.truncated);
    }

    #[test]
    fn test_excerpt_counts_characters_not_bytes() {
        let body = "é".repeat(PREVIEW_CHARS + 1);
        let s = MessageSummary::new(String::new(), String::new(), &body);
        assert_eq!(s.excerpt, "é".repeat(PREVIEW_CHARS));
        assert!(s.truncated);
    }

    #[test]
    fn test_build_outbound() {
        let m = OutboundMessage::build("me@example.com", "you@example.com", "Hi", "Body");
        assert_eq!(m.from, "me@example.com");
        assert_eq!(m.to, "you@example.com");
        assert_eq!(m.subject, "Hi");
        assert_eq!(m.body, "Body");
    }
}
