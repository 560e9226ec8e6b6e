//! Turns one raw RFC 5322 message into a [`MessageSummary`].
//!
//! Decoding never fails. Header trouble yields empty fields and an
//! undecodable part is skipped, so a damaged message still produces a
//! summary.

use encoding_rs::Encoding;
use mailparse::{MailHeader, MailHeaderMap, ParsedMail};
use tracing::debug;

use crate::mail::MessageSummary;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartError {
    #[error("multipart container has no payload of its own")]
    Container,
    #[error("bad transfer encoding: {0}")]
    Transfer(String),
    #[error("unknown charset {0:?}")]
    UnknownCharset(String),
    #[error("payload is not valid {0}")]
    Malformed(String),
}

/// One node of the MIME tree, with its payload already decoded (or not).
#[derive(Debug, Clone)]
pub struct MimePart {
    pub content_type: String,
    pub disposition: Option<String>,
    pub payload: Vec<u8>,
    pub text: Result<String, PartError>,
}

impl MimePart {
    fn from_parsed(part: &ParsedMail<'_>) -> Self {
        let content_type = part.ctype.mimetype.to_ascii_lowercase();
        let disposition = part
            .headers
            .get_first_value("Content-Disposition")
            .map(|v| disposition_token(&v));

        if !part.subparts.is_empty() {
            return Self {
                content_type,
                disposition,
                payload: Vec::new(),
                text: Err(PartError::Container),
            };
        }

        let (payload, text) = match part.get_body_raw() {
            Ok(bytes) => {
                let text = decode_text(&bytes, &part.ctype.charset);
                (bytes, text)
            }
            Err(e) => (Vec::new(), Err(PartError::Transfer(e.to_string()))),
        };

        Self {
            content_type,
            disposition,
            payload,
            text,
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.disposition.as_deref() == Some("attachment")
    }

    /// Inline `text/plain`: the part the body walk is looking for.
    pub fn is_preferred_body(&self) -> bool {
        self.content_type == "text/plain" && !self.is_attachment()
    }
}

fn disposition_token(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn decode_text(bytes: &[u8], charset: &str) -> Result<String, PartError> {
    let label = charset.trim();

    // An unlabelled part is treated as UTF-8, which covers plain ASCII too.
    if label.is_empty() || label.eq_ignore_ascii_case("us-ascii") {
        return String::from_utf8(bytes.to_vec())
            .map_err(|_| PartError::Malformed("UTF-8".to_string()));
    }

    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| PartError::UnknownCharset(label.to_string()))?;

    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| PartError::Malformed(encoding.name().to_string()))
}

/// Flattens the MIME tree in the order the parts appear in the message.
pub fn parts(mail: &ParsedMail<'_>) -> Vec<MimePart> {
    let mut out = Vec::new();
    walk(mail, &mut out);
    out
}

fn walk(mail: &ParsedMail<'_>, out: &mut Vec<MimePart>) {
    out.push(MimePart::from_parsed(mail));
    for sp in &mail.subparts {
        walk(sp, out);
    }
}

/// Picks the body text of a message.
///
/// A single-part message is its own body, or empty if it does not decode.
/// For multipart messages every decodable part replaces the previous
/// candidate, and the walk stops at the first inline `text/plain` part. When
/// there is none, whichever part decoded last is used, even HTML or an
/// attachment.
pub fn select_body(mail: &ParsedMail<'_>) -> String {
    if mail.subparts.is_empty() {
        return match MimePart::from_parsed(mail).text {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "single-part body did not decode");
                String::new()
            }
        };
    }

    let mut body = String::new();
    for part in parts(mail) {
        let preferred = part.is_preferred_body();
        match part.text {
            Ok(text) => body = text,
            Err(PartError::Container) => {}
            Err(e) => debug!(
                content_type = %part.content_type,
                bytes = part.payload.len(),
                error = %e,
                "skipping undecodable part"
            ),
        }
        if preferred {
            break;
        }
    }
    body
}

fn header_text(headers: &[MailHeader<'_>], name: &str) -> String {
    headers
        .get_first_value(name)
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

pub fn decode(raw: &[u8]) -> MessageSummary {
    match mailparse::parse_mail(raw) {
        Ok(mail) => MessageSummary::new(
            header_text(&mail.headers, "From"),
            header_text(&mail.headers, "Subject"),
            &select_body(&mail),
        ),
        Err(e) => {
            debug!(error = %e, "message did not parse, keeping headers only");
            let (from, subject) = match mailparse::parse_headers(raw) {
                Ok((headers, _)) => (
                    header_text(&headers, "From"),
                    header_text(&headers, "Subject"),
                ),
                Err(_) => (String::new(), String::new()),
            };
            MessageSummary::new(from, subject, "")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crlf(s: &str) -> Vec<u8> {
        s.replace('\n', "\r\n").into_bytes()
    }

    #[test]
    fn test_encoded_word_subject() {
        let raw = crlf("From: a@example.com\nSubject: =?UTF-8?B?SGVsbG8=?=\n\nbody\n");
        assert_eq!(decode(&raw).subject, "Hello");
    }

    #[test]
    fn test_subject_mixes_encoded_and_plain_words() {
        let raw = crlf("Subject: Re: =?ISO-8859-1?Q?caf=E9?= au lait\n\nx\n");
        assert_eq!(decode(&raw).subject, "Re: café au lait");
    }

    #[test]
    fn test_missing_headers_decode_to_empty() {
        let raw = crlf("X-Other: 1\n\nhi\n");
        let s = decode(&raw);
        assert_eq!(s.subject, "");
        assert_eq!(s.from, "");
        assert_eq!(s.excerpt.trim_end(), "hi");
    }

    #[test]
    fn test_unparseable_message_yields_empty_summary() {
        let raw = b" leading\r\n\r\nx";
        assert!(mailparse::parse_mail(raw).is_err());

        let s = decode(raw);
        assert_eq!(s.from, "");
        assert_eq!(s.subject, "");
        assert_eq!(s.excerpt, "");
        assert!(!s.truncated);
    }

    #[test]
    fn test_single_part_plain_text() {
        let raw = b"From: Alice <alice@example.com>\r\nSubject: Hi\r\n\r\nhi";
        let s = decode(raw);
        assert_eq!(s.from, "Alice <alice@example.com>");
        assert_eq!(s.excerpt, "hi");
        assert!(!s.truncated);
    }

    #[test]
    fn test_single_part_declared_charset_round_trips() {
        let (latin1, _, _) = encoding_rs::WINDOWS_1252.encode("Grüße, café");
        let mut raw =
            b"Subject: t\r\nContent-Type: text/plain; charset=iso-8859-1\r\n\r\n".to_vec();
        raw.extend_from_slice(&latin1);

        assert_eq!(decode(&raw).excerpt.trim_end(), "Grüße, café");
    }

    #[test]
    fn test_single_part_base64_utf8() {
        let raw = crlf(
            "Subject: t\n\
             Content-Type: text/plain; charset=utf-8\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             w6lsw6hu\n",
        );
        assert_eq!(decode(&raw).excerpt.trim_end(), "élèn");
    }

    #[test]
    fn test_single_part_corrupt_base64_gives_empty_body() {
        let raw = crlf(
            "Subject: Still here\n\
             Content-Type: text/plain\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             !!!not base64!!!\n",
        );
        let s = decode(&raw);
        assert_eq!(s.subject, "Still here");
        assert_eq!(s.excerpt, "");
        assert!(!s.truncated);
    }

    #[test]
    fn test_single_part_invalid_utf8_gives_empty_body() {
        let raw = b"Subject: bytes\r\nContent-Transfer-Encoding: 8bit\r\n\r\n\xff\xfe\xfd";
        assert_eq!(decode(raw).excerpt, "");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "a".repeat(450);
        let raw = format!("Subject: long\r\n\r\n{body}");
        let s = decode(raw.as_bytes());
        assert_eq!(s.excerpt, "a".repeat(200));
        assert!(s.truncated);
    }

    #[test]
    fn test_multipart_prefers_plain_over_html() {
        let raw = crlf(
            "Subject: alt\n\
             Content-Type: multipart/alternative; boundary=\"b1\"\n\
             \n\
             --b1\n\
             Content-Type: text/html; charset=utf-8\n\
             \n\
             <p>html version</p>\n\
             --b1\n\
             Content-Type: text/plain; charset=utf-8\n\
             \n\
             plain version\n\
             --b1--\n",
        );
        assert_eq!(decode(&raw).excerpt.trim_end(), "plain version");
    }

    #[test]
    fn test_multipart_plain_first_stops_the_walk() {
        let raw = crlf(
            "Subject: alt\n\
             Content-Type: multipart/alternative; boundary=\"b1\"\n\
             \n\
             --b1\n\
             Content-Type: text/plain\n\
             \n\
             plain version\n\
             --b1\n\
             Content-Type: text/html\n\
             \n\
             <p>html version</p>\n\
             --b1--\n",
        );
        assert_eq!(decode(&raw).excerpt.trim_end(), "plain version");
    }

    #[test]
    fn test_multipart_skips_plain_attachment() {
        let raw = crlf(
            "Subject: files\n\
             Content-Type: multipart/mixed; boundary=\"xx\"\n\
             \n\
             --xx\n\
             Content-Type: text/plain\n\
             Content-Disposition: attachment; filename=\"notes.txt\"\n\
             \n\
             attached notes\n\
             --xx\n\
             Content-Type: text/plain\n\
             Content-Disposition: inline\n\
             \n\
             the real body\n\
             --xx--\n",
        );
        assert_eq!(decode(&raw).excerpt.trim_end(), "the real body");
    }

    #[test]
    fn test_multipart_without_plain_uses_last_decoded_part() {
        let raw = crlf(
            "Subject: html only\n\
             Content-Type: multipart/mixed; boundary=\"xx\"\n\
             \n\
             --xx\n\
             Content-Type: text/html\n\
             \n\
             <b>first</b>\n\
             --xx\n\
             Content-Type: text/plain\n\
             Content-Disposition: attachment; filename=\"a.txt\"\n\
             \n\
             attachment text\n\
             --xx--\n",
        );
        assert_eq!(decode(&raw).excerpt.trim_end(), "attachment text");
    }

    #[test]
    fn test_multipart_corrupt_part_does_not_stop_walk() {
        let raw = crlf(
            "Subject: mixed bag\n\
             Content-Type: multipart/mixed; boundary=\"xx\"\n\
             \n\
             --xx\n\
             Content-Type: text/html\n\
             \n\
             <i>kept</i>\n\
             --xx\n\
             Content-Type: application/octet-stream\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             !!!!\n\
             --xx\n\
             Content-Type: text/html; charset=x-no-such-charset\n\
             \n\
             unknown charset\n\
             --xx--\n",
        );
        assert_eq!(decode(&raw).excerpt.trim_end(), "<i>kept</i>");
    }

    #[test]
    fn test_undecodable_plain_part_still_ends_the_walk() {
        let raw = crlf(
            "Subject: broken plain\n\
             Content-Type: multipart/mixed; boundary=\"xx\"\n\
             \n\
             --xx\n\
             Content-Type: text/html\n\
             \n\
             <p>before</p>\n\
             --xx\n\
             Content-Type: text/plain\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             !!!!\n\
             --xx\n\
             Content-Type: text/html\n\
             \n\
             <p>after</p>\n\
             --xx--\n",
        );
        assert_eq!(decode(&raw).excerpt.trim_end(), "<p>before</p>");
    }

    #[test]
    fn test_nested_multipart_finds_plain_text() {
        let raw = crlf(
            "Subject: nested\n\
             Content-Type: multipart/mixed; boundary=\"outer\"\n\
             \n\
             --outer\n\
             Content-Type: multipart/alternative; boundary=\"inner\"\n\
             \n\
             --inner\n\
             Content-Type: text/html\n\
             \n\
             <p>hello</p>\n\
             --inner\n\
             Content-Type: text/plain\n\
             \n\
             hello\n\
             --inner--\n\
             \n\
             --outer\n\
             Content-Type: image/png\n\
             Content-Disposition: attachment; filename=\"x.png\"\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             iVBORw0KGgo=\n\
             --outer--\n",
        );
        assert_eq!(decode(&raw).excerpt.trim_end(), "hello");
    }

    #[test]
    fn test_parts_are_in_document_order() {
        let raw = crlf(
            "Content-Type: multipart/mixed; boundary=\"xx\"\n\
             \n\
             --xx\n\
             Content-Type: text/html\n\
             \n\
             a\n\
             --xx\n\
             Content-Type: text/plain\n\
             Content-Disposition: Attachment; filename=\"b.txt\"\n\
             \n\
             b\n\
             --xx--\n",
        );
        let mail = mailparse::parse_mail(&raw).unwrap();
        let parts = parts(&mail);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].content_type, "multipart/mixed");
        assert_eq!(parts[0].text, Err(PartError::Container));
        assert_eq!(parts[1].content_type, "text/html");
        assert_eq!(parts[1].disposition, None);
        assert_eq!(parts[2].disposition.as_deref(), Some("attachment"));
        assert!(parts[2].is_attachment());
        assert!(!parts[2].is_preferred_body());
        assert_eq!(parts[2].payload.trim_ascii_end(), b"b");
    }

    #[test]
    fn test_decode_text_rejects_unknown_charset() {
        assert_eq!(
            decode_text(b"abc", "x-klingon"),
            Err(PartError::UnknownCharset("x-klingon".to_string()))
        );
    }

    #[test]
    fn test_decode_text_rejects_invalid_bytes_for_charset() {
        assert!(matches!(
            decode_text(b"\xc3\x28", "utf-8"),
            Err(PartError::Malformed(_))
        ));
    }
}
