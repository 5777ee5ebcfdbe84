//! HTML message construction.
//!
//! Builds the RFC 5322 text submitted in the DATA phase. The subject is
//! always carried as RFC 2047 base64 encoded-words so any Unicode survives
//! 7-bit header handling; [`decode_encoded_words`] is the inverse.

use crate::error::{Error, Result};
use crate::types::{Address, Mailbox};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Longest run of UTF-8 bytes put in one encoded-word.
///
/// 45 bytes encode to 60 base64 characters, which with the 12 characters of
/// `=?UTF-8?B?` and `?=` stays under the 75-octet limit of RFC 2047.
const MAX_WORD_BYTES: usize = 45;

/// A single-recipient HTML message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlMessage {
    /// Sender mailbox, written to the `From` header.
    pub from: Mailbox,
    /// Recipient, written to the `To` header.
    pub to: Address,
    /// Subject line (any Unicode).
    pub subject: String,
    /// HTML body.
    pub html: String,
}

impl HtmlMessage {
    /// Creates a new message.
    #[must_use]
    pub fn new(
        from: Mailbox,
        to: Address,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to,
            subject: subject.into(),
            html: html.into(),
        }
    }

    /// Renders headers, blank line and body.
    ///
    /// The DATA terminator is not included; the client appends it.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let headers = [
            ("Subject", encode_subject(&self.subject)),
            ("From", format_mailbox(&self.from)),
            ("To", self.to.to_string()),
            ("MIME-Version", "1.0".to_string()),
            ("Content-Type", "text/html; charset=\"utf-8\"".to_string()),
            ("Content-Transfer-Encoding", "8bit".to_string()),
        ];

        let mut out = Vec::with_capacity(self.html.len() + 512);
        for (name, value) in headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.html.as_bytes());
        out
    }
}

/// Encodes a subject as one or more `=?UTF-8?B?...?=` words.
///
/// Long subjects are split on character boundaries and folded with CRLF SP.
#[must_use]
pub fn encode_subject(subject: &str) -> String {
    if subject.is_empty() {
        return String::new();
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (idx, ch) in subject.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > MAX_WORD_BYTES && end > start {
            words.push(encode_word(&subject[start..end]));
            start = end;
        }
        end = next;
    }
    words.push(encode_word(&subject[start..end]));

    words.join("\r\n ")
}

fn encode_word(text: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
}

/// Formats a mailbox for an address header.
///
/// ASCII names are quoted; others are written as an encoded-word.
#[must_use]
pub fn format_mailbox(mailbox: &Mailbox) -> String {
    match mailbox.name.as_deref() {
        None => mailbox.address.to_string(),
        Some(name) if name.is_ascii() && !name.chars().any(|c| c.is_ascii_control()) => {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\" <{}>", mailbox.address)
        }
        Some(name) => format!("{} <{}>", encode_subject(name).replace("\r\n ", " "), mailbox.address),
    }
}

/// Decodes a header value made of RFC 2047 encoded-words.
///
/// Folding is removed, whitespace between adjacent encoded-words is dropped,
/// and plain tokens are kept as they are. Only UTF-8 (and its US-ASCII
/// subset) is accepted as a charset.
///
/// # Errors
///
/// Returns an error if an encoded-word is malformed or does not decode to
/// valid UTF-8.
pub fn decode_encoded_words(value: &str) -> Result<String> {
    let mut out = String::new();
    let mut pending: Vec<u8> = Vec::new();
    // `Some(true)` after an encoded-word, `Some(false)` after plain text.
    let mut previous: Option<bool> = None;

    for token in value.split_whitespace() {
        if let Some(bytes) = decode_word(token)? {
            if previous == Some(false) {
                out.push(' ');
            }
            pending.extend(bytes);
            previous = Some(true);
        } else {
            flush_pending(&mut out, &mut pending)?;
            if previous.is_some() {
                out.push(' ');
            }
            out.push_str(token);
            previous = Some(false);
        }
    }
    flush_pending(&mut out, &mut pending)?;

    Ok(out)
}

fn flush_pending(out: &mut String, pending: &mut Vec<u8>) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let text = String::from_utf8(std::mem::take(pending))
        .map_err(|e| Error::Protocol(format!("Encoded-word is not UTF-8: {e}")))?;
    out.push_str(&text);
    Ok(())
}

/// Returns `None` for tokens that are not encoded-words.
fn decode_word(token: &str) -> Result<Option<Vec<u8>>> {
    let Some(inner) = token
        .strip_prefix("=?")
        .and_then(|t| t.strip_suffix("?="))
    else {
        return Ok(None);
    };

    let mut parts = inner.splitn(3, '?');
    let (Some(charset), Some(encoding), Some(text)) = (parts.next(), parts.next(), parts.next())
    else {
        return Ok(None);
    };

    if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("us-ascii") {
        return Err(Error::Protocol(format!("Unsupported charset: {charset}")));
    }

    match encoding {
        "B" | "b" => STANDARD
            .decode(text)
            .map(Some)
            .map_err(|e| Error::Protocol(format!("Invalid base64 in encoded-word: {e}"))),
        "Q" | "q" => decode_q(text).map(Some),
        other => Err(Error::Protocol(format!("Unknown encoding: {other}"))),
    }
}

fn decode_q(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = text
                    .get(i + 1..i + 3)
                    .ok_or_else(|| Error::Protocol("Incomplete escape sequence".into()))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|e| Error::Protocol(format!("Invalid hex: {e}")))?;
                out.push(byte);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn message(subject: &str) -> HtmlMessage {
        HtmlMessage::new(
            Mailbox::with_name("Help Desk", "support@example.com").unwrap(),
            Address::new("customer@example.org").unwrap(),
            subject,
            "<p>Hello</p>",
        )
    }

    #[test]
    fn renders_header_block() {
        let text = String::from_utf8(message("Ticket #42").to_bytes()).unwrap();
        assert_eq!(
            text,
            "Subject: =?UTF-8?B?VGlja2V0ICM0Mg==?=\r\n\
             From: \"Help Desk\" <support@example.com>\r\n\
             To: customer@example.org\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/html; charset=\"utf-8\"\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             \r\n\
             <p>Hello</p>"
        );
    }

    #[test]
    fn subject_with_crlf_cannot_inject_headers() {
        let bytes = message("Hi\r\nBcc: evil@example.com").to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("Bcc:"));
    }

    #[test]
    fn non_ascii_subject_round_trips() {
        let subject = "Rechnung für Müller – 請求書 🚀";
        let encoded = encode_subject(subject);
        assert!(encoded.is_ascii());
        assert_eq!(decode_encoded_words(&encoded).unwrap(), subject);
    }

    #[test]
    fn long_subject_is_folded_into_short_words() {
        let subject = "é".repeat(100);
        let encoded = encode_subject(&subject);
        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|w| w.len() <= 75));
        assert_eq!(decode_encoded_words(&encoded).unwrap(), subject);
    }

    #[test]
    fn empty_subject() {
        assert_eq!(encode_subject(""), "");
        assert_eq!(decode_encoded_words("").unwrap(), "");
    }

    #[test]
    fn decodes_q_encoding_and_plain_tokens() {
        assert_eq!(
            decode_encoded_words("Re: =?utf-8?Q?H=C3=A9llo_there?=").unwrap(),
            "Re: Héllo there"
        );
    }

    #[test]
    fn rejects_foreign_charset() {
        assert!(decode_encoded_words("=?iso-8859-1?Q?caf=E9?=").is_err());
    }

    #[test]
    fn non_ascii_display_name_is_encoded() {
        let mailbox = Mailbox::with_name("Zoë", "zoe@example.com").unwrap();
        assert_eq!(format_mailbox(&mailbox), "=?UTF-8?B?Wm/Dqw==?= <zoe@example.com>");
    }

    #[test]
    fn quoted_display_name_is_escaped() {
        let mailbox = Mailbox::with_name("The \"Best\" Team", "team@example.com").unwrap();
        assert_eq!(
            format_mailbox(&mailbox),
            "\"The \\\"Best\\\" Team\" <team@example.com>"
        );
    }

    #[test]
    fn spacing_between_plain_and_encoded_tokens() {
        assert_eq!(
            decode_encoded_words("=?UTF-8?B?SMOp?= world =?UTF-8?B?IQ==?=").unwrap(),
            "Hé world !"
        );
        assert_eq!(
            decode_encoded_words("=?UTF-8?Q?a?=   =?UTF-8?Q?b?= c").unwrap(),
            "ab c"
        );
    }

    proptest! {
        #[test]
        fn subject_round_trip(subject in "\\PC{0,120}") {
            let encoded = encode_subject(&subject);
            prop_assert!(encoded.is_ascii());
            prop_assert_eq!(decode_encoded_words(&encoded).unwrap(), subject);
        }

        #[test]
        fn mixed_plain_and_encoded_tokens(
            parts in prop::collection::vec(
                prop_oneof![
                    "[A-Za-z0-9:,.!#]{1,10}".prop_map(|t| (false, t)),
                    "\\PC{1,20}".prop_map(|t| (true, t)),
                ],
                1..6,
            )
        ) {
            let mut header = Vec::new();
            let mut expected = String::new();
            let mut previous_encoded = None;
            for (encoded, text) in &parts {
                if previous_encoded.is_some() && !(previous_encoded == Some(true) && *encoded) {
                    expected.push(' ');
                }
                expected.push_str(text);
                header.push(if *encoded { encode_subject(text) } else { text.clone() });
                previous_encoded = Some(*encoded);
            }
            prop_assert_eq!(decode_encoded_words(&header.join(" ")).unwrap(), expected);
        }
    }
}
