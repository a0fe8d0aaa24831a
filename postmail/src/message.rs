//! Construction of the RFC 5322 message handed to a transport.
//!
//! The message is a single text part. The body is always base64 encoded so
//! that any UTF-8 content survives 7-bit relays untouched; headers carrying
//! non-ASCII text or control characters use RFC 2047 encoded words.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Longest run of raw bytes placed in one encoded word. 45 bytes encode to
/// 60 characters, keeping each `=?utf-8?b?...?=` word under 75 characters.
const ENCODED_WORD_BYTES: usize = 45;
const BODY_LINE_LENGTH: usize = 76;

/// The text subtype of the single body part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subtype {
    #[default]
    Plain,
    Html,
}

impl Subtype {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved message, ready to be rendered for the wire.
///
/// `cc` and `bcc` only ever appear as headers here; the envelope is decided
/// by whoever transmits the rendered bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
    pub subtype: Subtype,
    pub sender_name: Option<String>,
    pub sender_address: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl OutboundMessage {
    /// The sender as shown to humans: `name<address>`, or the bare address
    /// when no name is set.
    #[must_use]
    pub fn sender_display(&self) -> String {
        mailbox(self.sender_name.as_deref(), &self.sender_address)
    }

    /// Render the message with the current time and a fresh Message-ID.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.render(Utc::now(), Ulid::new())
    }

    fn render(&self, date: DateTime<Utc>, id: Ulid) -> String {
        let name = self.sender_name.as_deref().map(encode_header_text);
        let from = mailbox(name.as_deref(), &self.sender_address);

        let mut wire = String::with_capacity(self.body.len() * 4 / 3 + 512);
        push_header(&mut wire, "From", &from);
        push_header(&mut wire, "To", &self.to.join(", "));
        push_header(&mut wire, "Cc", &self.cc.join(", "));
        push_header(&mut wire, "Bcc", &self.bcc.join(", "));
        push_header(&mut wire, "Subject", &encode_header_text(&self.subject));
        push_header(&mut wire, "Date", &date.to_rfc2822());
        push_header(&mut wire, "Message-ID", &format!("<{id}@{}>", self.domain()));
        push_header(&mut wire, "MIME-Version", "1.0");
        push_header(
            &mut wire,
            "Content-Type",
            &format!("text/{}; charset=\"utf-8\"", self.subtype),
        );
        push_header(&mut wire, "Content-Transfer-Encoding", "base64");
        wire.push_str("\r\n");

        let encoded = STANDARD.encode(self.body.as_bytes());
        for line in encoded.as_bytes().chunks(BODY_LINE_LENGTH) {
            // base64 output is pure ASCII, so every chunk is valid UTF-8
            wire.push_str(&String::from_utf8_lossy(line));
            wire.push_str("\r\n");
        }

        wire
    }

    fn domain(&self) -> &str {
        self.sender_address
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
            .unwrap_or("localhost")
    }
}

fn mailbox(name: Option<&str>, address: &str) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("{name}<{address}>"),
        _ => address.to_string(),
    }
}

/// Empty values leave the header out entirely.
fn push_header(wire: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }

    wire.push_str(name);
    wire.push_str(": ");
    wire.push_str(value);
    wire.push_str("\r\n");
}

/// Printable ASCII is returned untouched; anything else becomes a folded run
/// of base64 encoded words, split on character boundaries. A line break can
/// never appear raw in the result.
fn encode_header_text(text: &str) -> String {
    if text.is_ascii() && !text.contains(|ch: char| ch.is_ascii_control()) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (index, ch) in text.char_indices() {
        let next = index + ch.len_utf8();
        if next - start > ENCODED_WORD_BYTES {
            words.push(encoded_word(&text[start..end]));
            start = end;
        }
        end = next;
    }
    words.push(encoded_word(&text[start..end]));

    words.join("\r\n ")
}

fn encoded_word(text: &str) -> String {
    format!("=?utf-8?b?{}?=", STANDARD.encode(text.as_bytes()))
}
