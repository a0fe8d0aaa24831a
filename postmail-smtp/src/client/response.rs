//! Relay replies.

use super::error::{Result, SmtpClientError};

/// First digit of a reply code (RFC 5321 section 4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Positive,
    Intermediate,
    Transient,
    Permanent,
    Unknown,
}

/// A complete reply. Multi-line replies keep one entry per line, code and
/// separator stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    #[must_use]
    pub const fn class(&self) -> Class {
        match self.code / 100 {
            2 => Class::Positive,
            3 => Class::Intermediate,
            4 => Class::Transient,
            5 => Class::Permanent,
            _ => Class::Unknown,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.class() == Class::Positive
    }

    /// The relay wants more input: DATA content or an AUTH continuation.
    #[must_use]
    pub fn is_intermediate(&self) -> bool {
        self.class() == Class::Intermediate
    }

    /// Take one reply off the front of `buffer`.
    ///
    /// `Ok(None)` means the final line has not arrived yet. On success the
    /// number of bytes the reply occupied is returned alongside it.
    ///
    /// # Errors
    ///
    /// [`SmtpClientError::ParseError`] for malformed lines or a code that
    /// changes partway through a multi-line reply, and
    /// [`SmtpClientError::Utf8Error`] when a complete line is not UTF-8.
    pub fn parse_response(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        // A multibyte character may be split across reads; only whole lines
        // are decoded.
        let complete = buffer.iter().rposition(|&b| b == b'\n').map_or(0, |end| end + 1);
        let text = std::str::from_utf8(&buffer[..complete])?;
        let mut reply: Option<Self> = None;
        let mut consumed = 0;

        for raw in text.split_inclusive('\n') {
            if !raw.ends_with('\n') {
                break;
            }
            consumed += raw.len();

            let line = raw.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }

            let (code, last, message) = split_line(line)?;
            let current = reply.get_or_insert_with(|| Self::new(code, Vec::new()));
            if current.code != code {
                return Err(SmtpClientError::ParseError(format!(
                    "reply code changed from {} to {code} mid-reply",
                    current.code
                )));
            }
            current.lines.push(message.to_string());

            if last {
                return Ok(reply.take().map(|reply| (reply, consumed)));
            }
        }

        Ok(None)
    }
}

/// `250-text`, `250 text` or a bare `250`.
fn split_line(line: &str) -> Result<(u16, bool, &str)> {
    let malformed = || SmtpClientError::ParseError(format!("malformed reply line '{line}'"));

    let code = line
        .get(..3)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(malformed)?;

    match line.as_bytes().get(3) {
        None => Ok((code, true, "")),
        Some(b' ') => Ok((code, true, &line[4..])),
        Some(b'-') => Ok((code, false, &line[4..])),
        Some(_) => Err(malformed()),
    }
}
