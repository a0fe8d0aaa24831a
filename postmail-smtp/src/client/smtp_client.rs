//! Command-level SMTP client over a plain TCP stream.

use postmail_common::{incoming, outgoing};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use super::{
    error::{Result, SmtpClientError},
    response::Response,
};

const INITIAL_BUFFER: usize = 4096;
/// Replies larger than this are treated as a protocol violation.
const MAX_BUFFER: usize = 256 * 1024;

/// One TCP session with a relay.
///
/// Every command method writes one line and waits for the complete reply.
/// Reply codes are not interpreted here.
///
/// # Errors
///
/// All methods fail with [`SmtpClientError`] on socket errors, on EOF before
/// a complete reply, or on a reply that does not parse.
pub struct SmtpClient {
    stream: TcpStream,
    buffer: Vec<u8>,
    filled: usize,
    extensions: Vec<String>,
}

#[allow(clippy::missing_errors_doc)]
impl SmtpClient {
    /// Open a TCP connection to `addr` (`host:port`). The greeting is not read.
    pub async fn connect(addr: &str) -> Result<Self> {
        Ok(Self {
            stream: TcpStream::connect(addr).await?,
            buffer: vec![0; INITIAL_BUFFER],
            filled: 0,
            extensions: Vec::new(),
        })
    }

    pub async fn read_greeting(&mut self) -> Result<Response> {
        self.read_response().await
    }

    pub async fn command(&mut self, line: &str) -> Result<Response> {
        outgoing!("{line}");
        self.write_line(line).await?;
        self.read_response().await
    }

    /// [`Self::command`] for lines carrying credentials; the line itself is
    /// never logged.
    pub async fn secret_command(&mut self, line: &str) -> Result<Response> {
        outgoing!("<credentials>");
        self.write_line(line).await?;
        self.read_response().await
    }

    /// EHLO. A positive reply replaces the recorded extension list.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        let response = self.command(&format!("EHLO {domain}")).await?;
        if response.is_success() {
            self.extensions = response.lines.iter().skip(1).cloned().collect();
        }
        Ok(response)
    }

    /// HELO. Clears the extension list, HELO relays advertise nothing.
    pub async fn helo(&mut self, domain: &str) -> Result<Response> {
        self.extensions.clear();
        self.command(&format!("HELO {domain}")).await
    }

    /// Extension lines from the last positive EHLO, greeting line excluded.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// SASL mechanisms from the `AUTH` extension, uppercased. The obsolete
    /// `AUTH=` spelling is understood too.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<String> {
        let mut mechanisms = Vec::new();
        for extension in &self.extensions {
            let upper = extension.to_ascii_uppercase();
            if let Some(list) = upper.strip_prefix("AUTH ").or_else(|| upper.strip_prefix("AUTH=")) {
                mechanisms.extend(list.split_whitespace().map(str::to_string));
            }
        }
        mechanisms
    }

    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await
    }

    /// Write the message after a 354, dot-stuffed and terminated with
    /// `<CRLF>.<CRLF>`, and read the final reply.
    pub async fn send_data(&mut self, data: &[u8]) -> Result<Response> {
        let mut payload = dot_stuff(data);
        if payload.ends_with(b"\n") && !payload.ends_with(b"\r\n") {
            payload.pop();
        }
        if !payload.ends_with(b"\r\n") {
            payload.extend_from_slice(b"\r\n");
        }
        payload.extend_from_slice(b".\r\n");

        outgoing!("<{} bytes of message data>", data.len());
        self.stream.write_all(&payload).await?;

        self.read_response().await
    }

    pub async fn quit(&mut self) -> Result<Response> {
        self.command("QUIT").await
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let line = single_line(line)?;
        self.stream.write_all(format!("{line}\r\n").as_bytes()).await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Response> {
        loop {
            if let Some((response, used)) = Response::parse_response(&self.buffer[..self.filled])? {
                self.buffer.copy_within(used..self.filled, 0);
                self.filled -= used;

                incoming!("{} {}", response.code, response.message());
                return Ok(response);
            }

            if self.filled == self.buffer.len() {
                if self.buffer.len() >= MAX_BUFFER {
                    return Err(SmtpClientError::ParseError(format!(
                        "reply exceeds {MAX_BUFFER} bytes"
                    )));
                }
                self.buffer.resize(self.buffer.len() * 2, 0);
            }

            match self.stream.read(&mut self.buffer[self.filled..]).await? {
                0 => return Err(SmtpClientError::ConnectionClosed),
                read => self.filled += read,
            }
        }
    }
}

/// Doubles every `.` that starts a line (RFC 5321 section 4.5.2).
fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut stuffed = Vec::with_capacity(data.len() + 16);
    let mut at_line_start = true;

    for &byte in data {
        if at_line_start && byte == b'.' {
            stuffed.push(b'.');
        }
        stuffed.push(byte);
        at_line_start = byte == b'\n';
    }

    stuffed
}

/// A command is exactly one line; the terminator is added by the writer.
fn single_line(line: &str) -> Result<&str> {
    if line.contains(['\r', '\n']) {
        return Err(SmtpClientError::InvalidCommand(line.to_string()));
    }

    Ok(line)
}
