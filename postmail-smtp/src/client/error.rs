//! Error types for the SMTP client.

use std::io;

use postmail_common::traits::transport::TransportError;
use thiserror::Error;

/// Errors that can occur when talking to the relay.
#[derive(Error, Debug)]
pub enum SmtpClientError {
    /// IO error occurred during network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to parse an SMTP response from the server.
    #[error("Failed to parse SMTP response: {0}")]
    ParseError(String),

    /// Connection was closed unexpectedly.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// A command line would have carried a line break onto the wire.
    #[error("Refusing to send command containing a line break: {0:?}")]
    InvalidCommand(String),

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

/// Specialized `Result` type for SMTP client operations.
pub type Result<T> = std::result::Result<T, SmtpClientError>;

impl From<SmtpClientError> for TransportError {
    fn from(err: SmtpClientError) -> Self {
        match err {
            SmtpClientError::Io(err) => Self::Io(err),
            SmtpClientError::ConnectionClosed => Self::Io(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "connection closed by relay",
            )),
            SmtpClientError::ParseError(_)
            | SmtpClientError::InvalidCommand(_)
            | SmtpClientError::Utf8Error(_) => {
                Self::Protocol(err.to_string())
            }
        }
    }
}
