//! The capability a sender needs from the network.
//!
//! A [`Transport`] is a single relay connection handle that can be opened,
//! authenticated, used for any number of transmissions and closed again.
//! Protocol details (handshake, encryption, timeouts) belong to the
//! implementation; callers only see success or a [`TransportError`].

use std::{io, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a transport.
///
/// A sender treats every variant as transient: the connection is discarded
/// and re-established.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The relay could not be reached or refused the session.
    #[error("Connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    /// The relay rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The relay answered a command with an error status.
    #[error("{command} rejected: {code} - {message}")]
    Rejected {
        command: &'static str,
        code: u16,
        message: String,
    },

    /// The relay answered with something that is not valid protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An operation was attempted without an open connection.
    #[error("Not connected")]
    NotConnected,

    /// A step did not complete in time.
    #[error("{step} timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },

    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Returns `true` if the relay itself answered with a permanent (5xx) status.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if *code >= 500)
    }
}

/// Connection handle to a mail relay.
#[async_trait]
pub trait Transport: Send {
    /// Open a connection to `host` (`name` or `name:port`).
    async fn connect(&mut self, host: &str) -> Result<(), TransportError>;

    /// Authenticate the open connection.
    async fn authenticate(&mut self, address: &str, credential: &str)
    -> Result<(), TransportError>;

    /// Submit `message` from `from` to every address in `to`.
    async fn transmit(
        &mut self,
        from: &str,
        to: &[String],
        message: &[u8],
    ) -> Result<(), TransportError>;

    /// Close the connection. Closing an already closed transport is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_rejected_display() {
        let err = TransportError::Rejected {
            command: "RCPT TO",
            code: 550,
            message: "User unknown".to_string(),
        };
        assert_eq!(err.to_string(), "RCPT TO rejected: 550 - User unknown");
        assert!(err.is_permanent());
    }

    #[test]
    fn test_temporary_rejection_is_not_permanent() {
        let err = TransportError::Rejected {
            command: "MAIL FROM",
            code: 451,
            message: "Try again later".to_string(),
        };
        assert!(!err.is_permanent());
        assert!(!TransportError::NotConnected.is_permanent());
    }

    #[test]
    fn test_timeout_display() {
        let err = TransportError::Timeout {
            step: "DATA",
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "DATA timed out after 2s");
    }
}
