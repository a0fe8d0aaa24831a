//! Errors surfaced by [`MailSender`](crate::MailSender).

use postmail_common::traits::transport::TransportError;
use thiserror::Error;

use crate::recipients::RecipientError;

#[derive(Debug, Error)]
pub enum SendError {
    /// A shared secret is configured and the caller's key did not match it.
    #[error("Invalid key")]
    Authorization,

    /// The message content was empty.
    #[error("Empty Content")]
    Validation,

    /// A recipient argument had an unsupported shape, or an address could
    /// not be carried on a protocol line.
    #[error(transparent)]
    Recipient(#[from] RecipientError),

    /// Every attempt in the retry budget failed. `attempts` is zero when the
    /// budget or per-connection cap leaves no room for an attempt at all.
    #[error("Mail sending failed.")]
    Delivery {
        attempts: u32,
        #[source]
        last_error: Option<TransportError>,
    },

    /// The relay session could not be established while constructing the
    /// sender.
    #[error("Unable to establish relay session: {0}")]
    Connection(#[source] TransportError),
}

impl SendError {
    /// Returns `true` if the caller can fix the error by changing the
    /// request; nothing was transmitted and the connection is untouched.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Authorization | Self::Validation | Self::Recipient(_)
        )
    }
}
