//! The connection lifecycle and send-retry state machine.
//!
//! A [`MailSender`] is always in one of two states: connected (an open,
//! authenticated session) or disconnected. Construction connects. A failed
//! transmission or a full connection forces a disconnect followed by a fresh
//! login; nothing is ever terminal.

use postmail_common::{
    internal,
    traits::transport::{Transport, TransportError},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    config::SenderConfig,
    error::SendError,
    message::{OutboundMessage, Subtype},
    recipients::{Recipients, check_address},
};

/// Observable connection bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub open: bool,
    pub authenticated: bool,
    /// Successful sends since the last successful login.
    pub messages_sent_since_connect: usize,
}

/// Everything a caller supplies for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SendRequest {
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub receiver: Recipients,
    #[serde(default)]
    pub cc: Recipients,
    #[serde(default)]
    pub bcc: Recipients,
    #[serde(default)]
    pub subtype: Subtype,
    #[serde(default)]
    pub auth_key: Option<String>,
}

impl SendRequest {
    #[must_use]
    pub fn new(subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn receiver(mut self, receiver: impl Into<Recipients>) -> Self {
        self.receiver = receiver.into();
        self
    }

    #[must_use]
    pub fn cc(mut self, cc: impl Into<Recipients>) -> Self {
        self.cc = cc.into();
        self
    }

    #[must_use]
    pub fn bcc(mut self, bcc: impl Into<Recipients>) -> Self {
        self.bcc = bcc.into();
        self
    }

    #[must_use]
    pub const fn subtype(mut self, subtype: Subtype) -> Self {
        self.subtype = subtype;
        self
    }

    #[must_use]
    pub fn auth_key(mut self, key: impl Into<String>) -> Self {
        self.auth_key = Some(key.into());
        self
    }
}

/// Sends mail through one persistent relay connection.
///
/// The sender owns its transport and is the only thing that opens or closes
/// it. Every method takes `&mut self`, so a single instance serves one caller
/// at a time; share it behind a mutex or an actor if several tasks need it.
pub struct MailSender<T: Transport> {
    config: SenderConfig,
    transport: T,
    state: ConnectionState,
}

impl<T: Transport> MailSender<T> {
    /// Capture `config` and log in through `transport`.
    ///
    /// # Errors
    ///
    /// [`SendError::Connection`] if the relay cannot be reached or rejects
    /// the credentials.
    pub async fn new(config: SenderConfig, transport: T) -> Result<Self, SendError> {
        let mut sender = Self {
            config,
            transport,
            state: ConnectionState::default(),
        };

        if let Err(err) = sender.login().await {
            sender.logout().await;
            return Err(SendError::Connection(err));
        }

        Ok(sender)
    }

    /// Connect to the relay and authenticate. On success the per-connection
    /// message counter starts over.
    ///
    /// # Errors
    ///
    /// The transport's error from whichever step failed. A failed
    /// authentication leaves the connection open but unauthenticated.
    pub async fn login(&mut self) -> Result<(), TransportError> {
        internal!(level = DEBUG, "Connecting to {}", self.config.mail_host);
        self.transport.connect(&self.config.mail_host).await?;
        self.state.open = true;

        self.transport
            .authenticate(&self.config.mail_address, &self.config.password)
            .await?;
        self.state.authenticated = true;
        self.state.messages_sent_since_connect = 0;

        internal!(
            level = INFO,
            "Logged in to {} as {}",
            self.config.mail_host,
            self.config.mail_address
        );
        Ok(())
    }

    /// Close the connection. Failures to close cleanly are logged and
    /// otherwise ignored; the message counter is left alone.
    pub async fn logout(&mut self) {
        if let Err(err) = self.transport.close().await {
            warn!("Failed to close relay connection cleanly: {err}");
        }

        self.state.open = false;
        self.state.authenticated = false;
        internal!(level = DEBUG, "Disconnected from {}", self.config.mail_host);
    }

    /// Send one message.
    ///
    /// Recipients missing from the request fall back to the configured
    /// default receiver. Only the To list is used for transmission; Cc and
    /// Bcc are rendered into the headers.
    ///
    /// # Errors
    ///
    /// - [`SendError::Authorization`] when a secret is configured and the
    ///   request's key does not match it.
    /// - [`SendError::Validation`] when the content is empty.
    /// - [`SendError::Recipient`] when the sender address or any resolved
    ///   recipient holds a line break or an angle bracket.
    /// - [`SendError::Delivery`] when every attempt allowed by the retry
    ///   budget failed.
    ///
    /// The first three are raised before any network activity.
    #[tracing::instrument(skip_all, fields(subject = %request.subject))]
    pub async fn send(&mut self, request: SendRequest) -> Result<(), SendError> {
        self.authorize(request.auth_key.as_deref())?;

        if request.content.is_empty() {
            return Err(SendError::Validation);
        }

        let sender_name = request
            .sender_name
            .filter(|name| !name.is_empty())
            .or_else(|| self.config.sender_name.clone());

        let to = if request.receiver.is_empty() {
            Recipients::from(self.config.default_receiver.clone())
        } else {
            request.receiver
        }
        .normalize();
        let mut cc = request.cc.normalize();
        let bcc = request.bcc.normalize();
        self.apply_auto_cc(&to, &mut cc, &bcc);

        std::iter::once(&self.config.mail_address)
            .chain(&to)
            .chain(&cc)
            .chain(&bcc)
            .try_for_each(|address| check_address(address.as_str()))?;

        debug!(?to, ?cc, ?bcc, "Resolved recipients");

        let message = OutboundMessage {
            subject: request.subject,
            body: request.content,
            subtype: request.subtype,
            sender_name,
            sender_address: self.config.mail_address.clone(),
            to,
            cc,
            bcc,
        };

        internal!(level = DEBUG, "Sending as {}", message.sender_display());
        self.deliver(&message.to, message.to_wire().as_bytes()).await
    }

    #[must_use]
    pub const fn connection_state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &SenderConfig {
        &self.config
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    fn authorize(&self, key: Option<&str>) -> Result<(), SendError> {
        match self.config.secret() {
            Some(secret) if key != Some(secret) => Err(SendError::Authorization),
            _ => Ok(()),
        }
    }

    fn apply_auto_cc(&self, to: &[String], cc: &mut Vec<String>, bcc: &[String]) {
        if !self.config.auto_cc {
            return;
        }

        let Some(default) = self.config.default_receiver.as_ref().filter(|r| !r.is_empty()) else {
            return;
        };

        if !to.contains(default) && !cc.contains(default) && !bcc.contains(default) {
            cc.push(default.clone());
        }
    }

    /// Transmit with reconnect-and-retry, then refresh the connection if it
    /// has carried its quota.
    async fn deliver(&mut self, to: &[String], message: &[u8]) -> Result<(), SendError> {
        let budget = self.config.retry;
        if budget == 0 || self.config.mail_per_connection == 0 {
            warn!(
                retry = budget,
                mail_per_connection = self.config.mail_per_connection,
                "No delivery attempt allowed"
            );
            return Err(SendError::Delivery {
                attempts: 0,
                last_error: None,
            });
        }

        let mut failures = 0;
        loop {
            match self
                .transport
                .transmit(&self.config.mail_address, to, message)
                .await
            {
                Ok(()) => break,
                Err(err) => {
                    failures += 1;
                    warn!(
                        attempt = failures,
                        retry = budget,
                        permanent = err.is_permanent(),
                        "Transmission failed: {err}"
                    );

                    self.reconnect().await;

                    if failures >= budget {
                        return Err(SendError::Delivery {
                            attempts: failures,
                            last_error: Some(err),
                        });
                    }
                }
            }
        }

        self.state.messages_sent_since_connect += 1;
        internal!(
            "Sent message {} on this connection",
            self.state.messages_sent_since_connect
        );

        let cap = usize::try_from(self.config.mail_per_connection).unwrap_or(usize::MAX);
        if self.state.messages_sent_since_connect >= cap {
            internal!(
                level = DEBUG,
                "Connection carried {} messages, refreshing",
                self.state.messages_sent_since_connect
            );
            self.reconnect().await;
        }

        Ok(())
    }

    /// Log out and back in. A failed login is logged; the next transmission
    /// on the dead connection surfaces it.
    async fn reconnect(&mut self) {
        self.logout().await;

        if let Err(err) = self.login().await {
            warn!("Reconnect to {} failed: {err}", self.config.mail_host);
        }
    }
}
