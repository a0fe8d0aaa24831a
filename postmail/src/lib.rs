//! Outbound mail dispatch over one persistent, authenticated relay connection.
//!
//! [`MailSender`] owns a [`Transport`] and pushes every message through it,
//! reconnecting when a transmission fails (up to the configured retry budget)
//! and refreshing the connection after a fixed number of messages.
//!
//! ```no_run
//! use postmail::{MailSender, SendRequest, SenderConfig};
//! use postmail_smtp::SmtpTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SenderConfig::from_env()?;
//! let transport = SmtpTransport::new(config.helo_name.clone(), config.timeouts.clone());
//! let mut sender = MailSender::new(config, transport).await?;
//!
//! sender
//!     .send(
//!         SendRequest::new("Nightly report", "All jobs finished.")
//!             .receiver(vec!["ops@example.com".to_string(), "dev@example.com".to_string()])
//!             .cc("audit@example.com"),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod recipients;
pub mod sender;

pub use config::{ConfigError, SenderConfig};
pub use error::SendError;
pub use message::{OutboundMessage, Subtype};
pub use postmail_common::traits::transport::{Transport, TransportError};
pub use recipients::{RecipientError, Recipients};
pub use sender::{ConnectionState, MailSender, SendRequest};
