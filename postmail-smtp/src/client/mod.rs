//! Minimal SMTP client speaking to a submission relay over plain TCP.
//!
//! The client is command oriented: every method writes one command and reads
//! one (possibly multi-line) response. Interpreting status codes is left to
//! the caller.
//!
//! ```no_run
//! use postmail_smtp::client::{SmtpClient, auth};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("localhost:2525").await?;
//! client.read_greeting().await?;
//! client.ehlo("client.example.com").await?;
//!
//! let mechanism = auth::Mechanism::select(client.auth_mechanisms());
//! auth::authenticate(&mut client, mechanism, "sender@example.com", "secret").await?;
//!
//! client.mail_from("sender@example.com").await?;
//! client.rcpt_to("recipient@example.com").await?;
//! client.data().await?;
//! client.send_data(b"Subject: Test\r\n\r\nHello World").await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
mod error;
mod response;
mod smtp_client;

pub use error::{Result, SmtpClientError};
pub use response::{Class, Response};
pub use smtp_client::SmtpClient;
