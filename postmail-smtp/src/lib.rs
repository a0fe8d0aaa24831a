//! SMTP implementation of the postmail [`Transport`](postmail_common::traits::transport::Transport).

pub mod client;
mod transport;

pub use transport::{SMTP_PORT, SmtpTransport};
