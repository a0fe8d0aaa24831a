//! SMTP AUTH (RFC 4954) with the PLAIN and LOGIN mechanisms.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};

use super::{Response, Result, SmtpClient};

/// SASL mechanisms the client can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Plain,
    Login,
}

impl Mechanism {
    /// Picks a mechanism from the relay's advertised list.
    ///
    /// PLAIN is preferred and is also used when the relay advertises nothing,
    /// LOGIN only when it is the sole supported option.
    #[must_use]
    pub fn select(advertised: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let mut login = false;
        for mechanism in advertised {
            match mechanism.as_ref() {
                m if m.eq_ignore_ascii_case("PLAIN") => return Self::Plain,
                m if m.eq_ignore_ascii_case("LOGIN") => login = true,
                _ => {}
            }
        }

        if login { Self::Login } else { Self::Plain }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        })
    }
}

/// Runs the AUTH exchange and returns the relay's final response.
///
/// Success is a 235 response; anything else is returned as-is for the caller
/// to interpret.
///
/// # Errors
///
/// Returns an error if the connection fails mid-exchange.
pub async fn authenticate(
    client: &mut SmtpClient,
    mechanism: Mechanism,
    username: &str,
    password: &str,
) -> Result<Response> {
    match mechanism {
        Mechanism::Plain => {
            let token = STANDARD.encode(format!("\0{username}\0{password}"));
            client.secret_command(&format!("AUTH PLAIN {token}")).await
        }
        Mechanism::Login => {
            let challenge = client.command("AUTH LOGIN").await?;
            if !challenge.is_intermediate() {
                return Ok(challenge);
            }

            let challenge = client.secret_command(&STANDARD.encode(username)).await?;
            if !challenge.is_intermediate() {
                return Ok(challenge);
            }

            client.secret_command(&STANDARD.encode(password)).await
        }
    }
}
