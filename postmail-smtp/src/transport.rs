use std::{future::Future, time::Duration};

use async_trait::async_trait;
use postmail_common::{
    config::ClientTimeouts,
    internal,
    traits::transport::{Transport, TransportError},
};

use crate::client::{self, Response, SmtpClient, auth};

/// Port used when the configured host does not name one.
pub const SMTP_PORT: u16 = 25;

/// A [`Transport`] that submits mail to an SMTP relay over plain TCP.
///
/// At most one connection is open at a time. `connect` discards any previous
/// connection without a QUIT; callers that care close first.
pub struct SmtpTransport {
    client: Option<SmtpClient>,
    helo_domain: String,
    timeouts: ClientTimeouts,
}

impl SmtpTransport {
    /// `helo_domain` is the name announced in EHLO/HELO.
    #[must_use]
    pub fn new(helo_domain: impl Into<String>, timeouts: ClientTimeouts) -> Self {
        Self {
            client: None,
            helo_domain: helo_domain.into(),
            timeouts,
        }
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn client(&mut self) -> Result<&mut SmtpClient, TransportError> {
        self.client.as_mut().ok_or(TransportError::NotConnected)
    }
}

/// Appends [`SMTP_PORT`] unless `host` already carries a port.
fn with_default_port(host: &str) -> String {
    let has_port = host.rsplit_once(':').is_some_and(|(name, port)| {
        !port.is_empty()
            && port.bytes().all(|b| b.is_ascii_digit())
            && (!name.contains(':') || name.ends_with(']'))
    });

    if has_port {
        host.to_string()
    } else if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{SMTP_PORT}")
    } else {
        format!("{host}:{SMTP_PORT}")
    }
}

async fn within<T>(
    step: &'static str,
    after: Duration,
    fut: impl Future<Output = client::Result<T>>,
) -> Result<T, TransportError> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| TransportError::Timeout { step, after })?
        .map_err(TransportError::from)
}

fn expect(
    command: &'static str,
    response: &Response,
    accept: fn(&Response) -> bool,
) -> Result<(), TransportError> {
    if accept(response) {
        Ok(())
    } else {
        Err(TransportError::Rejected {
            command,
            code: response.code,
            message: response.message(),
        })
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn connect(&mut self, host: &str) -> Result<(), TransportError> {
        self.client = None;
        let address = with_default_port(host);
        let timeouts = &self.timeouts;

        let mut client = tokio::time::timeout(timeouts.connect(), SmtpClient::connect(&address))
            .await
            .map_err(|_| TransportError::Timeout {
                step: "connect",
                after: timeouts.connect(),
            })?
            .map_err(|err| TransportError::Connect {
                host: address.clone(),
                reason: err.to_string(),
            })?;

        let greeting = within("greeting", timeouts.connect(), client.read_greeting()).await?;
        if !greeting.is_success() {
            return Err(TransportError::Connect {
                host: address,
                reason: format!("greeting {} {}", greeting.code, greeting.message()),
            });
        }

        let ehlo = within("EHLO", timeouts.command(), client.ehlo(&self.helo_domain)).await?;
        if !ehlo.is_success() {
            internal!(
                level = DEBUG,
                "EHLO rejected with {}, falling back to HELO",
                ehlo.code
            );
            let helo = within("HELO", timeouts.command(), client.helo(&self.helo_domain)).await?;
            expect("HELO", &helo, Response::is_success)?;
        }

        internal!(level = DEBUG, "Connected to {address}");
        self.client = Some(client);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, credential))]
    async fn authenticate(
        &mut self,
        address: &str,
        credential: &str,
    ) -> Result<(), TransportError> {
        let after = self.timeouts.command();
        let client = self.client()?;
        let mechanism = auth::Mechanism::select(client.auth_mechanisms());

        let response = within(
            "AUTH",
            after,
            auth::authenticate(client, mechanism, address, credential),
        )
        .await?;

        if response.code == 235 {
            internal!(level = DEBUG, "Authenticated as {address} using {mechanism}");
            Ok(())
        } else {
            Err(TransportError::Authentication(format!(
                "AUTH {mechanism}: {} {}",
                response.code,
                response.message()
            )))
        }
    }

    #[tracing::instrument(level = "debug", skip(self, message), fields(size = message.len()))]
    async fn transmit(
        &mut self,
        from: &str,
        to: &[String],
        message: &[u8],
    ) -> Result<(), TransportError> {
        if to.is_empty() {
            return Err(TransportError::Protocol("no recipients".to_string()));
        }

        let envelope = self.timeouts.envelope();
        let data = self.timeouts.data();
        let client = self.client()?;

        let response = within("MAIL FROM", envelope, client.mail_from(from)).await?;
        expect("MAIL FROM", &response, Response::is_success)?;

        for recipient in to {
            let response = within("RCPT TO", envelope, client.rcpt_to(recipient)).await?;
            expect("RCPT TO", &response, Response::is_success)?;
        }

        let response = within("DATA", data, client.data()).await?;
        expect("DATA", &response, Response::is_intermediate)?;

        let response = within("DATA", data, client.send_data(message)).await?;
        expect("DATA", &response, Response::is_success)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };

        within("QUIT", self.timeouts.quit(), client.quit())
            .await
            .map(|_| ())
    }
}
