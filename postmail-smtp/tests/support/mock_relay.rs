//! In-process SMTP relay for exercising the transport.
//!
//! The relay speaks just enough ESMTP for a submission client: greeting,
//! EHLO/HELO, AUTH PLAIN and AUTH LOGIN against one account, MAIL/RCPT/DATA
//! and QUIT. Every command it sees is recorded for assertions.
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use base64::{Engine, engine::general_purpose::STANDARD};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    sync::Mutex,
    task::JoinHandle,
};

/// Command observed by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    Ehlo(String),
    Helo(String),
    /// AUTH with the mechanism name and whether the credentials matched.
    Auth(String, bool),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Message content with dot-stuffing removed and without the final dot.
    Message(Vec<u8>),
    Quit,
    Other(String),
}

#[derive(Clone)]
struct RelayConfig {
    greeting: (u16, String),
    ehlo_enabled: bool,
    auth_mechanisms: Vec<String>,
    username: String,
    password: String,
    rejected_recipients: Vec<String>,
    data_end: (u16, String),
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            greeting: (220, "mock.relay ESMTP ready".to_string()),
            ehlo_enabled: true,
            auth_mechanisms: vec!["PLAIN".to_string(), "LOGIN".to_string()],
            username: "sender@example.com".to_string(),
            password: "hunter2".to_string(),
            rejected_recipients: Vec::new(),
            data_end: (250, "OK: queued".to_string()),
        }
    }
}

pub struct MockRelay {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<RelayCommand>>>,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockRelay {
    #[must_use]
    pub fn builder() -> MockRelayBuilder {
        MockRelayBuilder {
            config: RelayConfig::default(),
        }
    }

    /// `host:port` to hand to the transport.
    #[must_use]
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub async fn commands(&self) -> Vec<RelayCommand> {
        self.commands.lock().await.clone()
    }

    /// Messages received so far, in order.
    pub async fn messages(&self) -> Vec<Vec<u8>> {
        self.commands
            .lock()
            .await
            .iter()
            .filter_map(|command| match command {
                RelayCommand::Message(content) => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct MockRelayBuilder {
    config: RelayConfig,
}

impl MockRelayBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = (code, message.into());
        self
    }

    /// Answer EHLO with 502 so clients must fall back to HELO.
    #[must_use]
    pub const fn without_ehlo(mut self) -> Self {
        self.config.ehlo_enabled = false;
        self
    }

    #[must_use]
    pub fn with_auth_mechanisms(mut self, mechanisms: &[&str]) -> Self {
        self.config.auth_mechanisms = mechanisms.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    #[must_use]
    pub fn rejecting_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.config.rejected_recipients.push(recipient.into());
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end = (code, message.into());
        self
    }

    /// Bind to an ephemeral port and start accepting connections.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::unwrap_used)]
    pub async fn start(self) -> MockRelay {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = Arc::new(self.config);
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let handle = {
            let commands = Arc::clone(&commands);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands);
                    tokio::spawn(async move {
                        let _ = handle_client(stream, config, commands).await;
                    });
                }
            })
        };

        MockRelay {
            addr,
            commands,
            connections,
            handle,
        }
    }
}

async fn reply(writer: &mut OwnedWriteHalf, code: u16, message: &str) -> std::io::Result<()> {
    writer
        .write_all(format!("{code} {message}\r\n").as_bytes())
        .await?;
    writer.flush().await
}

fn angle_address(argument: &str) -> String {
    argument
        .split_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .map(|(address, _)| address.to_string())
        .unwrap_or_default()
}

fn decode(line: &str) -> String {
    STANDARD
        .decode(line.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

#[allow(clippy::too_many_lines)]
async fn handle_client(
    stream: TcpStream,
    config: Arc<RelayConfig>,
    commands: Arc<Mutex<Vec<RelayCommand>>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reply(&mut writer, config.greeting.0, &config.greeting.1).await?;
    if config.greeting.0 != 220 {
        return Ok(());
    }

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        let command_line = line.trim_end().to_string();
        let (verb, argument) = command_line
            .split_once(' ')
            .unwrap_or((command_line.as_str(), ""));

        match verb.to_ascii_uppercase().as_str() {
            "EHLO" => {
                commands
                    .lock()
                    .await
                    .push(RelayCommand::Ehlo(argument.to_string()));
                if !config.ehlo_enabled {
                    reply(&mut writer, 502, "Command not implemented").await?;
                    continue;
                }

                let mut response = String::from("250-mock.relay\r\n");
                if !config.auth_mechanisms.is_empty() {
                    response.push_str(&format!(
                        "250-AUTH {}\r\n",
                        config.auth_mechanisms.join(" ")
                    ));
                }
                response.push_str("250 8BITMIME\r\n");
                writer.write_all(response.as_bytes()).await?;
                writer.flush().await?;
            }
            "HELO" => {
                commands
                    .lock()
                    .await
                    .push(RelayCommand::Helo(argument.to_string()));
                reply(&mut writer, 250, "mock.relay").await?;
            }
            "AUTH" => {
                let (mechanism, initial) = argument.split_once(' ').unwrap_or((argument, ""));
                let mechanism = mechanism.to_ascii_uppercase();

                let accepted = match mechanism.as_str() {
                    "PLAIN" => {
                        let expected =
                            format!("\0{}\0{}", config.username, config.password);
                        decode(initial) == expected
                    }
                    "LOGIN" => {
                        reply(&mut writer, 334, "VXNlcm5hbWU6").await?;
                        line.clear();
                        reader.read_line(&mut line).await?;
                        let username = decode(&line);

                        reply(&mut writer, 334, "UGFzc3dvcmQ6").await?;
                        line.clear();
                        reader.read_line(&mut line).await?;
                        let password = decode(&line);

                        username == config.username && password == config.password
                    }
                    _ => false,
                };

                commands
                    .lock()
                    .await
                    .push(RelayCommand::Auth(mechanism, accepted));
                if accepted {
                    reply(&mut writer, 235, "Authentication successful").await?;
                } else {
                    reply(&mut writer, 535, "Authentication credentials invalid").await?;
                }
            }
            "MAIL" => {
                commands
                    .lock()
                    .await
                    .push(RelayCommand::MailFrom(angle_address(argument)));
                reply(&mut writer, 250, "OK").await?;
            }
            "RCPT" => {
                let recipient = angle_address(argument);
                let rejected = config.rejected_recipients.contains(&recipient);
                commands.lock().await.push(RelayCommand::RcptTo(recipient));
                if rejected {
                    reply(&mut writer, 550, "User unknown").await?;
                } else {
                    reply(&mut writer, 250, "OK").await?;
                }
            }
            "DATA" => {
                commands.lock().await.push(RelayCommand::Data);
                reply(&mut writer, 354, "End data with <CR><LF>.<CR><LF>").await?;

                let mut content = Vec::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line == ".\r\n" {
                        break;
                    }
                    let unstuffed = line.strip_prefix('.').unwrap_or(&line);
                    content.extend_from_slice(unstuffed.as_bytes());
                }

                commands.lock().await.push(RelayCommand::Message(content));
                reply(&mut writer, config.data_end.0, &config.data_end.1).await?;
            }
            "QUIT" => {
                commands.lock().await.push(RelayCommand::Quit);
                reply(&mut writer, 221, "Bye").await?;
                return Ok(());
            }
            _ => {
                commands
                    .lock()
                    .await
                    .push(RelayCommand::Other(command_line.clone()));
                reply(&mut writer, 500, "Unknown command").await?;
            }
        }
    }
}
