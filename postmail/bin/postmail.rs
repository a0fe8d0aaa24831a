#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use postmail::{MailSender, SendRequest, SenderConfig, Subtype};
use postmail_common::logging;
use postmail_smtp::SmtpTransport;

const CONFIG_VAR: &str = "POSTMAIL_CONFIG";

/// Send mail through an authenticated SMTP relay.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// RON configuration file. Without one, `POSTMAIL_CONFIG` and the default
    /// locations are searched, then the environment is used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a single message.
    Send(SendArgs),
    /// Log in to the relay, report, and log out.
    Check,
}

#[derive(Args)]
struct SendArgs {
    #[arg(long, default_value = "")]
    subject: String,

    #[arg(long, conflicts_with = "content_file", required_unless_present = "content_file")]
    content: Option<String>,

    /// Read the content from a file instead.
    #[arg(long)]
    content_file: Option<PathBuf>,

    #[arg(long)]
    sender_name: Option<String>,

    /// Defaults to the configured default receiver.
    #[arg(long)]
    to: Vec<String>,

    #[arg(long)]
    cc: Vec<String>,

    #[arg(long)]
    bcc: Vec<String>,

    /// Send the content as text/html.
    #[arg(long)]
    html: bool,

    /// Shared secret, when the configuration requires one.
    #[arg(long)]
    key: Option<String>,
}

impl SendArgs {
    async fn into_request(self) -> anyhow::Result<SendRequest> {
        let content = match (self.content, self.content_file) {
            (Some(content), _) => content,
            (None, Some(path)) => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read content from {}", path.display()))?,
            (None, None) => String::new(),
        };

        let mut request = SendRequest::new(self.subject, content)
            .receiver(self.to)
            .cc(self.cc)
            .bcc(self.bcc)
            .subtype(if self.html { Subtype::Html } else { Subtype::Plain });
        if let Some(name) = self.sender_name {
            request = request.sender_name(name);
        }
        if let Some(key) = self.key {
            request = request.auth_key(key);
        }

        Ok(request)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config = load_config(cli.config)?;
    let transport = SmtpTransport::new(config.helo_name.clone(), config.timeouts.clone());
    let host = config.mail_host.clone();

    let mut sender = MailSender::new(config, transport)
        .await
        .with_context(|| format!("Failed to log in to {host}"))?;

    let outcome = match cli.command {
        Command::Send(args) => match args.into_request().await {
            Ok(request) => sender.send(request).await.map_err(|err| {
                if err.is_caller_error() {
                    anyhow::Error::from(err).context("Request rejected, nothing was sent")
                } else {
                    anyhow::Error::from(err)
                }
            }),
            Err(err) => Err(err),
        },
        Command::Check => {
            println!("Logged in to {host} as {}", sender.config().mail_address);
            Ok(())
        }
    };

    sender.logout().await;
    outcome
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<SenderConfig> {
    let path = match explicit {
        Some(path) => Some(path),
        None => find_config_file()?,
    };

    match path {
        Some(path) => SenderConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => SenderConfig::from_env()
            .context("No configuration file found and the environment is incomplete"),
    }
}

/// Find the configuration file using the following precedence:
/// 1. `POSTMAIL_CONFIG` environment variable
/// 2. ./postmail.config.ron (current working directory)
/// 3. /etc/postmail/postmail.config.ron (system-wide config)
///
/// `None` means the environment should be used instead.
fn find_config_file() -> anyhow::Result<Option<PathBuf>> {
    if let Ok(env_path) = std::env::var(CONFIG_VAR) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!("{CONFIG_VAR} points to non-existent file: {}", path.display());
    }

    let default_paths = [
        PathBuf::from("./postmail.config.ron"),
        PathBuf::from("/etc/postmail/postmail.config.ron"),
    ];

    Ok(default_paths.into_iter().find(|path| path.exists()))
}
