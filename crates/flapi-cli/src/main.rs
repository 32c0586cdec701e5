//! FLAPI command-line client.
//!
//! Connects to a FilmLight API server, runs one command and exits.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flapi::{Session, SessionConfig};
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "flapi")]
#[command(about = "Command-line client for the FilmLight API")]
struct Args {
    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Server port (defaults to $FLAPI_PORT, then 1984)
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Authentication token (defaults to $FLAPI_TOKEN, then the token file)
    #[arg(long)]
    token: Option<String>,

    /// Enable debug logging, including every frame sent and received
    #[arg(short, long)]
    debug: bool,

    /// Give up on a call after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call a static method and print its result as JSON
    Call {
        /// Qualified method name, e.g. `Application.get_application_info`
        method: String,
        /// Parameters as a JSON object
        params: Option<String>,
    },
    /// Print the permissions granted to this connection
    Permissions,
    /// Subscribe to a signal on the object returned by a static getter
    Watch {
        /// Static getter returning the object, e.g. `Application.get`
        getter: String,
        /// Signal name, e.g. `SceneOpened`
        signal: String,
    },
}

impl Args {
    fn session_config(&self) -> Result<SessionConfig> {
        let base = match (&self.host, self.port) {
            (None, None) => SessionConfig::from_env()?.unwrap_or_default(),
            _ => SessionConfig::default(),
        };

        let mut builder = SessionConfig::builder(self.host.clone().unwrap_or(base.host))
            .port(self.port.unwrap_or(base.port))
            .debug(self.debug || base.debug);
        if let Some(username) = &self.username {
            builder = builder.username(username);
        }
        if let Some(password) = &self.password {
            builder = builder.password(password);
        }
        if let Some(token) = &self.token {
            builder = builder.token(token);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.call_timeout(Duration::from_secs(secs));
        }
        Ok(builder.build())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let config = args.session_config()?;
    debug!("Connecting to {}", config.url()?);

    let session = Session::new(config);
    session.connect().await?;

    let outcome = match args.command {
        Command::Call { method, params } => {
            commands::call(&session, &method, params.as_deref()).await
        }
        Command::Permissions => commands::permissions(&session).await,
        Command::Watch { getter, signal } => commands::watch(&session, &getter, &signal).await,
    };

    session.close().await;
    outcome
}
