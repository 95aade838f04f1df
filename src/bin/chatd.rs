//! Chat Daemon - Multi-client TCP chat room server
//!
//! This binary accepts line-oriented clients, negotiates unique screen
//! names, and relays every message to everyone in the room.
//!
//! # Usage
//!
//! ```bash
//! # Start the server on the default port (59001)
//! chatd
//!
//! # Start with a config file and a different address
//! chatd start --config ./chatd.toml --bind 127.0.0.1:6000
//!
//! # Print the effective configuration
//! chatd config
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use chatd::config::ServerConfig;
use chatd::registry::{spawn_registry, ChatEvent, RegistryHandle};
use chatd::server::ChatServer;

/// Environment variable overriding the bind address
const BIND_ENV: &str = "CHATD_BIND";

/// Chat daemon - multi-client chat room server
#[derive(Parser, Debug)]
#[command(name = "chatd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server (default)
    Start(Overrides),
    /// Print the effective configuration as TOML
    Config(Overrides),
}

/// Settings that take precedence over the config file.
#[derive(ClapArgs, Debug, Default)]
struct Overrides {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (host:port)
    #[arg(short, long)]
    bind: Option<String>,

    /// Maximum number of concurrently served clients
    #[arg(long)]
    max_connections: Option<usize>,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chatroom").join("chatd.toml"))
}

/// Builds the effective configuration: defaults, then the config file,
/// then `CHATD_BIND`, then command-line flags.
fn load_config(overrides: &Overrides) -> Result<ServerConfig> {
    let mut config = match &overrides.config {
        Some(path) => load_file(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => load_file(&path)?,
            _ => ServerConfig::default(),
        },
    };

    if let Ok(bind) = env::var(BIND_ENV) {
        config.bind = bind;
    }
    if let Some(bind) = &overrides.bind {
        config.bind = bind.clone();
    }
    if let Some(max) = overrides.max_connections {
        config.max_connections = max;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_file(path: &Path) -> Result<ServerConfig> {
    ServerConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Start(Overrides::default()));

    match command {
        Command::Start(overrides) => {
            let config = load_config(&overrides)?;
            run_server(config)
        }
        Command::Config(overrides) => {
            let config = load_config(&overrides)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("chatd=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Chat server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();
    info!("Name registry started");

    spawn_event_logger(&registry, cancel_token.clone());

    let server = ChatServer::new(config, registry, cancel_token);

    info!(addr = %server.config().bind, "Starting server");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Chat server stopped");
    Ok(())
}

/// Writes registry events to the server log: one line per join, leave and
/// message, and the active-user list whenever it changes.
fn spawn_event_logger(registry: &RegistryHandle, cancel_token: CancellationToken) {
    let mut events = registry.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Event logger shutting down");
                    break;
                }

                result = events.recv() => {
                    match result {
                        Ok(ChatEvent::Log(entry)) => {
                            info!(at = %entry.at.format("%H:%M:%S"), "{entry}");
                        }
                        Ok(ChatEvent::ActiveUsers { names }) => {
                            let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
                            info!(count = names.len(), users = %names.join(", "), "Active users");
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "Event logger lagged, skipped events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Event channel closed");
                            break;
                        }
                    }
                }
            }
        }
    });
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
