//! Chat - line-oriented terminal client for the chat room
//!
//! Reads lines from stdin and prints room messages to stdout. Logs go to
//! stderr so they never mix with the conversation.
//!
//! # Usage
//!
//! ```text
//! chat                              # connect to 127.0.0.1:59001, ask for a name
//! chat --name alice                 # offer "alice" on the first prompt
//! chat --addr chat.example.org:59001
//! CHAT_ADDR=10.0.0.5:59001 chat
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{self, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_client::{ChatClient, ClientConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

/// Chat - terminal client for the chat room
#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(about = "Join a chat room server")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, env = "CHAT_ADDR")]
    addr: Option<String>,

    /// Screen name to offer first
    #[arg(short, long)]
    name: Option<String>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env().add_directive(
        "chat_client=warn"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::Directive::from(tracing::Level::WARN)),
    );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let defaults = ClientConfig::default();
    let config = ClientConfig {
        addr: args.addr.unwrap_or(defaults.addr),
        name: args.name,
    };

    info!(addr = %config.addr, "Chat client starting");

    let client = ChatClient::new(config);
    client
        .run(BufReader::new(io::stdin()), io::stdout())
        .await
        .context("Chat session failed")?;

    Ok(())
}
