//! surrealrpc - command-line driver for the SurrealDB RPC endpoint
//!
//! Connects, runs one command, and disconnects.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use surrealrpc_client::{ConnectionConfig, NoopObserver, RpcClient, TracingObserver};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "surrealrpc")]
#[command(about = "Command-line driver for the SurrealDB WebSocket RPC endpoint")]
#[command(version)]
struct Cli {
    /// Endpoint URL (ws:// or wss://)
    #[arg(short, long, env = "SURREALRPC_URL")]
    url: Option<String>,

    /// Connect timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Per-call timeout in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Log every frame sent and received
    #[arg(long)]
    trace_wire: bool,

    // ===== TLS Options =====
    /// Path to CA certificate for server verification
    #[arg(long, env = "SURREALRPC_TLS_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Path to client certificate (for mTLS)
    #[arg(long, env = "SURREALRPC_TLS_CLIENT_CERT")]
    client_cert: Option<PathBuf>,

    /// Path to client private key (for mTLS)
    #[arg(long, env = "SURREALRPC_TLS_CLIENT_KEY")]
    client_key: Option<PathBuf>,

    /// Skip server certificate verification (INSECURE)
    #[arg(long, short = 'k')]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Ping the server
    Ping,

    /// Print the server version
    Version,

    /// Call an arbitrary RPC method
    Call {
        /// Method name
        method: String,

        /// Params as a JSON array (or @file.json to read from file).
        /// A value that is not an array is sent as the only param.
        params: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.trace_wire {
        "warn,surrealrpc::wire=trace"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // Defaults, then SURREALRPC_CONFIG file, then env, then flags
    let mut config = ConnectionConfig::load().map_err(|e| {
        eprintln!("{}: {}", "Invalid configuration".red(), e);
        e
    })?;
    if let Some(url) = cli.url {
        config.url = url;
    }
    if let Some(secs) = cli.timeout {
        config = config.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(ms) = cli.request_timeout_ms {
        config = config.with_request_timeout(Duration::from_millis(ms));
    }
    if let Some(path) = cli.ca_cert {
        config.tls.ca_cert_path = Some(path);
    }
    match (cli.client_cert, cli.client_key) {
        (Some(cert), Some(key)) => {
            config.tls.client_cert_path = Some(cert);
            config.tls.client_key_path = Some(key);
        }
        (None, None) => {}
        _ => {
            eprintln!(
                "{}: --client-cert and --client-key must be used together",
                "Error".red()
            );
            std::process::exit(1);
        }
    }
    if cli.insecure {
        config.tls.insecure = true;
    }
    if let Err(e) = config.validate() {
        eprintln!("{}: {}", "Invalid configuration".red(), e);
        std::process::exit(1);
    }

    tracing::debug!(url = %config.url, timeout = ?config.connect_timeout, "Connecting");
    let client = if cli.trace_wire {
        RpcClient::with_observer(config, Arc::new(TracingObserver))
    } else {
        RpcClient::with_observer(config, Arc::new(NoopObserver))
    };

    client.connect_default().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    let result = commands::execute(&client, cli.command).await;
    client.disconnect().await;

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
