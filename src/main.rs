//! TinyKV - A Small In-Memory Key-Value Server
//!
//! This is the main entry point for the TinyKV server.
//! It sets up logging, the TCP listener and the shared store, and spawns one
//! task per incoming connection.

use anyhow::{bail, Context};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tinykv::commands::CommandHandler;
use tinykv::connection::{handle_connection, ConnectionStats};
use tinykv::storage::StorageEngine;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: tinykv::DEFAULT_HOST.to_string(),
            port: tinykv::DEFAULT_PORT,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Serve(Config),
    Help,
    Version,
}

impl Config {
    /// Parses command-line arguments, program name excluded.
    fn parse<I>(args: I) -> anyhow::Result<Invocation>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = args.next().context("--host requires a value")?;
                }
                "--port" | "-p" => {
                    let raw = args.next().context("--port requires a value")?;
                    config.port = raw
                        .parse::<u16>()
                        .with_context(|| format!("invalid port number: {raw}"))?;
                }
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                other => bail!("unknown argument: {other}"),
            }
        }

        Ok(Invocation::Serve(config))
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
TinyKV - A Small In-Memory Key-Value Server

USAGE:
    tinykv [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 6379)
    -v, --version        Print version information
        --help           Print this help message

ENVIRONMENT:
    RUST_LOG             Log filter, e.g. debug or tinykv=trace (default: info)

CONNECTING:
    Use redis-cli or any Redis client to connect:
    $ redis-cli -p 6379
    127.0.0.1:6379> PING
    PONG
    127.0.0.1:6379> SET name "Ariz" PX 60000
    OK
    127.0.0.1:6379> GET name
    "Ariz"
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::parse(std::env::args().skip(1)) {
        Ok(Invocation::Serve(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("TinyKV version {}", tinykv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(version = tinykv::VERSION, "Starting TinyKV");

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::new());
    info!("Storage engine initialized");

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&storage), Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    let storage_stats = storage.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        keys = storage_stats.keys,
        get_ops = storage_stats.get_ops,
        set_ops = storage_stats.set_ops,
        expired = storage_stats.expired,
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                // Create a command handler for this connection
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Invocation> {
        Config::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        let invocation = parse(&[]).unwrap();
        assert_eq!(invocation, Invocation::Serve(Config::default()));

        let Invocation::Serve(config) = invocation else {
            unreachable!()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
    }

    #[test]
    fn test_host_and_port() {
        assert_eq!(
            parse(&["--host", "0.0.0.0", "-p", "7000"]).unwrap(),
            Invocation::Serve(Config {
                host: "0.0.0.0".to_string(),
                port: 7000,
            })
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["--help"]).unwrap(), Invocation::Help);
        assert_eq!(parse(&["-p", "7000", "-v"]).unwrap(), Invocation::Version);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(parse(&["--port"]).is_err());
        assert!(parse(&["--port", "99999"]).is_err());
        assert!(parse(&["-h"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}
