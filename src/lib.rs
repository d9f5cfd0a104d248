//! # TinyKV - A Small In-Memory Key-Value Server
//!
//! TinyKV is an in-memory key-value server speaking a RESP-style protocol.
//! Clients send pipelined `PING`, `ECHO`, `SET` and `GET` requests over TCP;
//! every connection shares one store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              TinyKV                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Frame     │    │              StorageEngine                   │   │
//! │  │   Decoder   │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tinykv::storage::StorageEngine;
//! use tinykv::commands::CommandHandler;
//! use tinykv::connection::{handle_connection, ConnectionStats};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(stream, addr, handler, stats));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING` → `+PONG`
//! - `ECHO message` → `+message`
//! - `SET key value [PX milliseconds]` → `+OK`
//! - `GET key` → bulk string, or `$-1` when missing or expired
//!
//! Anything else is answered with `+UKNOWN COMMAND`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request frame decoder and reply types
//! - [`commands`]: Typed command model and executor
//! - [`storage`]: Thread-safe storage engine with passive expiry
//! - [`connection`]: Client connection loop
//!
//! ## Expiry
//!
//! Keys set with `PX` are only checked when a `GET` reads them. An expired
//! key is removed by that read. There is no background sweep, so a key that
//! expires and is never read again stays in memory until it is overwritten.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{Command, CommandError, CommandHandler};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{decode_next, FrameDecoder, ParseError, RespParser, RespValue};
pub use storage::StorageEngine;

/// The default port TinyKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host TinyKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of TinyKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
