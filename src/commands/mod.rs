//! Command Module
//!
//! This module implements the command layer for TinyKV. It receives decoded
//! argument lists, interprets them as typed commands, executes them against
//! the storage engine and returns the reply.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Frame Decoder  │  (protocol module)
//! └────────┬────────┘
//!          │ argument list
//!          ▼
//! ┌─────────────────┐
//! │    Command      │  (command.rs)
//! │  - Validate     │
//! │  - Type         │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (handler.rs)
//! │  - Execute      │
//! │  - Reply        │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message`
//! - `SET key value [PX milliseconds]`
//! - `GET key`

pub mod command;
pub mod handler;

pub use command::{Command, CommandError};
pub use handler::CommandHandler;
