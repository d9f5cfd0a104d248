//! Command Executor
//!
//! Executes typed commands against the storage engine and produces the
//! reply for each one.
//!
//! ## Replies
//!
//! - `PING` → `+PONG`
//! - `ECHO message` → `+message`
//! - `SET key value [PX ms]` → `+OK`
//! - `GET key` → bulk string, or null bulk string on a miss
//! - anything else → `+UKNOWN COMMAND`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  arguments  │───>│  Command::  │───>│  execute()  │     │
//! │  │             │    │  from_args  │    │             │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing fails past this layer: unknown and malformed commands both turn
//! into the unknown-command reply and the connection carries on.

use crate::commands::command::Command;
use crate::protocol::RespValue;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Executes commands against a shared storage engine.
///
/// Cloning is cheap; each connection gets its own handle to the same store.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Returns the storage engine this handler executes against.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Interprets and executes one decoded argument list.
    ///
    /// A recognised command with missing or invalid arguments is answered
    /// like an unknown one.
    pub fn handle(&self, args: &[Bytes]) -> RespValue {
        match Command::from_args(args) {
            Ok(command) => self.execute(command),
            Err(e) => {
                debug!(error = %e, "Rejecting malformed command");
                RespValue::unknown_command()
            }
        }
    }

    /// Executes a command and returns the response.
    pub fn execute(&self, command: Command) -> RespValue {
        trace!(command = command.name(), "Executing command");

        match command {
            Command::Ping => RespValue::pong(),
            Command::Echo { message } => RespValue::simple_string(message),
            Command::Set {
                key,
                value,
                expire_ms,
            } => {
                self.storage.set(key, value, expire_ms);
                RespValue::ok()
            }
            Command::Get { key } => match self.storage.get(&key) {
                Some(value) => RespValue::bulk_string(value),
                None => RespValue::null(),
            },
            Command::Unknown => RespValue::unknown_command(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(storage)
    }

    fn make_command(args: &[&str]) -> Vec<Bytes> {
        args.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    fn reply(handler: &CommandHandler, args: &[&str]) -> Vec<u8> {
        handler.handle(&make_command(args)).serialize()
    }

    #[test]
    fn test_ping() {
        let handler = create_handler();

        let response = handler.handle(&make_command(&["PING"]));
        assert_eq!(response, RespValue::pong());
        assert_eq!(response.serialize(), b"+PONG\r\n");
    }

    #[test]
    fn test_echo() {
        let handler = create_handler();

        assert_eq!(reply(&handler, &["ECHO", "hello"]), b"+hello\r\n");
        assert_eq!(reply(&handler, &["echo", "hey there"]), b"+hey there\r\n");
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();

        assert_eq!(reply(&handler, &["SET", "key", "value"]), b"+OK\r\n");
        assert_eq!(reply(&handler, &["GET", "key"]), b"$5\r\nvalue\r\n");
    }

    #[test]
    fn test_get_nonexistent() {
        let handler = create_handler();

        let response = handler.handle(&make_command(&["GET", "nonexistent"]));
        assert_eq!(response, RespValue::null());
        assert_eq!(response.serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_get_empty_value() {
        let handler = create_handler();

        handler.handle(&make_command(&["SET", "key", ""]));
        assert_eq!(reply(&handler, &["GET", "key"]), b"$0\r\n\r\n");
    }

    #[test]
    fn test_case_insensitive_set() {
        let replies: Vec<Vec<u8>> = ["set", "SET", "SeT"]
            .into_iter()
            .map(|name| {
                let handler = create_handler();
                let mut out = reply(&handler, &[name, "k", "v", "px", "10000"]);
                out.extend(reply(&handler, &["get", "k"]));
                out
            })
            .collect();

        assert!(replies.iter().all(|r| r == b"+OK\r\n$1\r\nv\r\n"));
    }

    #[test]
    fn test_set_with_expiry() {
        let handler = create_handler();

        handler.handle(&make_command(&["SET", "key", "value", "PX", "100"]));
        assert_eq!(reply(&handler, &["GET", "key"]), b"$5\r\nvalue\r\n");

        thread::sleep(Duration::from_millis(150));

        assert_eq!(reply(&handler, &["GET", "key"]), b"$-1\r\n");
        assert!(!handler.storage().contains_key(b"key"));
    }

    #[test]
    fn test_px_zero_never_expires() {
        let handler = create_handler();

        handler.handle(&make_command(&["SET", "key", "value", "PX", "0"]));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(reply(&handler, &["GET", "key"]), b"$5\r\nvalue\r\n");
    }

    #[test]
    fn test_overwrite_clears_expiry() {
        let handler = create_handler();

        handler.handle(&make_command(&["SET", "key", "v1", "PX", "50"]));
        handler.handle(&make_command(&["SET", "key", "v2"]));

        thread::sleep(Duration::from_millis(80));

        assert_eq!(reply(&handler, &["GET", "key"]), b"$2\r\nv2\r\n");
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler();

        assert_eq!(reply(&handler, &["FOO", "bar"]), b"+UKNOWN COMMAND\r\n");
        assert!(handler.storage().is_empty());
        assert_eq!(handler.storage().stats().set_ops, 0);
    }

    #[test]
    fn test_empty_command() {
        let handler = create_handler();
        assert_eq!(handler.handle(&[]), RespValue::unknown_command());
    }

    #[test]
    fn test_malformed_command_replies_unknown() {
        let handler = create_handler();

        assert_eq!(reply(&handler, &["ECHO"]), b"+UKNOWN COMMAND\r\n");
        assert_eq!(reply(&handler, &["GET"]), b"+UKNOWN COMMAND\r\n");
        assert_eq!(reply(&handler, &["SET", "key"]), b"+UKNOWN COMMAND\r\n");
        assert_eq!(
            reply(&handler, &["SET", "key", "value", "PX", "soon"]),
            b"+UKNOWN COMMAND\r\n"
        );

        // None of them touched the store
        assert!(handler.storage().is_empty());
    }

    #[test]
    fn test_handlers_share_storage() {
        let first = create_handler();
        let second = first.clone();

        first.handle(&make_command(&["SET", "shared", "yes"]));
        assert_eq!(reply(&second, &["GET", "shared"]), b"$3\r\nyes\r\n");
    }

    #[test]
    fn test_execute_typed_command() {
        let handler = create_handler();

        let response = handler.execute(Command::Set {
            key: Bytes::from("k"),
            value: Bytes::from("v"),
            expire_ms: None,
        });
        assert_eq!(response, RespValue::ok());

        let response = handler.execute(Command::Get {
            key: Bytes::from("k"),
        });
        assert_eq!(response, RespValue::bulk_string(Bytes::from("v")));
    }
}
