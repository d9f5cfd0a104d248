//! Typed Command Model
//!
//! Turns a decoded argument list into a [`Command`]. Command names and the
//! `PX` option are matched case-insensitively; argument positions are fixed
//! per command.
//!
//! | Request                     | Command                               |
//! |-----------------------------|---------------------------------------|
//! | `PING`                      | `Ping`                                |
//! | `ECHO message`              | `Echo { message }`                    |
//! | `SET key value [PX ms]`     | `Set { key, value, expire_ms }`       |
//! | `GET key`                   | `Get { key }`                         |
//! | anything else, or empty     | `Unknown`                             |

use bytes::Bytes;
use thiserror::Error;

/// A request the server knows how to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Echo {
        message: Bytes,
    },
    Set {
        key: Bytes,
        value: Bytes,
        /// Milliseconds until expiry; `None` or `Some(0)` never expires
        expire_ms: Option<u64>,
    },
    Get {
        key: Bytes,
    },
    Unknown,
}

/// A recognised command whose arguments don't fit it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("malformed '{command}' command: {reason}")]
    Malformed {
        command: &'static str,
        reason: &'static str,
    },
}

impl CommandError {
    fn malformed(command: &'static str, reason: &'static str) -> Self {
        CommandError::Malformed { command, reason }
    }
}

impl Command {
    /// Interprets an argument list.
    ///
    /// An empty list or an unrecognised name is not an error: it yields
    /// [`Command::Unknown`]. Only a recognised command with missing or
    /// invalid arguments fails.
    ///
    /// # Example
    ///
    /// ```
    /// use tinykv::commands::Command;
    /// use bytes::Bytes;
    ///
    /// let args = [Bytes::from("get"), Bytes::from("name")];
    /// assert_eq!(
    ///     Command::from_args(&args),
    ///     Ok(Command::Get { key: Bytes::from("name") })
    /// );
    /// ```
    pub fn from_args(args: &[Bytes]) -> Result<Self, CommandError> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Unknown);
        };

        if name.eq_ignore_ascii_case(b"PING") {
            Ok(Command::Ping)
        } else if name.eq_ignore_ascii_case(b"ECHO") {
            parse_echo(rest)
        } else if name.eq_ignore_ascii_case(b"SET") {
            parse_set(rest)
        } else if name.eq_ignore_ascii_case(b"GET") {
            parse_get(rest)
        } else {
            Ok(Command::Unknown)
        }
    }

    /// Upper-case command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Echo { .. } => "ECHO",
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::Unknown => "UNKNOWN",
        }
    }
}

/// ECHO message
fn parse_echo(args: &[Bytes]) -> Result<Command, CommandError> {
    let message = args
        .first()
        .ok_or_else(|| CommandError::malformed("ECHO", "missing message"))?;

    Ok(Command::Echo {
        message: message.clone(),
    })
}

/// SET key value [PX milliseconds]
///
/// A fourth argument other than `PX` is ignored and the key gets no expiry.
fn parse_set(args: &[Bytes]) -> Result<Command, CommandError> {
    let [key, value, options @ ..] = args else {
        return Err(CommandError::malformed("SET", "missing key or value"));
    };

    let expire_ms = match options {
        [option, rest @ ..] if option.eq_ignore_ascii_case(b"PX") => {
            let ms = rest
                .first()
                .ok_or_else(|| CommandError::malformed("SET", "PX requires a value"))?;
            Some(parse_millis(ms)?)
        }
        _ => None,
    };

    Ok(Command::Set {
        key: key.clone(),
        value: value.clone(),
        expire_ms,
    })
}

/// GET key
fn parse_get(args: &[Bytes]) -> Result<Command, CommandError> {
    let key = args
        .first()
        .ok_or_else(|| CommandError::malformed("GET", "missing key"))?;

    Ok(Command::Get { key: key.clone() })
}

/// Parses a non-negative decimal millisecond count.
fn parse_millis(raw: &[u8]) -> Result<u64, CommandError> {
    let invalid = || CommandError::malformed("SET", "PX value is not a non-negative integer");

    // `u64::from_str` accepts a leading '+', which is not a plain integer here
    if !raw.first().is_some_and(u8::is_ascii_digit) {
        return Err(invalid());
    }

    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, CommandError> {
        let args: Vec<Bytes> = args.iter().map(|s| Bytes::from(s.to_string())).collect();
        Command::from_args(&args)
    }

    fn set(key: &str, value: &str, expire_ms: Option<u64>) -> Command {
        Command::Set {
            key: Bytes::from(key.to_string()),
            value: Bytes::from(value.to_string()),
            expire_ms,
        }
    }

    #[test]
    fn test_ping() {
        assert_eq!(parse(&["PING"]), Ok(Command::Ping));
        assert_eq!(parse(&["ping", "extra"]), Ok(Command::Ping));
    }

    #[test]
    fn test_echo() {
        assert_eq!(
            parse(&["ECHO", "hello"]),
            Ok(Command::Echo {
                message: Bytes::from("hello")
            })
        );
        assert_eq!(
            parse(&["echo", ""]),
            Ok(Command::Echo {
                message: Bytes::new()
            })
        );
    }

    #[test]
    fn test_get() {
        assert_eq!(
            parse(&["GET", "name"]),
            Ok(Command::Get {
                key: Bytes::from("name")
            })
        );
    }

    #[test]
    fn test_set_plain() {
        assert_eq!(parse(&["SET", "k", "v"]), Ok(set("k", "v", None)));
    }

    #[test]
    fn test_set_with_px() {
        assert_eq!(parse(&["SET", "k", "v", "PX", "100"]), Ok(set("k", "v", Some(100))));
        assert_eq!(parse(&["SET", "k", "v", "px", "0"]), Ok(set("k", "v", Some(0))));
        assert_eq!(parse(&["SET", "k", "v", "pX", "7", "junk"]), Ok(set("k", "v", Some(7))));
    }

    #[test]
    fn test_set_ignores_other_options() {
        assert_eq!(parse(&["SET", "k", "v", "EX", "10"]), Ok(set("k", "v", None)));
        assert_eq!(parse(&["SET", "k", "v", "NX"]), Ok(set("k", "v", None)));
    }

    #[test]
    fn test_case_insensitive_names() {
        for name in ["set", "SET", "SeT"] {
            assert_eq!(parse(&[name, "k", "v", "Px", "5"]), Ok(set("k", "v", Some(5))));
        }
    }

    #[test]
    fn test_unknown() {
        assert_eq!(parse(&["FOO", "bar"]), Ok(Command::Unknown));
        assert_eq!(parse(&["GETX", "k"]), Ok(Command::Unknown));
        assert_eq!(Command::from_args(&[]), Ok(Command::Unknown));
    }

    #[test]
    fn test_missing_arguments_are_malformed() {
        for args in [
            vec!["ECHO"],
            vec!["GET"],
            vec!["SET"],
            vec!["SET", "k"],
            vec!["SET", "k", "v", "PX"],
        ] {
            assert!(
                matches!(parse(&args), Err(CommandError::Malformed { .. })),
                "{:?} should be malformed",
                args
            );
        }
    }

    #[test]
    fn test_invalid_px_is_malformed() {
        for ms in ["-1", "+5", "abc", "", "1.5", "99999999999999999999999"] {
            assert!(
                matches!(
                    parse(&["SET", "k", "v", "PX", ms]),
                    Err(CommandError::Malformed { command: "SET", .. })
                ),
                "PX {:?} should be rejected",
                ms
            );
        }
    }

    #[test]
    fn test_binary_arguments() {
        let args = vec![
            Bytes::from_static(b"SET"),
            Bytes::from_static(b"\x00key"),
            Bytes::from_static(b"\xff\xfe"),
        ];
        assert_eq!(
            Command::from_args(&args),
            Ok(Command::Set {
                key: Bytes::from_static(b"\x00key"),
                value: Bytes::from_static(b"\xff\xfe"),
                expire_ms: None,
            })
        );
    }

    #[test]
    fn test_name() {
        assert_eq!(Command::Ping.name(), "PING");
        assert_eq!(set("k", "v", None).name(), "SET");
        assert_eq!(Command::Unknown.name(), "UNKNOWN");
    }
}
