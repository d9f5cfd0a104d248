//! RESP Reply Types
//!
//! This module defines the values TinyKV writes back to clients and the
//! request-frame encoder used by clients, tests and benchmarks.
//!
//! ## Protocol Format
//!
//! Replies use three forms, each terminated with CRLF (`\r\n`):
//! - `+` Simple String: `+PONG\r\n`
//! - `$` Bulk String: `$5\r\nhello\r\n`
//! - Null Bulk String: `$-1\r\n`
//!
//! Requests are arrays of bulk strings:
//! `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// Reply text for any command the server does not recognise.
///
/// The misspelling is what existing clients of this protocol expect to see.
pub const UNKNOWN_COMMAND: &str = "UKNOWN COMMAND";

/// A reply sent back over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Format: `+<string>\r\n`
    ///
    /// The payload is written verbatim; it is the caller's job not to
    /// put CRLF inside it.
    SimpleString(Bytes),

    /// Binary-safe string.
    /// Format: `$<length>\r\n<data>\r\n`
    BulkString(Bytes),

    /// Null bulk string: `$-1\r\n`
    Null,
}

impl RespValue {
    /// Creates a new simple string response.
    ///
    /// # Example
    /// ```
    /// use tinykv::protocol::types::RespValue;
    /// let ok = RespValue::simple_string("OK");
    /// assert_eq!(ok.serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<Bytes>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a new bulk string response.
    ///
    /// # Example
    /// ```
    /// use tinykv::protocol::types::RespValue;
    /// use bytes::Bytes;
    /// let bulk = RespValue::bulk_string(Bytes::from("hello"));
    /// assert_eq!(bulk.serialize(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// Creates a null response.
    pub fn null() -> Self {
        RespValue::Null
    }

    /// Common response for successful operations
    pub fn ok() -> Self {
        RespValue::simple_string("OK")
    }

    /// Common response for PONG
    pub fn pong() -> Self {
        RespValue::simple_string("PONG")
    }

    /// Response for unrecognised or malformed commands
    pub fn unknown_command() -> Self {
        RespValue::simple_string(UNKNOWN_COMMAND)
    }

    /// Serializes the RESP value to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the RESP value into an existing buffer.
    ///
    /// This is more efficient than `serialize()` when you want to reuse a buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s);
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
        }
    }

    /// Exact number of bytes `serialize_into` appends.
    fn encoded_len(&self) -> usize {
        match self {
            RespValue::SimpleString(s) => 1 + s.len() + 2,
            RespValue::BulkString(data) => 1 + decimal_len(data.len()) + 2 + data.len() + 2,
            RespValue::Null => 5,
        }
    }

}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(data) | RespValue::BulkString(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            RespValue::Null => write!(f, "(nil)"),
        }
    }
}

/// Encodes an argument list as a request frame: `*<N>\r\n` followed by one
/// `$<L>\r\n<bytes>\r\n` per argument.
///
/// # Example
/// ```
/// use tinykv::protocol::types::encode_frame;
/// assert_eq!(encode_frame(&["GET", "name"]), b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
/// ```
pub fn encode_frame<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(prefix::ARRAY);
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    for arg in args {
        let arg = arg.as_ref();
        buf.push(prefix::BULK_STRING);
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(arg);
        buf.extend_from_slice(CRLF);
    }
    buf
}

fn decimal_len(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}
