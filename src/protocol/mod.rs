//! RESP Protocol Implementation
//!
//! This module provides the subset of the Redis Serialization Protocol (RESP)
//! that TinyKV speaks: requests are arrays of bulk strings, replies are simple
//! strings, bulk strings or the null bulk string.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` reply enum, its serialization and the request encoder
//! - `parser`: Frame decoders for incoming requests, stateless and per-connection
//!
//! ## Example
//!
//! ```
//! use tinykv::protocol::{decode_next, RespValue};
//! use bytes::Bytes;
//!
//! // Decoding incoming data
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (args, consumed) = decode_next(data).unwrap().unwrap();
//! assert_eq!(args[1], Bytes::from("name"));
//! assert_eq!(consumed, data.len());
//!
//! // Creating responses
//! let response = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(response.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode_next, FrameDecoder, ParseError, ParseResult, RespParser};
pub use types::{encode_frame, RespValue};
