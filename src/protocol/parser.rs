//! Request Frame Decoder
//!
//! This module turns the raw byte stream of one connection into command
//! argument lists. A request frame is an array of bulk strings:
//!
//! ```text
//! *<N>\r\n
//! $<L1>\r\n<L1 bytes>\r\n
//! ...
//! $<LN>\r\n<LN bytes>\r\n
//! ```
//!
//! ## How the Decoder Works
//!
//! The decoder looks at the front of a buffer and returns either:
//! - `Ok(Some((args, consumed)))` - A whole frame was decoded from the first `consumed` bytes
//! - `Ok(None)` - The buffer only holds part of a frame, need more data
//! - `Err(ParseError)` - The bytes can never become a valid frame
//!
//! The caller appends network reads to a buffer, decodes as many frames as
//! are complete, advances past them, and reads again. There is no way to
//! resynchronise after a framing error, so the connection is dropped.
//!
//! [`RespParser`] is stateless and re-reads a partial frame from its first
//! byte. A connection uses [`FrameDecoder`] instead, which consumes each
//! argument from the buffer as soon as it is complete and resumes from there
//! on the next read.

use crate::protocol::types::{prefix, CRLF};
use bytes::{Buf, Bytes, BytesMut};
use std::ops::Range;
use thiserror::Error;

/// Errors that make a frame undecodable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A frame must start with `*` and each argument with `$`
    #[error("expected '{expected}' but found byte {found:#04x}")]
    InvalidPrefix { expected: char, found: u8 },

    /// Count or length is empty, signed, non-numeric or overflows
    #[error("invalid length: {0:?}")]
    InvalidLength(String),

    /// Bulk data was not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    /// A `*N` or `$L` line ran past the longest allowed header without CRLF
    #[error("header line longer than {max} bytes")]
    HeaderTooLong { max: usize },

    /// The frame declares more arguments than allowed
    #[error("too many arguments: {count} (max: {max})")]
    TooManyArguments { count: usize, max: usize },

    /// A single argument exceeds the maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The stream ended in the middle of a frame
    #[error("stream ended with {buffered} bytes of an incomplete frame")]
    Truncated { buffered: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Decoded frame plus the number of bytes it occupied.
pub type Decoded = (Vec<Bytes>, usize);

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of arguments in one frame
pub const MAX_ARGS: usize = 1024 * 1024;

/// Longest `*N` / `$L` line accepted, CRLF excluded.
pub const MAX_HEADER_LEN: usize = 32;

/// Upper bound on up-front argument vector allocation; the declared count
/// is untrusted until the bytes arrive.
const PREALLOC_ARGS: usize = 16;

/// Decoder for request frames.
///
/// The parser holds no per-frame state: every call decodes from the start
/// of the buffer, so a partially received frame is simply decoded again once
/// more bytes arrive.
///
/// # Example
///
/// ```
/// use tinykv::protocol::parser::RespParser;
/// use bytes::Bytes;
///
/// let parser = RespParser::new();
/// let buf = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
///
/// let (args, consumed) = parser.parse(buf).unwrap().unwrap();
/// assert_eq!(args, vec![Bytes::from("GET"), Bytes::from("name")]);
/// assert_eq!(consumed, buf.len());
/// ```
#[derive(Debug, Clone)]
pub struct RespParser {
    max_bulk_size: usize,
    max_args: usize,
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RespParser {
    /// Creates a parser with the default limits.
    pub fn new() -> Self {
        Self::with_limits(MAX_BULK_SIZE, MAX_ARGS)
    }

    /// Creates a parser with custom size limits.
    pub fn with_limits(max_bulk_size: usize, max_args: usize) -> Self {
        Self {
            max_bulk_size,
            max_args,
        }
    }

    /// Attempts to decode one frame from the front of `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((args, consumed)))` - Successfully decoded a frame
    /// - `Ok(None)` - Incomplete data, need more bytes
    /// - `Err(e)` - Framing error
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<Decoded>> {
        if buf.is_empty() {
            return Ok(None);
        }
        expect_prefix(buf[0], prefix::ARRAY)?;

        let (count, mut pos) = match read_header(buf, 1)? {
            Some(header) => header,
            None => return Ok(None),
        };
        self.check_count(count)?;

        let mut args = Vec::with_capacity(count.min(PREALLOC_ARGS));
        for _ in 0..count {
            match self.bulk_span(buf, pos)? {
                Some(span) => {
                    args.push(Bytes::copy_from_slice(&buf[span.data.clone()]));
                    pos = span.end;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((args, pos)))
    }

    fn check_count(&self, count: usize) -> ParseResult<()> {
        if count > self.max_args {
            return Err(ParseError::TooManyArguments {
                count,
                max: self.max_args,
            });
        }
        Ok(())
    }

    /// Locates `$<L>\r\n<L bytes>\r\n` starting at `pos` without copying it.
    fn bulk_span(&self, buf: &[u8], pos: usize) -> ParseResult<Option<BulkSpan>> {
        let Some(&first) = buf.get(pos) else {
            return Ok(None);
        };
        expect_prefix(first, prefix::BULK_STRING)?;

        let (length, data_start) = match read_header(buf, pos + 1)? {
            Some(header) => header,
            None => return Ok(None),
        };
        if length > self.max_bulk_size {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: self.max_bulk_size,
            });
        }

        let overflow = || ParseError::InvalidLength(length.to_string());
        let data_end = data_start.checked_add(length).ok_or_else(overflow)?;
        let frame_end = data_end.checked_add(CRLF.len()).ok_or_else(overflow)?;

        if buf.len() < frame_end {
            // Reject a bad terminator as soon as its first byte shows up.
            let present = buf.len().saturating_sub(data_end);
            if buf[data_end.min(buf.len())..] != CRLF[..present] {
                return Err(ParseError::MissingCrlf);
            }
            return Ok(None);
        }

        if &buf[data_end..frame_end] != CRLF {
            return Err(ParseError::MissingCrlf);
        }

        Ok(Some(BulkSpan {
            data: data_start..data_end,
            end: frame_end,
        }))
    }
}

/// Where one complete bulk argument sits in a buffer.
struct BulkSpan {
    /// The argument bytes
    data: Range<usize>,
    /// Position just past the trailing CRLF
    end: usize,
}

/// A frame whose header has been read but whose arguments are still arriving.
#[derive(Debug)]
struct PendingFrame {
    /// Declared argument count
    count: usize,
    /// Arguments decoded so far
    args: Vec<Bytes>,
    /// Bytes of this frame already taken off the buffer
    consumed: usize,
}

/// Stateful decoder for one connection.
///
/// Complete arguments are split off the front of the buffer without copying
/// and kept until the rest of their frame arrives, so every byte of a frame
/// is examined once no matter how many reads it takes to arrive.
///
/// # Example
///
/// ```
/// use tinykv::protocol::FrameDecoder;
/// use bytes::{Bytes, BytesMut};
///
/// let mut decoder = FrameDecoder::new();
/// let mut buf = BytesMut::from(&b"*2\r\n$4\r\nECHO\r\n$2"[..]);
///
/// assert_eq!(decoder.decode(&mut buf).unwrap(), None);
/// assert_eq!(&buf[..], b"$2");
///
/// buf.extend_from_slice(b"\r\nhi\r\n");
/// let args = decoder.decode(&mut buf).unwrap().unwrap();
/// assert_eq!(args, vec![Bytes::from("ECHO"), Bytes::from("hi")]);
/// assert!(buf.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    parser: RespParser,
    pending: Option<PendingFrame>,
}

impl FrameDecoder {
    /// Creates a decoder with the default limits.
    pub fn new() -> Self {
        Self::with_parser(RespParser::new())
    }

    /// Creates a decoder that enforces `parser`'s limits.
    pub fn with_parser(parser: RespParser) -> Self {
        Self {
            parser,
            pending: None,
        }
    }

    /// Decodes the next frame, consuming its bytes from `buf`.
    ///
    /// On `Ok(None)` every complete argument has already been taken off
    /// `buf`; call again once more bytes have been appended.
    pub fn decode(&mut self, buf: &mut BytesMut) -> ParseResult<Option<Vec<Bytes>>> {
        let mut frame = match self.pending.take() {
            Some(frame) => frame,
            None => match self.start_frame(buf)? {
                Some(frame) => frame,
                None => return Ok(None),
            },
        };

        while frame.args.len() < frame.count {
            let Some(span) = self.parser.bulk_span(buf, 0)? else {
                self.pending = Some(frame);
                return Ok(None);
            };

            let mut arg = buf.split_to(span.end);
            arg.truncate(span.data.end);
            arg.advance(span.data.start);
            frame.args.push(arg.freeze());
            frame.consumed += span.end;
        }

        Ok(Some(frame.args))
    }

    fn start_frame(&self, buf: &mut BytesMut) -> ParseResult<Option<PendingFrame>> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };
        expect_prefix(first, prefix::ARRAY)?;

        let Some((count, header_end)) = read_header(buf, 1)? else {
            return Ok(None);
        };
        self.parser.check_count(count)?;
        buf.advance(header_end);

        Ok(Some(PendingFrame {
            count,
            args: Vec::with_capacity(count.min(PREALLOC_ARGS)),
            consumed: header_end,
        }))
    }

    /// Bytes of the unfinished frame held so far, in the decoder and in `buf`.
    pub fn buffered(&self, buf: &[u8]) -> usize {
        self.pending.as_ref().map_or(0, |frame| frame.consumed) + buf.len()
    }

    /// Checks what is left once the peer has closed its side.
    ///
    /// Anything left is an unfinished frame and can never be completed.
    pub fn finish(&self, remaining: &[u8]) -> ParseResult<()> {
        match self.buffered(remaining) {
            0 => Ok(()),
            buffered => Err(ParseError::Truncated { buffered }),
        }
    }
}

fn expect_prefix(found: u8, expected: u8) -> ParseResult<()> {
    if found == expected {
        Ok(())
    } else {
        Err(ParseError::InvalidPrefix {
            expected: expected as char,
            found,
        })
    }
}

/// Reads the decimal number between `start` and the next CRLF.
///
/// Returns the number and the position just past the CRLF.
fn read_header(buf: &[u8], start: usize) -> ParseResult<Option<(usize, usize)>> {
    let rest = &buf[start.min(buf.len())..];
    let window = &rest[..rest.len().min(MAX_HEADER_LEN + CRLF.len())];
    match find_crlf(window) {
        Some(end) if end <= MAX_HEADER_LEN => {
            let n = parse_length(&rest[..end])?;
            Ok(Some((n, start + end + CRLF.len())))
        }
        Some(_) => Err(ParseError::HeaderTooLong {
            max: MAX_HEADER_LEN,
        }),
        // A trailing '\r' may be the first half of the terminator.
        None if rest.len() > MAX_HEADER_LEN + 1 => Err(ParseError::HeaderTooLong {
            max: MAX_HEADER_LEN,
        }),
        None => Ok(None),
    }
}

/// Parses a non-empty run of ASCII digits. Signs and whitespace are rejected.
fn parse_length(digits: &[u8]) -> ParseResult<usize> {
    let invalid = || ParseError::InvalidLength(String::from_utf8_lossy(digits).into_owned());

    if digits.is_empty() {
        return Err(invalid());
    }

    digits.iter().try_fold(0usize, |acc, &b| {
        if !b.is_ascii_digit() {
            return Err(invalid());
        }
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add(usize::from(b - b'0')))
            .ok_or_else(invalid)
    })
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Decodes a single frame from the front of `buf` with default limits.
pub fn decode_next(buf: &[u8]) -> ParseResult<Option<Decoded>> {
    RespParser::new().parse(buf)
}
