//! Connection Handler Module
//!
//! This module handles individual client connections to TinyKV.
//! Each client gets its own handler task that runs in a loop,
//! reading commands and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Decode buffered frames  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute each in order   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Flush replies           │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / read error / framing error
//!        │
//!        ▼
//! 5. Handler task ends, stream is dropped
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. This is important
//! because TCP is a stream protocol - we might receive partial commands,
//! or multiple commands in a single read.

use crate::commands::CommandHandler;
use crate::protocol::parser::MAX_BULK_SIZE;
use crate::protocol::{FrameDecoder, ParseError, RespParser, RespValue};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, trace, warn};

/// Default cap on the unfinished frame a connection may hold: one argument
/// of the largest allowed size plus room for its headers.
pub const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// This struct manages the read buffer, decoding, and response sending
/// for one connected client. It works over any bidirectional byte stream;
/// the server hands it a `TcpStream`.
pub struct ConnectionHandler<S> {
    /// The stream for this connection, with buffered writes
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shares the store with every other connection)
    command_handler: CommandHandler,

    /// Frame decoder, holding any partly received frame
    decoder: FrameDecoder,

    /// Cap on the unfinished frame, in bytes
    max_buffer_size: usize,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Reused serialization buffer for replies
    reply_buf: Vec<u8>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The byte stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self::with_limits(
            stream,
            addr,
            command_handler,
            stats,
            RespParser::new(),
            MAX_BUFFER_SIZE,
        )
    }

    /// Creates a connection handler with custom decoder limits and a custom
    /// cap on how much of an unfinished frame may be held.
    ///
    /// A peer that exceeds `max_buffer_size` is disconnected with
    /// [`ConnectionError::BufferFull`].
    pub fn with_limits(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        parser: RespParser,
        max_buffer_size: usize,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            decoder: FrameDecoder::with_parser(parser),
            max_buffer_size,
            stats,
            reply_buf: Vec::with_capacity(64),
        }
    }

    /// Runs the main connection loop.
    ///
    /// This method reads commands from the client, executes them,
    /// and sends back responses until the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection closed on error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Replies to the frames decoded before a framing error still go out.
            let drained = self.execute_buffered().await;
            self.stream.flush().await?;
            drained?;

            if self.read_more_data().await? == 0 {
                self.decoder.finish(&self.buffer)?;
                return Ok(());
            }
        }
    }

    /// Executes every complete frame in the buffer, in arrival order.
    async fn execute_buffered(&mut self) -> Result<(), ConnectionError> {
        while let Some(args) = self.try_parse_command()? {
            let response = self.command_handler.handle(&args);
            self.stats.command_processed();
            self.send_response(&response).await?;
        }
        Ok(())
    }

    /// Attempts to decode a command from the buffer.
    fn try_parse_command(&mut self) -> Result<Option<Vec<Bytes>>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.decoder.decode(&mut self.buffer) {
            Ok(Some(args)) => {
                trace!(
                    client = %self.addr,
                    args = args.len(),
                    remaining = self.buffer.len(),
                    "Parsed command"
                );
                Ok(Some(args))
            }
            Ok(None) => {
                // Incomplete frame - complete arguments are held by the decoder
                trace!(
                    client = %self.addr,
                    buffered = self.decoder.buffered(&self.buffer),
                    "Incomplete command, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Parse error");
                Err(ConnectionError::ParseError(e))
            }
        }
    }

    /// Reads more data from the stream into the buffer.
    ///
    /// Returns the number of bytes read; 0 means the peer closed its side.
    async fn read_more_data(&mut self) -> Result<usize, ConnectionError> {
        // Check buffer size limit
        let buffered = self.decoder.buffered(&self.buffer);
        if buffered >= self.max_buffer_size {
            error!(
                client = %self.addr,
                size = buffered,
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n > 0 {
            self.stats.bytes_read(n);
            trace!(client = %self.addr, bytes = n, "Read data");
        }

        Ok(n)
    }

    /// Queues a response for the client. It is sent on the next flush.
    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        self.reply_buf.clear();
        response.serialize_into(&mut self.reply_buf);
        self.stream.write_all(&self.reply_buf).await?;
        self.stats.bytes_written(self.reply_buf.len());
        trace!(
            client = %self.addr,
            bytes = self.reply_buf.len(),
            "Queued response"
        );
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Framing error, including a stream that ended mid-frame
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. The stream is dropped, and so closed,
/// when it returns.
///
/// # Arguments
///
/// * `stream` - The byte stream for this connection
/// * `addr` - The client's socket address
/// * `command_handler` - The command handler for executing commands
/// * `stats` - Shared connection statistics
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}
