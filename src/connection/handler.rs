//! Connection Handler Module
//!
//! This module holds the per-client state the event loop keeps for every
//! accepted socket: the request buffer, the outbound queue and the
//! lifecycle logging.
//!
//! A `Connection` never awaits. The event loop asks it whether its socket
//! is ready ([`Connection::poll_ready`]) and then drives it with
//! non-blocking calls that each perform at most one bounded read or a
//! run of writes that stops at the first `WouldBlock`.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Listener accepts, event loop creates Connection
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │  readable ─> read_request()  │
//!    │         ─> command handler   │
//!    │         ─> send(reply)       │
//!    │  writable ─> flush()         │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. QUIT / sentinel / empty request / I/O error
//!        │
//!        ▼
//! 4. close(): final flush, shutdown, drop
//! ```
//!
//! ## Buffer Management
//!
//! Incoming bytes go through a [`RequestBuffer`] so requests split across
//! reads are reassembled and pipelined requests are handed out one per
//! readiness event. Replies go into a `BytesMut` that is written out as far
//! as the socket allows; whatever remains waits for write readiness.

use crate::commands::CloseReason;
use crate::connection::buffer::{RequestBuffer, REQUEST_BUFFER_CAPACITY};
use crate::protocol::Reply;
use bytes::{Buf, Bytes, BytesMut};
use std::fmt;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Context;
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Stop reading from a client while this much output is still queued
const OUTPUT_HIGH_WATER: usize = 64 * 1024;

/// Drop a client whose unread output grows beyond this
const MAX_PENDING_OUTPUT: usize = 1024 * 1024;

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

/// Identifies one accepted socket for the lifetime of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which directions of a socket are ready to be serviced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    pub readable: bool,
    pub writable: bool,
}

/// Why a connection is being closed.
#[derive(Debug)]
pub enum Disconnect {
    /// The client asked for it
    Requested(CloseReason),
    /// Reading or writing failed
    Failed(ConnectionError),
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disconnect::Requested(reason) => write!(f, "{}", reason),
            Disconnect::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// State kept for one connected client.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,

    /// The TCP stream for this connection
    stream: TcpStream,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet dispatched
    requests: RequestBuffer,

    /// Serialized replies not yet accepted by the socket
    outbound: BytesMut,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl Connection {
    /// Wraps an accepted stream.
    ///
    /// # Arguments
    ///
    /// * `id` - The identifier the event loop files this connection under
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `stats` - Shared connection statistics
    pub fn new(
        id: ConnectionId,
        stream: TcpStream,
        addr: SocketAddr,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            id,
            stream,
            addr,
            requests: RequestBuffer::new(),
            outbound: BytesMut::new(),
            stats,
        }
    }

    /// Returns true while replies are waiting to be written.
    pub fn has_pending_output(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Returns true if a complete request is already buffered.
    pub fn has_request(&self) -> bool {
        self.requests.has_request()
    }

    fn wants_read(&self) -> bool {
        !self.requests.is_eof() && self.outbound.len() < OUTPUT_HIGH_WATER
    }

    /// Checks which directions need servicing, registering the task's
    /// waker for the ones that are not ready yet.
    ///
    /// A connection with a buffered request reports itself readable without
    /// touching the socket. Errors surface as readiness so the following
    /// read or write call reports them.
    pub fn poll_ready(&self, cx: &mut Context<'_>) -> Ready {
        let mut ready = Ready::default();

        if self.has_pending_output() {
            ready.writable = self.stream.poll_write_ready(cx).is_ready();
        }

        if self.requests.has_request() {
            ready.readable = true;
        } else if self.wants_read() {
            ready.readable = self.stream.poll_read_ready(cx).is_ready();
        }

        ready
    }

    /// Returns the next request, reading from the socket at most once.
    ///
    /// Returns `Ok(None)` when the socket had nothing to offer yet.
    pub fn read_request(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        if !self.requests.has_request() {
            self.fill()?;
        }
        Ok(self.requests.next_request())
    }

    /// One bounded, non-blocking read into the request buffer.
    fn fill(&mut self) -> Result<(), ConnectionError> {
        let mut chunk = [0u8; REQUEST_BUFFER_CAPACITY];
        let len = self.requests.spare().min(chunk.len());
        if len == 0 {
            return Ok(());
        }

        match self.stream.try_read(&mut chunk[..len]) {
            Ok(0) => {
                trace!(conn = %self.id, "End of stream");
                self.requests.mark_eof();
            }
            Ok(n) => {
                self.requests.extend(&chunk[..n]);
                self.stats.bytes_read(n);
                trace!(conn = %self.id, bytes = n, buffered = self.requests.len(), "Read data");
            }
            Err(e) if is_transient(&e) => {}
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Queues a reply and writes as much as the socket accepts right now.
    pub fn send(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        reply.serialize_into(&mut self.outbound);
        if self.outbound.len() > MAX_PENDING_OUTPUT {
            return Err(ConnectionError::OutputOverflow(self.outbound.len()));
        }
        self.flush()
    }

    /// Writes queued output until it is gone or the socket would block.
    pub fn flush(&mut self) -> Result<(), ConnectionError> {
        while !self.outbound.is_empty() {
            match self.stream.try_write(&self.outbound) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => {
                    self.outbound.advance(n);
                    self.stats.bytes_written(n);
                    trace!(conn = %self.id, bytes = n, pending = self.outbound.len(), "Sent data");
                }
                Err(e) if is_transient(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Closes the connection.
    ///
    /// Queued output gets one last non-blocking flush, then the socket is
    /// shut down and dropped. A failure here is logged and the socket is
    /// abandoned; nothing is retried.
    pub fn close(mut self, cause: Disconnect) {
        match &cause {
            Disconnect::Requested(_) => {
                info!(client = %self.addr, conn = %self.id, reason = %cause, "Client disconnected")
            }
            Disconnect::Failed(e) if e.is_reset() => {
                warn!(client = %self.addr, conn = %self.id, error = %e, "Connection reset by client")
            }
            Disconnect::Failed(e) => {
                warn!(client = %self.addr, conn = %self.id, error = %e, "Connection error")
            }
        }

        let failing = matches!(cause, Disconnect::Failed(_));
        let result = self.flush().and_then(|()| {
            let stream = self.stream.into_std()?;
            stream.shutdown(Shutdown::Both)?;
            Ok(())
        });

        if let Err(e) = result {
            if failing {
                warn!(client = %self.addr, conn = %self.id, error = %e, "Another error while closing, abandoning connection");
            } else {
                debug!(client = %self.addr, conn = %self.id, error = %e, "Error while closing connection");
            }
        }

        self.stats.connection_closed();
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// The client stopped reading its replies
    #[error("pending output limit exceeded: {0} bytes")]
    OutputOverflow(usize),
}

impl ConnectionError {
    /// Returns true if the peer reset or abandoned the connection.
    pub fn is_reset(&self) -> bool {
        match self {
            ConnectionError::IoError(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionAborted
            ),
            ConnectionError::OutputOverflow(_) => false,
        }
    }
}
