//! Readiness Event Loop
//!
//! One task owns the listening socket, every client connection and the
//! store. Each turn of the loop:
//!
//! 1. Waits until at least one socket is ready. This is the only place the
//!    loop suspends.
//! 2. Collects every ready socket into a snapshot `Vec<Event>`.
//! 3. Processes the snapshot once, in order: accept, flush, or handle one
//!    request.
//!
//! The connection table is only modified while the snapshot is processed,
//! never while readiness is being collected. Each event is handled exactly
//! once per turn.
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │  poll_events(): listener +   │
//!   ┌───────>│  every connection            │  (suspends here)
//!   │        └──────────────┬───────────────┘
//!   │                       │ Vec<Event>
//!   │                       ▼
//!   │        ┌──────────────────────────────┐
//!   │        │ Accepted  -> new Connection  │
//!   │        │ Writable  -> flush           │
//!   │        │ Readable  -> parse, execute, │
//!   │        │              reply or close  │
//!   │        └──────────────┬───────────────┘
//!   └───────────────────────┘
//! ```
//!
//! A slow or silent client only delays itself: reads and writes never
//! wait, and a client that stops reading its replies stops being read.
//! After a failed accept the listener is left alone for a short while so a
//! persistent error such as running out of descriptors does not spin.

use crate::commands::{CloseReason, CommandHandler, Outcome};
use crate::connection::{Connection, ConnectionId, ConnectionStats, Disconnect};
use crate::protocol::Command;
use crate::storage::{StorageEngine, StorageStats};
use std::collections::HashMap;
use std::future::{poll_fn, Future};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Sleep;
use tracing::{debug, error, info, trace};

/// How long the listener is left alone after a failed accept
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Something the loop must react to.
#[derive(Debug)]
pub enum Event {
    /// The listener produced a new client
    Accepted(TcpStream, SocketAddr),
    /// The listener reported an error
    AcceptFailed(io::Error),
    /// A connection has queued output and the socket takes more
    Writable(ConnectionId),
    /// A connection has input or a buffered request
    Readable(ConnectionId),
}

/// The single-threaded server.
#[derive(Debug)]
pub struct EventLoop {
    listener: TcpListener,

    /// Every open connection, keyed by id
    connections: HashMap<ConnectionId, Connection>,

    /// Executes commands; owns the store
    handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Set after a failed accept; the listener is not polled until it fires
    accept_pause: Option<Pin<Box<Sleep>>>,

    next_id: u64,
}

impl EventLoop {
    /// Binds the listening socket.
    ///
    /// A failure here is fatal: the server must not start serving.
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self::from_listener(listener))
    }

    /// Builds a loop around an already bound listener with an empty store.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            listener,
            connections: HashMap::new(),
            handler: CommandHandler::new(StorageEngine::new()),
            stats: Arc::new(ConnectionStats::new()),
            accept_pause: None,
            next_id: 0,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Store operation counters.
    pub fn storage_stats(&self) -> StorageStats {
        self.handler.stats()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Runs until the process is terminated.
    pub async fn run(mut self) {
        info!("Event loop started");
        loop {
            self.turn().await;
        }
    }

    /// Waits for readiness once and processes everything that was ready.
    pub async fn turn(&mut self) {
        let this = &mut *self;
        // Opt out of cooperative budgeting so every socket is polled each turn.
        let events = tokio::task::unconstrained(poll_fn(|cx| this.poll_events(cx))).await;
        trace!(events = events.len(), "Readiness snapshot");

        for event in events {
            self.process(event);
        }
    }

    /// Polls the listener and every connection.
    ///
    /// Resolves to the snapshot of everything ready, or registers the
    /// task's waker with every socket and returns `Pending`.
    pub fn poll_events(&mut self, cx: &mut Context<'_>) -> Poll<Vec<Event>> {
        let mut events = Vec::new();

        let paused = self
            .accept_pause
            .as_mut()
            .is_some_and(|pause| pause.as_mut().poll(cx).is_pending());
        if !paused {
            self.accept_pause = None;
            match self.listener.poll_accept(cx) {
                Poll::Ready(Ok((stream, addr))) => events.push(Event::Accepted(stream, addr)),
                Poll::Ready(Err(e)) => events.push(Event::AcceptFailed(e)),
                Poll::Pending => {}
            }
        }

        for (id, conn) in &self.connections {
            let ready = conn.poll_ready(cx);
            if ready.writable {
                events.push(Event::Writable(*id));
            }
            if ready.readable {
                events.push(Event::Readable(*id));
            }
        }

        if events.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(events)
        }
    }

    fn process(&mut self, event: Event) {
        match event {
            Event::Accepted(stream, addr) => self.accept(stream, addr),
            Event::AcceptFailed(e) => {
                error!(error = %e, "Failed to accept connection, pausing accepts");
                self.accept_pause = Some(Box::pin(tokio::time::sleep(ACCEPT_BACKOFF)));
            }
            Event::Writable(id) => self.handle_write(id),
            Event::Readable(id) => self.handle_read(id),
        }
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        info!(client = %addr, conn = %id, "Client connected");
        let conn = Connection::new(id, stream, addr, Arc::clone(&self.stats));
        self.connections.insert(id, conn);
    }

    fn handle_write(&mut self, id: ConnectionId) {
        // Closed earlier in this turn
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };

        if let Err(e) = conn.flush() {
            self.close(id, Disconnect::Failed(e));
        }
    }

    /// Reads at most one request from a connection and executes it.
    fn handle_read(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };

        let request = match conn.read_request() {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => return self.close(id, Disconnect::Failed(e)),
        };

        let command = Command::parse(request);
        debug!(conn = %id, command = %command, "Received request");

        match self.handler.execute(command) {
            Outcome::Reply(reply) => {
                self.stats.command_processed();
                if let Err(e) = conn.send(&reply) {
                    self.close(id, Disconnect::Failed(e));
                }
            }
            Outcome::Close(reason) => {
                if reason != CloseReason::EmptyRequest {
                    self.stats.command_processed();
                }
                self.close(id, Disconnect::Requested(reason));
            }
        }
    }

    fn close(&mut self, id: ConnectionId, cause: Disconnect) {
        if let Some(conn) = self.connections.remove(&id) {
            conn.close(cause);
        }
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio_test::assert_pending;

    async fn create_test_server() -> (SocketAddr, Arc<ConnectionStats>) {
        let server = EventLoop::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let stats = server.stats();

        tokio::spawn(server.run());

        (addr, stats)
    }

    struct TestClient {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, writer) = stream.into_split();
            Self {
                reader: BufReader::new(reader),
                writer,
            }
        }

        async fn send(&mut self, data: &str) {
            self.writer.write_all(data.as_bytes()).await.unwrap();
        }

        async fn read_line(&mut self) -> String {
            let mut line = String::new();
            tokio::time::timeout(Duration::from_secs(2), self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for a reply")
                .unwrap();
            line
        }

        async fn request(&mut self, data: &str) -> String {
            self.send(data).await;
            self.read_line().await
        }

        /// Asserts the server closed the connection without sending anything.
        async fn assert_closed(&mut self) {
            let mut buf = [0u8; 64];
            let n = tokio::time::timeout(Duration::from_secs(2), self.reader.read(&mut buf))
                .await
                .expect("timed out waiting for close")
                .unwrap();
            assert_eq!(n, 0, "unexpected data: {:?}", &buf[..n]);
        }
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let err = EventLoop::bind(&addr).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().contains(&addr));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        assert_eq!(client.request("GET a\n").await, "\n");
        assert_eq!(client.request("GET b\n").await, "\n");
    }

    #[tokio::test]
    async fn test_full_scenario() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        assert_eq!(client.request("SET foo bar\n").await, "OK\n");
        assert_eq!(client.request("GET foo\n").await, "bar\n");
        assert_eq!(client.request("INCR counter\n").await, "1\n");
        assert_eq!(client.request("INCR counter\n").await, "2\n");
        assert_eq!(client.request("DEL foo\n").await, "1\n");
        assert_eq!(client.request("GET foo\n").await, "\n");
        assert_eq!(client.request("DEL foo\n").await, "0\n");

        client.send("foo de fafa\n").await;
        client.assert_closed().await;
    }

    #[tokio::test]
    async fn test_error_replies_keep_connection_open() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        assert_eq!(client.request("SET lonely\n").await, "ERROR\n");
        assert_eq!(client.request("SET word hello\n").await, "OK\n");
        assert_eq!(
            client.request("INCR word\n").await,
            "ERR value is not an integer or out of range\n"
        );
        assert_eq!(client.request("GET word\n").await, "hello\n");
        assert_eq!(client.request("DEL\n").await, "\n");
    }

    #[tokio::test]
    async fn test_quit_closes_without_reply() {
        let (addr, stats) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        assert_eq!(client.request("SET a b\n").await, "OK\n");
        client.send("QUIT\n").await;
        client.assert_closed().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_empty_request_closes_without_reply() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        client.send("\n").await;
        client.assert_closed().await;
    }

    #[tokio::test]
    async fn test_unknown_input_is_echoed() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        assert_eq!(client.request("hello world\n").await, "hello world\n");
        assert_eq!(client.request("get lowercase\r\n").await, "get lowercase\n");
    }

    #[tokio::test]
    async fn test_pipelined_requests() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        client.send("SET k1 v1\nSET k2 v2\nGET k1\nGET k2\n").await;

        assert_eq!(client.read_line().await, "OK\n");
        assert_eq!(client.read_line().await, "OK\n");
        assert_eq!(client.read_line().await, "v1\n");
        assert_eq!(client.read_line().await, "v2\n");
    }

    #[tokio::test]
    async fn test_request_split_across_writes() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        client.send("SET sp").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.send("lit value\n").await;

        assert_eq!(client.read_line().await, "OK\n");
        assert_eq!(client.request("GET split\n").await, "value\n");
    }

    #[tokio::test]
    async fn test_oversized_request_is_bounded() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        let long = "x".repeat(300);
        client.send(&format!("{}\n", long)).await;

        // The first 256 bytes are one request; the rest of the line is dropped
        assert_eq!(client.read_line().await, format!("{}\n", "x".repeat(256)));
        assert_eq!(client.request("GET k\n").await, "\n");
    }

    #[tokio::test]
    async fn test_request_filling_buffer_exactly_keeps_connection_open() {
        let (addr, _) = create_test_server().await;
        let mut client = TestClient::connect(addr).await;

        let value = "v".repeat(250);
        assert_eq!(client.request(&format!("SET k {}\n", value)).await, "OK\n");
        assert_eq!(client.request("GET k\n").await, format!("{}\n", value));

        let value = "w".repeat(249);
        assert_eq!(client.request(&format!("SET k {}\r\n", value)).await, "OK\n");
        assert_eq!(client.request("GET k\n").await, format!("{}\n", value));
    }

    #[tokio::test]
    async fn test_concurrent_clients_share_store() {
        let (addr, _) = create_test_server().await;
        let mut first = TestClient::connect(addr).await;
        let mut second = TestClient::connect(addr).await;

        assert_eq!(first.request("SET k v1\n").await, "OK\n");
        assert_eq!(second.request("SET k v2\n").await, "OK\n");

        assert_eq!(first.request("GET k\n").await, "v2\n");
        assert_eq!(second.request("GET k\n").await, "v2\n");
    }

    #[tokio::test]
    async fn test_simultaneous_writers_get_every_reply() {
        let (addr, _) = create_test_server().await;
        let mut first = TestClient::connect(addr).await;
        let mut second = TestClient::connect(addr).await;

        first.send("SET k v1\n").await;
        second.send("SET k v2\n").await;

        assert_eq!(first.read_line().await, "OK\n");
        assert_eq!(second.read_line().await, "OK\n");

        let value = first.request("GET k\n").await;
        assert!(value == "v1\n" || value == "v2\n");
    }

    #[tokio::test]
    async fn test_silent_client_does_not_block_others() {
        let (addr, _) = create_test_server().await;
        let _silent = TestClient::connect(addr).await;
        let mut partial = TestClient::connect(addr).await;
        let mut active = TestClient::connect(addr).await;

        partial.send("SET half").await;

        assert_eq!(active.request("INCR hits\n").await, "1\n");
        assert_eq!(active.request("INCR hits\n").await, "2\n");
    }

    #[tokio::test]
    async fn test_many_clients_increment_one_counter() {
        let (addr, _) = create_test_server().await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            tasks.push(tokio::spawn(async move {
                let mut client = TestClient::connect(addr).await;
                for _ in 0..10 {
                    let reply = client.request("INCR shared\n").await;
                    assert!(reply.trim_end().parse::<i64>().is_ok());
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut client = TestClient::connect(addr).await;
        assert_eq!(client.request("GET shared\n").await, "80\n");
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TestClient::connect(addr).await;

        // Give the server time to accept the connection
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        assert_eq!(client.request("SET a 1\n").await, "OK\n");

        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        // Close connection
        drop(client);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_turn_processes_one_request_per_connection() {
        let mut server = EventLoop::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let mut client = TestClient::connect(addr).await;
        server.turn().await;
        assert_eq!(server.connection_count(), 1);

        client.send("SET a 1\nSET b 2\n").await;

        // Each turn dispatches at most one request for this connection
        while server.storage_stats().sets < 1 {
            server.turn().await;
        }
        assert_eq!(server.storage_stats().sets, 1);

        while server.storage_stats().sets < 2 {
            server.turn().await;
        }
        assert_eq!(server.storage_stats().sets, 2);

        assert_eq!(client.read_line().await, "OK\n");
        assert_eq!(client.read_line().await, "OK\n");
    }

    #[tokio::test]
    async fn test_wait_is_pending_until_a_client_arrives() {
        let mut server = EventLoop::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let mut wait = tokio_test::task::spawn(poll_fn(|cx| server.poll_events(cx)));
        assert_pending!(wait.poll());

        let _client = TcpStream::connect(addr).await.unwrap();

        let events = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Poll::Ready(events) = wait.poll() {
                    break events;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::Accepted(..)));
    }

    #[tokio::test]
    async fn test_failed_accept_pauses_listener() {
        let mut server = EventLoop::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        server.process(Event::AcceptFailed(io::Error::other("too many open files")));
        let _client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut wait = tokio_test::task::spawn(poll_fn(|cx| server.poll_events(cx)));
        assert_pending!(wait.poll());

        let events = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Poll::Ready(events) = wait.poll() {
                    break events;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(matches!(events[0], Event::Accepted(..)));
    }
}
