//! Server Module
//!
//! The server is one [`EventLoop`] running on one thread. It multiplexes
//! the listening socket and all client sockets through readiness polling,
//! so no connection ever waits on another and the store needs no locks.
//!
//! ## Example
//!
//! ```no_run
//! use selectkv::server::EventLoop;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let server = EventLoop::bind("127.0.0.1:3000").await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod event_loop;

pub use event_loop::{Event, EventLoop, ServerError};
