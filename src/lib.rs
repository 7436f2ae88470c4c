//! # restbridge
//!
//! A cross-thread request/response bridge that lets an HTTP information service
//! answer any number of concurrent network clients from a domain model that may
//! only be touched by one application thread.
//!
//! ## Components
//!
//! - **Request queue**: unbounded FIFO of pending requests with a lock-free "has work" hint
//! - **Rendezvous**: each request carries a one-shot reply channel the network thread waits on
//! - **Render cache**: rendered list descriptions keyed by structural list configuration
//! - **Image cache**: raw image payloads keyed by a short request token
//! - **Response-time ledger**: bounded ring of recent latencies for a status display
//! - **RestServer**: listener lifecycle, HTTP handler and the single-threaded drain step
//!
//! ## Threading model
//!
//! Network sessions run on their own short-lived threads and only ever call
//! [`RequestHandler::on_http_request`]. The application thread owns the
//! [`RestServer`] together with the domain model and calls
//! [`RestServer::drain_one_if_any`] from its periodic timer:
//!
//! ```text
//! session thread                      application thread
//! --------------                      ------------------
//! enqueue(parameters)  ---- queue --->  dequeue_one()
//! await_completion(10s)                 dispatch(model)
//!                      <--- reply ----  signal_completion(answer)
//! write HTTP response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use restbridge::{domain::MemoryEvent, Parameters, RestServer, ServiceConfig};
//! use std::thread;
//!
//! let mut server = RestServer::new(ServiceConfig::default());
//! let handler = server.handler();
//! let mut event = MemoryEvent::new("Spring Cup");
//!
//! let client = thread::spawn(move || {
//!     handler.on_http_request(Parameters::from_pairs([("get", "status")]))
//! });
//! while !server.drain_one_if_any(&mut event) {
//!     thread::yield_now();
//! }
//! let answer = client.join().unwrap();
//! assert!(answer.as_text().unwrap().contains("Spring Cup"));
//! ```

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod cache;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod payload;
pub mod queue;
pub mod server;

pub use crate::config::{ClassPolicy, EntrantPolicy, EntryPermission, ServiceConfig};
pub use crate::queue::{Answer, CompletedRequest, Parameters, RequestHandle, RequestQueue};
pub use crate::server::{RequestHandler, RestServer, Statistics};

use std::net::SocketAddr;
use thiserror::Error;

/// Error types for service lifecycle and configuration
#[derive(Debug, Error)]
pub enum Error {
    /// `start_service` was called while the listener is running
    #[error("information service is already running")]
    AlreadyRunning,
    /// The listener could not bind its socket
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// Requested listen address
        addr: SocketAddr,
        /// Reason reported by the listener
        reason: String,
    },
    /// The listener thread could not be spawned
    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The listener thread panicked before it could be joined
    #[error("listener thread panicked")]
    ListenerPanicked,
    /// A configuration value could not be parsed
    #[error("invalid {what}: '{value}'")]
    InvalidConfig {
        /// Name of the setting
        what: &'static str,
        /// Offending value
        value: String,
    },
}

/// Result type for restbridge operations
pub type Result<T> = std::result::Result<T, Error>;
