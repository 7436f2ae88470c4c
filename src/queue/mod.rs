//! Request queue and completion rendezvous
//!
//! This module is the only part of the crate with state shared across threads.
//!
//! ## Available Types
//!
//! - [`RequestQueue`]: unbounded FIFO filled by network sessions, drained by the application thread
//! - [`CompletedRequest`]: application-side half of a request, answered exactly once
//! - [`RequestHandle`]: network-side half of a request, waited on with a ceiling
//! - [`Parameters`]: ordered multi-map of query parameters
//! - [`Answer`]: text or image payload
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | FIFO | single lock around `VecDeque`, ids drawn under the lock |
//! | Exactly-once answer | `signal_completion` consumes the request |
//! | No lost wakeup | one-shot channel per request |
//! | Bounded wait | `recv_timeout(ceiling)` |
//!
//! ## Examples
//!
//! ```rust
//! use restbridge::queue::{Answer, Parameters, RequestQueue};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let queue = Arc::new(RequestQueue::new());
//!
//! let session = thread::spawn({
//!     let queue = Arc::clone(&queue);
//!     move || {
//!         let mut handle = queue.enqueue(Parameters::from_pairs([("get", "class")]));
//!         handle.await_completion(Duration::from_secs(10));
//!         handle.take_answer()
//!     }
//! });
//!
//! loop {
//!     if let Some(request) = queue.dequeue_one() {
//!         request.signal_completion(Answer::Text("<Classes/>".to_string()));
//!         break;
//!     }
//!     thread::yield_now();
//! }
//! assert_eq!(session.join().unwrap(), Some(Answer::Text("<Classes/>".to_string())));
//! ```
pub mod bridge;
pub mod request;

// Re-export main types for convenience
pub use bridge::RequestQueue;
pub use request::{Answer, CompletedRequest, Parameters, RequestHandle};


#[cfg(test)]
mod proptests;
