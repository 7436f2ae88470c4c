//! Unbounded FIFO request queue between network sessions and the application thread
//!
//! ## Design
//!
//! Producers are the network session threads; there is exactly one consumer,
//! the application thread that owns the domain model. The queue is a
//! `VecDeque` behind a single `parking_lot::Mutex`; the lock fixes one total
//! arrival order, and the sequence number is drawn under the same lock so that
//! `id` order equals queue order.
//!
//! The `has_work` flag lets the consumer skip the lock on an empty queue:
//!
//! ```text
//! Producer (enqueue)                 Consumer (dequeue_one)
//! ------------------                 ----------------------
//! lock                               load has_work (Acquire)   -- false: return
//! push_back                          lock
//! store has_work = true (Release)    pop_front
//! unlock                             store has_work = !empty
//!                                    unlock
//! ```
//!
//! The hint can be stale for one tick; the drain step runs again shortly, so
//! a missed hint only delays a request, it never loses one.

use super::request::{request_pair, CompletedRequest, Parameters, RequestHandle};
use log::trace;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct Pending {
    requests: VecDeque<CompletedRequest>,
    next_id: u64,
}

/// Unbounded, mutex-protected FIFO of pending requests
///
/// # Examples
///
/// ```rust
/// use restbridge::{Answer, Parameters, RequestQueue};
/// use std::time::Duration;
///
/// let queue = RequestQueue::new();
/// let mut handle = queue.enqueue(Parameters::from_pairs([("get", "status")]));
///
/// let request = queue.dequeue_one().unwrap();
/// assert_eq!(request.parameters().get("get"), Some("status"));
/// request.signal_completion(Answer::Text("ok".to_string()));
///
/// assert!(handle.await_completion(Duration::from_secs(1)));
/// assert_eq!(handle.take_answer(), Some(Answer::Text("ok".to_string())));
/// ```
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Mutex<Pending>,
    has_work: AtomicBool,
}

impl RequestQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new request and return the handle the caller waits on
    ///
    /// Thread-safe; blocks only for the lock hold time.
    pub fn enqueue(&self, parameters: Parameters) -> RequestHandle {
        let mut pending = self.pending.lock();
        let id = pending.next_id;
        pending.next_id += 1;
        let (request, handle) = request_pair(id, parameters);
        pending.requests.push_back(request);
        self.has_work.store(true, Ordering::Release);
        drop(pending);

        trace!("request {} enqueued", id);
        handle
    }

    /// Pop the oldest pending request, if any
    ///
    /// Intended for the single application thread.
    pub fn dequeue_one(&self) -> Option<CompletedRequest> {
        if !self.has_work.load(Ordering::Acquire) {
            return None;
        }

        let mut pending = self.pending.lock();
        let request = pending.requests.pop_front();
        self.has_work
            .store(!pending.requests.is_empty(), Ordering::Release);
        request
    }

    /// Lock-free hint that requests may be pending
    pub fn has_work(&self) -> bool {
        self.has_work.load(Ordering::Acquire)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.pending.lock().requests.len()
    }

    /// Whether no request is pending
    pub fn is_empty(&self) -> bool {
        self.pending.lock().requests.is_empty()
    }

    /// Total number of requests ever enqueued
    pub fn total_enqueued(&self) -> u64 {
        self.pending.lock().next_id
    }
}
