//! Request records shared between a network session and the application thread
//!
//! A request is split in two halves when it is enqueued:
//!
//! - [`CompletedRequest`] travels through the queue to the application thread,
//!   which fills in the answer exactly once by consuming it
//! - [`RequestHandle`] stays with the network thread, which blocks on it until
//!   the answer arrives or its ceiling elapses
//!
//! Both halves share the `completed` flag. The answer itself moves through a
//! one-shot channel, so the waiter never has to re-check a shared predicate.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use url::form_urlencoded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ordered multi-map of query parameters
///
/// Keys may repeat (`class=1&class=4`); insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    pairs: Vec<(String, String)>,
}

impl Parameters {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a parameter map from key/value pairs
    ///
    /// ```rust
    /// use restbridge::Parameters;
    ///
    /// let params = Parameters::from_pairs([("get", "competitor"), ("class", "2")]);
    /// assert_eq!(params.get("class"), Some("2"));
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse an `application/x-www-form-urlencoded` query string
    ///
    /// Both `+` and `%20` decode to a space. Invalid escapes are kept verbatim
    /// and invalid UTF-8 is replaced rather than rejected.
    pub fn parse_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(
            form_urlencoded::parse(query.as_bytes()).filter(|(key, _)| !key.is_empty()),
        )
    }

    /// Append a key/value pair
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values stored under `key`, in insertion order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` occurs at least once
    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Iterate over all pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the map has no pairs
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// The answer produced by the application thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// HTML or XML document
    Text(String),
    /// Raw PNG bytes
    Image(Arc<[u8]>),
}

impl Answer {
    /// Text body, if this is a text answer
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(text) => Some(text.as_str()),
            Answer::Image(_) => None,
        }
    }

    /// Body bytes as written to the HTTP response
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Answer::Text(text) => text.as_bytes(),
            Answer::Image(bytes) => &bytes[..],
        }
    }

    /// Whether the answer carries a binary image payload
    pub fn is_image(&self) -> bool {
        matches!(self, Answer::Image(_))
    }

    /// Content type to announce for this answer
    pub fn content_type(&self) -> &'static str {
        match self {
            Answer::Image(_) => "image/png",
            Answer::Text(text) if text.starts_with("<?xml") => "application/xml",
            Answer::Text(_) => "text/html; charset=utf-8",
        }
    }
}

/// Application-side half of a request
///
/// Owned by the queue until the drain step pops it. Consuming it with
/// [`signal_completion`](Self::signal_completion) is the only way to answer,
/// so an answer is written at most once.
#[derive(Debug)]
pub struct CompletedRequest {
    id: u64,
    parameters: Parameters,
    arrived: Instant,
    completed: Arc<AtomicBool>,
    reply: Sender<Answer>,
}

/// Network-side half of a request
#[derive(Debug)]
pub struct RequestHandle {
    id: u64,
    completed: Arc<AtomicBool>,
    reply: Receiver<Answer>,
    answer: Option<Answer>,
}

/// Create both halves of a request with sequence number `id`.
pub(crate) fn request_pair(id: u64, parameters: Parameters) -> (CompletedRequest, RequestHandle) {
    let (tx, rx) = bounded(1);
    let completed = Arc::new(AtomicBool::new(false));
    let request = CompletedRequest {
        id,
        parameters,
        arrived: Instant::now(),
        completed: Arc::clone(&completed),
        reply: tx,
    };
    let handle = RequestHandle {
        id,
        completed,
        reply: rx,
        answer: None,
    };
    (request, handle)
}

impl CompletedRequest {
    /// Arrival sequence number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Query parameters of the request
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Instant the request was enqueued
    pub fn arrived(&self) -> Instant {
        self.arrived
    }

    /// Whether the request has been answered
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Deliver the answer and mark the request completed
    ///
    /// Returns `false` when the network side already gave up waiting; the
    /// answer is discarded in that case but the request still counts as
    /// completed.
    pub fn signal_completion(self, answer: Answer) -> bool {
        self.completed.store(true, Ordering::Release);
        self.reply.send(answer).is_ok()
    }
}

impl RequestHandle {
    /// Arrival sequence number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the application thread has answered
    ///
    /// Once `true` this never goes back to `false`.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Block until the request is answered or `ceiling` elapses
    ///
    /// Returns `true` when the answer is available through
    /// [`take_answer`](Self::take_answer). Returns `false` on expiry, and
    /// early if the request was dropped unanswered (queue torn down), since no
    /// answer can arrive after that.
    pub fn await_completion(&mut self, ceiling: Duration) -> bool {
        if self.answer.is_some() {
            return true;
        }
        match self.reply.recv_timeout(ceiling) {
            Ok(answer) => {
                self.answer = Some(answer);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Take the received answer, if any
    pub fn take_answer(&mut self) -> Option<Answer> {
        self.answer.take()
    }
}
