//! Information service façade
//!
//! [`RestServer`] owns the listener, the request queue and every piece of
//! state the answers are computed from. It lives on the application thread
//! next to the domain model. Session threads get a cloned [`RequestHandler`]
//! and nothing else.
//!
//! ## Answering a request
//!
//! | step | thread | call |
//! |------|--------|------|
//! | 1 | session | [`RequestHandler::on_http_request`] enqueues and waits |
//! | 2 | application | [`RestServer::drain_one_if_any`] dequeues and dispatches |
//! | 3 | application | the answer is signalled on the request's reply channel |
//! | 4 | session | wakes up, or gives up after the ceiling with a timeout text |
//!
//! Failures while computing an answer, including panics in domain code, are
//! turned into an `Error (MeOS): ...` text. The request is always signalled.

pub mod dispatch;
mod listener;

pub use dispatch::{classify, DispatchError, Verb, ERROR_PREFIX, LOGO_PNG};

use crate::cache::{ImageCache, RenderCache};
use crate::config::ServiceConfig;
use crate::domain::{DomainModel, ListConfiguration, RenderedList};
use crate::metrics::{LedgerSnapshot, ResponseTimeLedger};
use crate::queue::{Answer, Parameters, RequestQueue};
use crate::{Error, Result};
use dispatch::Dispatcher;
use listener::Listener;
use log::{debug, error, info, warn};
use std::any::Any;
use std::net::{Ipv4Addr, SocketAddr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// URL path the service answers on; `/` is treated the same
pub const RESOURCE_PATH: &str = "/meos";

/// Answer given to a session whose request was not served within the ceiling
pub const TIMEOUT_ANSWER: &str = "Error (MeOS): Internal timeout";

/// Network-side entry point, cheap to clone into session threads
#[derive(Debug, Clone)]
pub struct RequestHandler {
    queue: Arc<RequestQueue>,
    ceiling: Duration,
}

impl RequestHandler {
    /// Enqueue a request and block until it is answered or the ceiling elapses
    ///
    /// Never touches the domain model. On timeout the request stays queued;
    /// it is still answered later, but the answer is discarded.
    pub fn on_http_request(&self, parameters: Parameters) -> Answer {
        let mut handle = self.queue.enqueue(parameters);
        if handle.await_completion(self.ceiling) {
            if let Some(answer) = handle.take_answer() {
                return answer;
            }
        }
        warn!(
            "Request {} not answered within {:?}",
            handle.id(),
            self.ceiling
        );
        Answer::Text(TIMEOUT_ANSWER.to_string())
    }

    /// Time a session waits for its answer
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }
}

/// Snapshot of service counters for an operator display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Requests answered since the server was created
    pub served: u64,
    /// Requests waiting in the queue
    pub pending: usize,
    /// Response times of the most recent requests
    pub response: LedgerSnapshot,
}

/// Information service state, owned by the application thread
#[derive(Debug)]
pub struct RestServer {
    config: ServiceConfig,
    queue: Arc<RequestQueue>,
    listener: Option<Listener>,
    dispatcher: Dispatcher,
    ledger: ResponseTimeLedger,
}

impl RestServer {
    /// Create a stopped server
    ///
    /// # Panics
    ///
    /// Panics if `config.ledger_capacity` is 0
    pub fn new(config: ServiceConfig) -> Self {
        let ledger = ResponseTimeLedger::with_capacity(config.ledger_capacity);
        Self {
            config,
            queue: Arc::new(RequestQueue::new()),
            listener: None,
            dispatcher: Dispatcher::default(),
            ledger,
        }
    }

    /// Start listening on all interfaces at `port`
    ///
    /// Port 0 picks a free port; the bound address is returned.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRunning`] if the listener is running, [`Error::Bind`]
    /// if the port cannot be bound.
    pub fn start_service(&mut self, port: u16) -> Result<SocketAddr> {
        if self.listener.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = Listener::bind(addr, self.handler())?;
        let bound = listener.local_addr();
        self.listener = Some(listener);
        info!("Information service listening on {}", bound);
        Ok(bound)
    }

    /// Address of the running listener
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(Listener::local_addr)
    }

    /// Whether the listener is running
    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    /// Stop the listener; does nothing if it is not running
    ///
    /// Requests still queued stay queued and can be drained.
    pub fn stop(&mut self) -> Result<()> {
        match self.listener.take() {
            Some(listener) => {
                let addr = listener.local_addr();
                listener.shutdown()?;
                info!("Information service on {} stopped", addr);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Handler for network sessions sharing this server's queue
    pub fn handler(&self) -> RequestHandler {
        RequestHandler {
            queue: Arc::clone(&self.queue),
            ceiling: self.config.ceiling,
        }
    }

    /// Answer the oldest pending request, if any
    ///
    /// Must be called from the thread owning `model`. Returns whether a
    /// request was processed.
    pub fn drain_one_if_any<M: DomainModel + ?Sized>(&mut self, model: &mut M) -> bool {
        let Some(request) = self.queue.dequeue_one() else {
            return false;
        };
        let id = request.id();

        let dispatcher = &mut self.dispatcher;
        let config = &self.config;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            dispatcher.answer(config, model, request.parameters())
        }));
        let answer = match outcome {
            Ok(Ok(answer)) => answer,
            Ok(Err(err)) => {
                debug!("Request {} failed: {}", id, err);
                err.to_answer()
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Request {} panicked: {}", id, message);
                DispatchError::Internal(message).to_answer()
            }
        };

        let arrived = request.arrived();
        if !request.signal_completion(answer) {
            debug!("Request {} answered after its session gave up", id);
        }
        self.ledger.record(arrived.elapsed());
        true
    }

    /// Drop rendered lists and cached images, e.g. after loading another event
    pub fn clear_caches(&mut self) {
        self.dispatcher.lists.clear();
        self.dispatcher.images.clear();
    }

    /// Counters for an operator display
    pub fn statistics(&self) -> Statistics {
        Statistics {
            served: self.ledger.total_recorded(),
            pending: self.queue.len(),
            response: self.ledger.snapshot(),
        }
    }

    /// Register a page template answered for `page=<tag>`
    ///
    /// `{{event}}` and `{{date}}` are replaced by the loaded event's values.
    pub fn register_page(&mut self, tag: impl Into<String>, template: impl Into<String>) {
        self.dispatcher.pages.insert(tag.into(), template.into());
    }

    /// Service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Rendered-list cache
    pub fn list_cache(&self) -> &RenderCache<ListConfiguration, RenderedList> {
        &self.dispatcher.lists
    }

    /// Image cache
    pub fn image_cache(&self) -> &ImageCache {
        &self.dispatcher.images
    }
}

impl Drop for RestServer {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("Failed to stop information service: {}", err);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
