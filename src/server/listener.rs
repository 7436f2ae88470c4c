//! HTTP listener built on `tiny_http`
//!
//! One accept thread hands every incoming request to its own short-lived
//! session thread, which blocks in [`RequestHandler::on_http_request`] until
//! the application thread has produced the answer.

use super::{RequestHandler, RESOURCE_PATH};
use crate::queue::{Answer, Parameters};
use crate::{Error, Result};
use log::{debug, error, trace, warn};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Request, Response, Server};

/// Running accept loop
pub(crate) struct Listener {
    server: Arc<Server>,
    addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("addr", &self.addr)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl Listener {
    /// Bind `addr` and start accepting connections
    pub(crate) fn bind(addr: SocketAddr, handler: RequestHandler) -> Result<Self> {
        let server = Server::http(addr).map_err(|err| Error::Bind {
            addr,
            reason: err.to_string(),
        })?;
        let bound = server.server_addr().to_ip().unwrap_or(addr);
        let server = Arc::new(server);

        let accept = Arc::clone(&server);
        let thread = thread::Builder::new()
            .name("restListener".to_string())
            .spawn(move || accept_loop(&accept, &handler))?;

        Ok(Self {
            server,
            addr: bound,
            thread: Some(thread),
        })
    }

    /// Address the listener is bound to
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and join the accept thread
    ///
    /// Session threads already running finish on their own.
    pub(crate) fn shutdown(mut self) -> Result<()> {
        self.server.unblock();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| Error::ListenerPanicked),
            None => Ok(()),
        }
    }
}

fn accept_loop(server: &Server, handler: &RequestHandler) {
    for request in server.incoming_requests() {
        let handler = handler.clone();
        let spawned = thread::Builder::new()
            .name("restSession".to_string())
            .spawn(move || serve(request, &handler));
        // A request dropped with the failed closure is answered 500 by tiny_http
        if let Err(err) = spawned {
            error!("Failed to spawn session thread: {}", err);
        }
    }
    debug!("Listener stopped accepting connections");
}

fn is_resource_path(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    path.is_empty() || path == RESOURCE_PATH
}

fn serve(request: Request, handler: &RequestHandler) {
    let url = request.url().to_string();
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    trace!("{} {}", request.method(), url);

    let (status, answer) = if is_resource_path(path) {
        (200, handler.on_http_request(Parameters::parse_query(query)))
    } else {
        (404, Answer::Text(format!("Not found: {}", path)))
    };

    let content_type = answer.content_type();
    let body = answer.as_bytes().to_vec();
    let length = body.len();
    let mut response = Response::from_data(body).with_status_code(status);
    for (name, value) in [
        ("Content-Type", content_type),
        ("Access-Control-Allow-Origin", "*"),
    ] {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }

    match request.respond(response) {
        Ok(()) => debug!("{} -> {} ({} bytes)", url, status, length),
        Err(err) => warn!("Failed to write response for {}: {}", url, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        assert!(is_resource_path("/"));
        assert!(is_resource_path("/meos"));
        assert!(is_resource_path("/meos/"));
        assert!(!is_resource_path("/favicon.ico"));
        assert!(!is_resource_path("/meosx"));
    }
}
