//! Integration tests for restbridge
//!
//! These tests drive the bridge the way a host application does: network
//! sessions on their own threads, one application thread owning the model and
//! draining the queue.

use restbridge::domain::{
    Class, Club, Competitor, Control, DatabaseRunner, DomainError, DomainModel, EventStatus, Id,
    ListConfiguration, MemoryEvent, NewEntry, RenderedList, ResultRow, Team,
};
use restbridge::server::LOGO_PNG;
use restbridge::{Answer, Error, Parameters, RestServer, ServiceConfig};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run the application loop until every client thread has finished
fn drain_until_done<M: DomainModel, T>(
    server: &mut RestServer,
    model: &mut M,
    clients: Vec<JoinHandle<T>>,
) -> Vec<T> {
    while clients.iter().any(|client| !client.is_finished()) {
        if !server.drain_one_if_any(model) {
            thread::sleep(Duration::from_millis(1));
        }
    }
    clients
        .into_iter()
        .map(|client| client.join().unwrap())
        .collect()
}

fn ask(server: &mut RestServer, model: &mut impl DomainModel, pairs: &[(&str, &str)]) -> Answer {
    let handler = server.handler();
    let params = Parameters::from_pairs(pairs.iter().map(|&(k, v)| (k.to_string(), v.to_string())));
    let client = thread::spawn(move || handler.on_http_request(params));
    drain_until_done(server, model, vec![client]).remove(0)
}

/// Event model that fails on demand
struct FaultyEvent {
    inner: MemoryEvent,
    panic_on_status: bool,
}

impl DomainModel for FaultyEvent {
    fn status(&self) -> EventStatus {
        if self.panic_on_status {
            panic!("status computation failed");
        }
        self.inner.status()
    }

    fn classes(&self) -> Vec<Class> {
        self.inner.classes()
    }

    fn clubs(&self) -> Vec<Club> {
        self.inner.clubs()
    }

    fn controls(&self) -> Vec<Control> {
        self.inner.controls()
    }

    fn competitors(&self) -> Vec<Competitor> {
        self.inner.competitors()
    }

    fn teams(&self) -> Vec<Team> {
        self.inner.teams()
    }

    fn results(&self, _classes: &[Id]) -> Result<Vec<ResultRow>, DomainError> {
        Err(DomainError::Other("result database offline".to_string()))
    }

    fn render_list(&self, config: &ListConfiguration) -> Result<RenderedList, DomainError> {
        self.inner.render_list(config)
    }

    fn image(&self, id: u64) -> Result<Vec<u8>, DomainError> {
        self.inner.image(id)
    }

    fn runner_database(&self, name: Option<&str>, card: Option<u32>) -> Option<DatabaseRunner> {
        self.inner.runner_database(name, card)
    }

    fn add_competitor(&mut self, entry: &NewEntry) -> Result<Competitor, DomainError> {
        self.inner.add_competitor(entry)
    }
}

#[test]
fn test_status_without_event() {
    init_logging();
    let mut server = RestServer::new(ServiceConfig::default());
    let mut event = MemoryEvent::empty();

    let handler = server.handler();
    let client = thread::spawn(move || handler.on_http_request(Parameters::parse_query("get=status")));
    let answer = drain_until_done(&mut server, &mut event, vec![client]).remove(0);

    let text = answer.as_text().unwrap();
    assert!(text.contains("No event"));
    assert!(text.contains("Not using a shared database"));
    assert_eq!(server.statistics().served, 1);
}

#[test]
fn test_logo_loaded_once() {
    init_logging();
    let mut server = RestServer::new(ServiceConfig::default());
    let mut event = MemoryEvent::new("Spring Cup");

    let first = ask(&mut server, &mut event, &[("image", "meos")]);
    let second = ask(&mut server, &mut event, &[("image", "meos")]);

    assert!(first.is_image());
    assert_eq!(first, second);
    assert_eq!(first.as_bytes(), LOGO_PNG);
    assert_eq!(server.image_cache().loads(), 1);
}

#[test]
fn test_entry_refused_when_closed() {
    init_logging();
    let mut server = RestServer::new(ServiceConfig::default());
    let mut event = MemoryEvent::new("Spring Cup");
    let class = event.add_class("Open", true).to_string();

    let answer = ask(
        &mut server,
        &mut event,
        &[
            ("entry", ""),
            ("name", "Anna Berg"),
            ("club", "OK Linné"),
            ("class", &class),
            ("card", "123456"),
        ],
    );

    assert!(answer.as_text().unwrap().contains("Permission denied"));
    assert_eq!(event.entries_added(), 0);
    assert!(event.competitors().is_empty());
    assert!(event.clubs().is_empty());
}

#[test]
fn test_failed_and_panicking_requests_do_not_poison() {
    init_logging();
    let mut server = RestServer::new(ServiceConfig::default());
    let mut event = FaultyEvent {
        inner: MemoryEvent::new("Spring Cup"),
        panic_on_status: true,
    };
    event.inner.add_class("H21", false);

    let handler = server.handler();
    let barrier = Arc::new(Barrier::new(2));
    let queued = Arc::clone(&barrier);
    let first = thread::spawn({
        let handler = handler.clone();
        move || {
            let answer = handler.on_http_request(Parameters::from_pairs([("get", "status")]));
            queued.wait();
            answer
        }
    });

    // Wait until the panicking request is queued so the order is fixed
    while server.statistics().pending == 0 {
        thread::yield_now();
    }
    let second = thread::spawn({
        let handler = handler.clone();
        move || handler.on_http_request(Parameters::from_pairs([("get", "class")]))
    });
    while server.statistics().pending < 2 {
        thread::yield_now();
    }
    let third = thread::spawn(move || handler.on_http_request(Parameters::from_pairs([("get", "result")])));

    assert!(server.drain_one_if_any(&mut event));
    barrier.wait();
    let answers = drain_until_done(&mut server, &mut event, vec![first, second, third]);

    assert_eq!(
        answers[0].as_text(),
        Some("Error (MeOS): Internal error: status computation failed")
    );
    assert!(answers[1].as_text().unwrap().contains(">H21</Class>"));
    assert_eq!(
        answers[2].as_text(),
        Some("Error (MeOS): result database offline")
    );
    assert_eq!(server.statistics().served, 3);
}

#[test]
fn test_concurrent_sessions_all_answered() {
    init_logging();
    let mut server = RestServer::new(ServiceConfig::default());
    let mut event = MemoryEvent::new("Spring Cup");
    for name in ["H21", "D21", "H35"] {
        event.add_class(name, false);
    }

    let num_threads = 8;
    let requests_per_thread = 25;
    let barrier = Arc::new(Barrier::new(num_threads));
    let clients: Vec<_> = (0..num_threads)
        .map(|_| {
            let handler = server.handler();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..requests_per_thread)
                    .map(|i| {
                        let what = if i % 2 == 0 { "status" } else { "class" };
                        handler.on_http_request(Parameters::from_pairs([("get", what)]))
                    })
                    .filter(|answer| !answer.as_text().unwrap_or_default().starts_with("Error"))
                    .count()
            })
        })
        .collect();

    let answered = drain_until_done(&mut server, &mut event, clients);
    assert!(answered.iter().all(|&n| n == requests_per_thread));

    let stats = server.statistics();
    assert_eq!(stats.served, (num_threads * requests_per_thread) as u64);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.response.count, 100);
}

fn http_get(addr: SocketAddr, target: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(15)))
        .unwrap();
    write!(
        stream,
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        target
    )
    .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn test_http_round_trip() {
    init_logging();
    let mut server = RestServer::new(ServiceConfig::default());
    let mut event = MemoryEvent::new("Spring Cup");
    let addr = server.start_service(0).unwrap();
    assert!(server.is_running());
    assert_eq!(server.local_addr(), Some(addr));

    let clients = vec![
        thread::spawn(move || http_get(addr, "/meos?get=status")),
        thread::spawn(move || http_get(addr, "/?get=status")),
        thread::spawn(move || http_get(addr, "/favicon.ico")),
    ];
    let responses = drain_until_done(&mut server, &mut event, clients);

    for response in &responses[..2] {
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Content-Type: application/xml"));
        assert!(response.contains("Access-Control-Allow-Origin: *"));
        assert!(response.contains("<Event loaded=\"true\">Spring Cup</Event>"));
    }
    assert!(responses[2].starts_with("HTTP/1.1 404"));

    server.stop().unwrap();
    assert!(!server.is_running());
    server.stop().unwrap();
}

#[test]
fn test_http_session_closed_after_response() {
    init_logging();
    let mut server = RestServer::new(ServiceConfig::default());
    let mut event = MemoryEvent::new("Spring Cup");
    let addr = server.start_service(0).unwrap();

    // An HTTP/1.0 client sends no Connection header and reads until EOF
    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", addr.port())).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(15)))
            .unwrap();
        write!(stream, "GET /meos?get=status HTTP/1.0\r\nHost: localhost\r\n\r\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).map(|_| response)
    });
    let response = drain_until_done(&mut server, &mut event, vec![client])
        .remove(0)
        .expect("session was not closed after the response");

    let status_line = response.lines().next().unwrap_or_default();
    assert!(status_line.contains(" 200 "), "{}", status_line);
    assert!(response.contains("<Event loaded=\"true\">Spring Cup</Event>"));

    server.stop().unwrap();
}

#[test]
fn test_start_twice_and_port_in_use() {
    init_logging();
    let mut server = RestServer::new(ServiceConfig::default());
    let addr = server.start_service(0).unwrap();
    assert!(matches!(
        server.start_service(0),
        Err(Error::AlreadyRunning)
    ));

    let mut other = RestServer::new(ServiceConfig::default());
    assert!(matches!(
        other.start_service(addr.port()),
        Err(Error::Bind { .. })
    ));
    assert!(!other.is_running());

    // Stopped servers can be started again
    server.stop().unwrap();
    let again = server.start_service(0).unwrap();
    assert_ne!(again.port(), 0);
}
