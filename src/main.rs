//! `restbridge` demo host
//!
//! Runs the information service against an in-memory event. The main thread
//! plays the part of the host application: it owns the event and drains one
//! request per tick.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use restbridge::config::DEFAULT_PORT;
use restbridge::domain::{DatabaseRunner, DomainModel, MemoryEvent, RunnerStatus};
use restbridge::{ClassPolicy, EntrantPolicy, RestServer, ServiceConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const ENTRY_PAGE: &str = "<!DOCTYPE html>
<html>
<head><meta charset=\"UTF-8\"><title>Entry - {{event}}</title></head>
<body>
<h1>{{event}}</h1>
<form action=\"/meos\" method=\"get\">
<input type=\"hidden\" name=\"entry\" value=\"\">
<p>Name <input name=\"name\"></p>
<p>Club <input name=\"club\"></p>
<p>Class <input name=\"class\"></p>
<p>Card <input name=\"card\"></p>
<p><input type=\"submit\" value=\"Enter\"></p>
</form>
</body>
</html>
";

#[derive(Parser, Debug)]
#[command(about = "HTTP information service for a single-threaded event model")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Who may submit entries: none, any, database, database-club
    #[arg(long, default_value = "none")]
    who: EntrantPolicy,

    /// Which classes accept entries: none, any, quick-entry
    #[arg(long, default_value = "none")]
    classes: ClassPolicy,

    /// Query answered for requests without parameters, e.g. "html=resultlist"
    #[arg(long)]
    root: Option<String>,

    /// How long a network session waits for its answer
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    ceiling: Duration,

    /// Idle time between drain steps when the queue is empty
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    tick: Duration,

    /// Interval between statistics log lines
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    report: Duration,

    /// Load a small sample event instead of starting with no event
    #[arg(long)]
    demo: bool,
}

fn demo_event() -> MemoryEvent {
    let mut event = MemoryEvent::new("Demo Sprint").with_date("2026-06-14");
    let clubs = [event.add_club("OK Linné"), event.add_club("IFK Lidingö")];
    let h21 = event.add_class("H21", false);
    let d21 = event.add_class("D21", false);
    let open = event.add_class("Open", true);
    event.add_control("Radio 1", &[31]);

    let runners = [
        ("Anna Berg", d21, 1925, RunnerStatus::Ok),
        ("Berit Ek", d21, 1874, RunnerStatus::Ok),
        ("Cecilia Lund", d21, 0, RunnerStatus::DidNotFinish),
        ("David Holm", h21, 1702, RunnerStatus::Ok),
        ("Erik Sjö", h21, 1650, RunnerStatus::Ok),
        ("Fredrik Nord", open, 0, RunnerStatus::Unknown),
    ];
    for (index, (name, class, time, status)) in runners.into_iter().enumerate() {
        let id = event.add_runner(name, Some(clubs[index % clubs.len()]), Some(class));
        if let Some(competitor) = event.competitor_mut(id) {
            competitor.card = Some(500_000 + index as u32);
            competitor.start = Some(36_000 + 120 * index as u32);
            competitor.time = (time > 0).then_some(time);
            competitor.status = status;
        }
    }
    event.add_database_runner(DatabaseRunner {
        name: "Gustav Holm".to_string(),
        club: Some("OK Linné".to_string()),
        card: Some(4711),
        birth_year: Some(1990),
    });
    event
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ServiceConfig::default()
        .with_port(args.port)
        .with_entry(args.who, args.classes)
        .with_ceiling(args.ceiling);
    if let Some(root) = args.root {
        config = config.with_root_map(root);
    }

    let mut event = if args.demo {
        demo_event()
    } else {
        MemoryEvent::empty()
    };

    let exit = Arc::new(AtomicBool::new(false));
    {
        let exit = Arc::clone(&exit);
        ctrlc::set_handler(move || exit.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let mut server = RestServer::new(config);
    server.register_page("enter", ENTRY_PAGE);
    let port = server.config().port;
    let addr = server
        .start_service(port)
        .with_context(|| format!("failed to start information service on port {}", port))?;
    info!(
        "Serving {} on http://{}/meos (entries: {} / {})",
        event_name(&event),
        addr,
        args.who,
        args.classes
    );

    let mut last_report = Instant::now();
    while !exit.load(Ordering::SeqCst) {
        if !server.drain_one_if_any(&mut event) {
            thread::sleep(args.tick);
        }
        if last_report.elapsed() >= args.report {
            let stats = server.statistics();
            info!(
                "served {} requests, {} pending, max {:?}, mean {:?} over the last {}",
                stats.served,
                stats.pending,
                stats.response.max(),
                stats.response.mean(),
                stats.response.count
            );
            last_report = Instant::now();
        }
    }

    info!("Shutting down");
    server.stop().context("failed to stop information service")?;
    Ok(())
}

fn event_name(event: &MemoryEvent) -> String {
    event
        .status()
        .event
        .unwrap_or_else(|| "no event".to_string())
}
