//! Feed Client — a TCP client that consumes the simulated stock bar stream and
//! prints received bars to stdout. It connects to the feed server, keeps a
//! rolling buffer of the last 100 bars, and automatically reconnects with a
//! fixed delay whenever the connection drops uncleanly.
//!
//! Usage example (CLI):
//! ```bash
//! feed_client --server-ip 192.168.0.10 --port 8080
//! ```
//!
//! Architecture: the transport reader thread pushes `TransportEvent`s into a
//! channel; the main loop multiplexes that channel with a short poll tick via
//! crossbeam `select!` and drives the `FeedSession` state machine, which owns
//! all connection state, the bar buffer, and reconnect scheduling.
#![warn(missing_docs)]
mod args;
mod session;
mod transport;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{select, tick, unbounded};
use feed_common::net::addr;
use feed_common::{FeedError, Result};
use log::{error, info, warn};

use crate::args::Args;
use crate::session::FeedSession;
use crate::transport::{TcpConnector, TransportEvent};

/// How often the main loop checks reconnect deadlines and the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| FeedError::Format(format!("Failed to set signal handler: {}", e)))?;
    }

    let server_addr = addr(args.server_ip.trim(), args.port);
    info!("Connecting to feed server at {}", server_addr);

    let (events_tx, events_rx) = unbounded::<(u64, TransportEvent)>();
    let mut session = FeedSession::new(TcpConnector::new(server_addr), events_tx);
    session.connect(Instant::now());

    let poll = tick(POLL_INTERVAL);
    info!("Client is running. Press Ctrl+C to exit.");
    while !shutdown.load(Ordering::SeqCst) {
        select! {
            recv(events_rx) -> event => match event {
                Ok((generation, event)) => {
                    if let Some(bar) = session.handle_event(generation, event, Instant::now()) {
                        info!(
                            "BAR {} {} O={:.2} H={:.2} L={:.2} C={:.2} V={} (buffered: {})",
                            bar.name,
                            bar.date,
                            bar.open,
                            bar.high,
                            bar.low,
                            bar.close,
                            bar.volume,
                            session.bars().len()
                        );
                    }
                }
                Err(e) => {
                    error!("Event channel closed: {}", e);
                    break;
                }
            },
            recv(poll) -> _ => session.poll(Instant::now()),
        }
    }

    session.shutdown();
    if let Some(err) = session.last_error() {
        warn!("Last feed error: {}", err);
    }
    info!("Client stopped in state '{}'", session.state());
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
