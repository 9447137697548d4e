//! Stock bar feed server.
//!
//! This binary listens on a TCP socket and pushes simulated OHLCV bars to every
//! connected client. Internally, it wires together two building blocks:
//!
//! - `BarGenerator` — a single process-wide bounded-random-walk generator,
//!   shared by all connections behind `Arc<Mutex<..>>`, so every client
//!   observes the same evolving price path.
//! - Per-connection session — a lightweight thread created for each accepted
//!   connection that sends one `initial` frame immediately and then one
//!   `update` frame every 2 seconds until the peer disconnects.
//!
//! Concurrency and shutdown:
//! - Each session multiplexes its update timer and a shutdown signal with
//!   crossbeam `select!`; the timer is dropped with the session thread, so no
//!   periodic work survives a disconnect.
//! - The accept loop keeps a map from connection id to that session's shutdown
//!   sender and prunes it through a done-channel as sessions exit.
//! - Ctrl-C/termination stops the accept loop, signals every live session, and
//!   closes the listening socket.
//!
//! Network protocol (high-level):
//! - Bind address: `0.0.0.0:<port>`, port taken from `FEED_PORT` (default 8080).
//! - Frames are newline-delimited JSON: `{"type": "initial"|"update", "data": Bar}`.
//! - The stream is one-way; nothing is read from clients.
#![warn(missing_docs)]
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use feed_common::net::feed_port;
use feed_common::{FeedError, Result};
use log::{error, info, warn};

use crate::model::bar_generator::BarGenerator;
use crate::session::{UPDATE_INTERVAL, run_session};

pub mod model;
mod session;

/// How long the accept loop sleeps when no connection is pending.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    init_logger();

    let port = feed_port();
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port))?;
    // Nonblocking accept lets the loop notice the shutdown flag between peers.
    listener.set_nonblocking(true)?;
    info!("Feed server listening on {}", listener.local_addr()?);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Termination signal received. Shutting down server...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| FeedError::Format(format!("Failed to set signal handler: {}", e)))?;
    }

    let generator = Arc::new(Mutex::new(BarGenerator::new()));
    let mut sessions: HashMap<u64, (Sender<()>, thread::JoinHandle<()>)> = HashMap::new();
    let (done_tx, done_rx) = unbounded::<u64>();
    let mut next_id: u64 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        while let Ok(id) = done_rx.try_recv() {
            if let Some((_, join_handle)) = sessions.remove(&id) {
                let _ = join_handle.join();
            }
            info!("session {} finished. Active sessions: {}", id, sessions.len());
        }

        match listener.accept() {
            Ok((stream, peer_addr)) => {
                let id = next_id;
                next_id += 1;

                let (stop_tx, stop_rx) = unbounded::<()>();
                let generator = Arc::clone(&generator);
                let done_tx = done_tx.clone();
                let join_handle = thread::spawn(move || {
                    if let Err(e) = run_session(id, stream, generator, stop_rx, UPDATE_INTERVAL) {
                        error!("session {}: stream error: {:?}", id, e);
                    }
                    let _ = done_tx.send(id);
                });
                sessions.insert(id, (stop_tx, join_handle));
                info!("session {}: client connected from {}", id, peer_addr);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => warn!("Failed to accept connection: {}", e),
        }
    }

    // Signal every session first, then join them so teardown runs to
    // completion before the process exits.
    info!("Closing listener and {} active session(s)", sessions.len());
    let mut join_handles = Vec::with_capacity(sessions.len());
    for (_, (stop_tx, join_handle)) in sessions {
        let _ = stop_tx.send(());
        join_handles.push(join_handle);
    }
    for join_handle in join_handles {
        let _ = join_handle.join();
    }
    drop(listener);
    Ok(())
}

fn init_logger() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
