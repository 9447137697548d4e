//! Transport layer for the feed session.
//!
//! The session never talks to a socket directly: it asks a [`Connector`] for a
//! [`TransportHandle`] and consumes [`TransportEvent`]s from a single channel.
//! That keeps the state machine synchronous and lets tests drive it with a
//! fake connector and hand-crafted events.
//!
//! Every event travels with the *generation* of the connection that produced
//! it (the value passed to [`Connector::connect`]). A replaced transport's
//! reader thread keeps running until its socket drains, so its trailing close
//! event can arrive after a newer connection is already up; the generation
//! tag lets the session discard such stale events instead of tearing down
//! the fresh transport.
//!
//! The production [`TcpConnector`] opens a `TcpStream` and spawns a reader
//! thread that turns the newline-delimited frames into events. Closure
//! semantics: a closure is *clean* only when it was locally initiated via
//! [`TransportHandle::close`] (teardown or an explicit reconnect); a remote
//! EOF or socket error is an unclean closure.

use std::io::{BufRead, BufReader};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::Sender;
use feed_common::{FeedError, Result};
use log::debug;

/// Event emitted by a transport into the session's event channel. On the
/// wire of the channel it is paired with the generation of the connection
/// that produced it: `(generation, TransportEvent)`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established and frames may start arriving.
    Opened,
    /// One received text frame, newline stripped.
    Frame(String),
    /// The connection ended. `clean` is true only for locally initiated closes.
    Closed {
        /// Whether the closure was initiated by this side.
        clean: bool,
        /// Human-readable reason for unclean closures, when known.
        reason: Option<String>,
    },
    /// A transport-level error occurred (the stream is about to close).
    Failed(String),
}

/// Factory for transport connections.
pub trait Connector {
    /// Concrete handle type for connections made by this connector.
    type Handle: TransportHandle;

    /// Open a connection and start delivering [`TransportEvent`]s, tagged
    /// with `generation`, to `events`.
    ///
    /// A construction failure is returned directly; everything after a
    /// successful return is reported through the event channel.
    fn connect(
        &self,
        generation: u64,
        events: Sender<(u64, TransportEvent)>,
    ) -> Result<Self::Handle>;
}

/// Handle to an open connection, used only to close it.
pub trait TransportHandle {
    /// Close the connection; the resulting closure event is reported as clean.
    fn close(&mut self);
}

/// TCP connector for the feed server's newline-delimited JSON stream.
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Create a connector targeting `addr` (e.g. `127.0.0.1:8080`).
    pub fn new(addr: String) -> Self {
        Self { addr }
    }
}

impl Connector for TcpConnector {
    type Handle = TcpHandle;

    fn connect(
        &self,
        generation: u64,
        events: Sender<(u64, TransportEvent)>,
    ) -> Result<TcpHandle> {
        let stream = TcpStream::connect(&self.addr)
            .map_err(|e| FeedError::Format(format!("Failed to connect to {}: {}", self.addr, e)))?;
        let reader_stream = stream.try_clone()?;
        let locally_closed = Arc::new(AtomicBool::new(false));

        let reader_closed = Arc::clone(&locally_closed);
        thread::spawn(move || {
            read_loop(reader_stream, generation, events, reader_closed);
        });

        Ok(TcpHandle {
            stream,
            locally_closed,
        })
    }
}

/// Handle to an open TCP feed connection.
pub struct TcpHandle {
    stream: TcpStream,
    locally_closed: Arc<AtomicBool>,
}

impl TransportHandle for TcpHandle {
    fn close(&mut self) {
        if !self.locally_closed.swap(true, Ordering::SeqCst) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader thread body: pump frames into the event channel until the stream ends.
fn read_loop(
    stream: TcpStream,
    generation: u64,
    events: Sender<(u64, TransportEvent)>,
    locally_closed: Arc<AtomicBool>,
) {
    let _ = events.send((generation, TransportEvent::Opened));
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                let clean = locally_closed.load(Ordering::SeqCst);
                let reason = (!clean).then(|| "connection closed by server".to_string());
                let _ = events.send((generation, TransportEvent::Closed { clean, reason }));
                break;
            }
            Ok(_) => {
                let frame = line.trim_end();
                if !frame.is_empty() {
                    let _ = events.send((generation, TransportEvent::Frame(frame.to_string())));
                }
            }
            Err(e) => {
                if locally_closed.load(Ordering::SeqCst) {
                    let _ = events.send((
                        generation,
                        TransportEvent::Closed {
                            clean: true,
                            reason: None,
                        },
                    ));
                } else {
                    // Mirror the usual error-then-close event pair: the error
                    // reports the failure, the unclean close drives recovery.
                    let _ = events.send((generation, TransportEvent::Failed(e.to_string())));
                    let _ = events.send((
                        generation,
                        TransportEvent::Closed {
                            clean: false,
                            reason: Some(e.to_string()),
                        },
                    ));
                }
                break;
            }
        }
    }
    debug!("transport reader (generation {}) finished", generation);
}
