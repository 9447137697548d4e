//! Feed session state machine.
//!
//! [`FeedSession`] owns the client side of the feed: connection state, the
//! rolling bar buffer, and reconnect scheduling. It is deliberately passive —
//! transport events arrive through one channel and are processed one at a
//! time by [`FeedSession::handle_event`], so there is no re-entrant mutation,
//! and every time-dependent operation takes `now: Instant` so tests can drive
//! the clock by hand.
//!
//! All transports report into the same channel, so each connection gets a
//! fresh generation number and events carrying any other generation are
//! discarded: a replaced transport's trailing clean-close must not tear down
//! the connection that superseded it.
//!
//! Recovery rules:
//! - an *unclean* closure schedules one reconnect attempt after a fixed delay;
//! - a clean (locally initiated) closure does not;
//! - a transport `Failed` event records the error but does not by itself
//!   schedule a reconnect — over TCP it is followed by an unclean close,
//!   which does.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use feed_common::{Bar, FeedMessage};
use log::{debug, info, warn};
use strum::Display;

use crate::transport::{Connector, TransportEvent, TransportHandle};

/// Maximum number of bars retained in the rolling buffer.
pub const MAX_BARS: usize = 100;

/// Delay before the automatic reconnect attempt after an unclean closure.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Connection state of the feed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// No transport; nothing scheduled or a reconnect is pending.
    Disconnected,
    /// A transport was requested but `Opened` has not arrived yet.
    Connecting,
    /// The transport is open and frames are flowing.
    Connected,
    /// The last connection attempt or transport failed.
    Error,
}

/// Client-side feed consumer: state machine plus rolling buffer.
pub struct FeedSession<C: Connector> {
    connector: C,
    events: Sender<(u64, TransportEvent)>,
    state: ConnectionState,
    last_error: Option<String>,
    bars: VecDeque<Bar>,
    handle: Option<C::Handle>,
    /// Generation of the current transport; bumped on every connection
    /// attempt so events from replaced transports can be recognized.
    generation: u64,
    reconnect_due: Option<Instant>,
    torn_down: bool,
}

impl<C: Connector> FeedSession<C> {
    /// Create a disconnected session. `events` is the sending side of the
    /// channel this session's transports will report into; the caller owns the
    /// receiving side and feeds events back via [`FeedSession::handle_event`].
    pub fn new(connector: C, events: Sender<(u64, TransportEvent)>) -> Self {
        Self {
            connector,
            events,
            state: ConnectionState::Disconnected,
            last_error: None,
            bars: VecDeque::with_capacity(MAX_BARS),
            handle: None,
            generation: 0,
            reconnect_due: None,
            torn_down: false,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Most recent error message, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The rolling bar buffer, oldest first.
    pub fn bars(&self) -> &VecDeque<Bar> {
        &self.bars
    }

    /// Open a connection. No-op if one is already open or the session is torn
    /// down. A construction failure moves the session to `error` without
    /// scheduling a retry.
    pub fn connect(&mut self, _now: Instant) {
        if self.torn_down {
            return;
        }
        if self.state == ConnectionState::Connected && self.handle.is_some() {
            return;
        }

        self.set_state(ConnectionState::Connecting);
        self.last_error = None;
        self.generation += 1;

        match self.connector.connect(self.generation, self.events.clone()) {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                warn!("feed connection failed: {}", e);
                self.set_state(ConnectionState::Error);
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// Process one transport event; returns the newly appended bar, if any.
    /// Events from a superseded transport generation are discarded, and all
    /// events are no-ops after teardown.
    pub fn handle_event(
        &mut self,
        generation: u64,
        event: TransportEvent,
        now: Instant,
    ) -> Option<Bar> {
        if self.torn_down {
            return None;
        }
        if generation != self.generation {
            debug!(
                "ignoring event from stale transport generation {} (current {}): {:?}",
                generation, self.generation, event
            );
            return None;
        }

        match event {
            TransportEvent::Opened => {
                self.set_state(ConnectionState::Connected);
                self.last_error = None;
                None
            }
            TransportEvent::Frame(frame) => match FeedMessage::from_json(&frame) {
                Ok(message) => Some(self.append_bar(message.into_bar())),
                Err(e) => {
                    // A bad frame never disturbs the connection or the buffer.
                    warn!("ignoring malformed feed frame: {}", e);
                    self.last_error = Some(format!("Error parsing feed data: {}", e));
                    None
                }
            },
            TransportEvent::Closed { clean, reason } => {
                self.set_state(ConnectionState::Disconnected);
                self.handle = None;
                if !clean {
                    let reason = reason.unwrap_or_else(|| "Unknown reason".to_string());
                    self.last_error = Some(format!("Connection closed unexpectedly: {}", reason));
                    self.reconnect_due = Some(now + RECONNECT_DELAY);
                    info!(
                        "feed closed uncleanly, reconnecting in {} ms",
                        RECONNECT_DELAY.as_millis()
                    );
                }
                None
            }
            TransportEvent::Failed(message) => {
                self.set_state(ConnectionState::Error);
                self.last_error = Some(message);
                None
            }
        }
    }

    /// Fire the pending reconnect once its deadline has passed.
    pub fn poll(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        if let Some(due) = self.reconnect_due
            && now >= due
        {
            self.reconnect_due = None;
            info!("attempting to reconnect to feed");
            self.connect(now);
        }
    }

    /// User-triggered reconnect: drop any pending automatic attempt, close the
    /// current transport, clear the buffer, and connect immediately.
    pub fn reconnect(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }
        self.reconnect_due = None;
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.bars.clear();
        self.set_state(ConnectionState::Disconnected);
        self.connect(now);
    }

    /// Tear the session down: all further events become no-ops, any pending
    /// reconnect is cancelled, and the transport is closed.
    pub fn shutdown(&mut self) {
        self.torn_down = true;
        self.reconnect_due = None;
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }

    /// Append with FIFO eviction, in the same call that received the frame so
    /// the buffer can never grow past its cap between events.
    fn append_bar(&mut self, bar: Bar) -> Bar {
        if self.bars.len() == MAX_BARS {
            self.bars.pop_front();
        }
        self.bars.push_back(bar.clone());
        bar
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("feed state: {} -> {}", self.state, state);
            self.state = state;
        }
    }
}
