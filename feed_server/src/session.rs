//! Per-connection streaming session.
//!
//! Each accepted connection gets its own thread running [`run_session`]: it
//! pushes the generator's current bar as an `initial` frame synchronously,
//! then emits one `update` frame per tick of a crossbeam `tick` timer until
//! the peer disconnects or the server shuts down. The timer lives on the
//! session thread's stack, so it can never outlive the connection.

use std::io::Write;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, select, tick};
use feed_common::{FeedError, FeedMessage, Result};
use log::info;

use crate::model::bar_generator::BarGenerator;

/// Interval between `update` frames on every connection.
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(2000);

/// Stream bars to a single client until it disconnects or `shutdown_rx` fires.
///
/// The shared `generator` is locked only for the duration of one sample; the
/// emitted sequence interleaves with other connections in tick-firing order. A
/// failed write means the peer vanished and ends the session without error —
/// the server has nothing to tell a client that is already gone.
pub fn run_session(
    id: u64,
    mut stream: TcpStream,
    generator: Arc<Mutex<BarGenerator>>,
    shutdown_rx: Receiver<()>,
    update_interval: Duration,
) -> Result<()> {
    let initial = {
        let generator = generator.lock()?;
        FeedMessage::Initial(generator.last_bar().clone())
    };
    send_message(&mut stream, &initial)?;

    let timer = tick(update_interval);
    loop {
        select! {
            recv(shutdown_rx) -> _ => {
                info!("session {}: server shutting down, closing stream", id);
                break;
            }
            recv(timer) -> msg => {
                msg.map_err(|e| FeedError::ChannelRecv(e.to_string()))?;
                let bar = {
                    let mut generator = generator.lock()?;
                    generator.generate_next()
                };
                if let Err(e) = send_message(&mut stream, &FeedMessage::Update(bar)) {
                    info!("session {}: peer gone ({}), stopping updates", id, e);
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Write one newline-terminated JSON frame.
fn send_message<W: Write>(writer: &mut W, message: &FeedMessage) -> Result<()> {
    let json = message.to_json()?;
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use feed_common::Bar;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    fn sample_bar() -> Bar {
        Bar {
            date: "2024-01-02T03:04:05.678Z".to_string(),
            open: 180.0,
            high: 181.25,
            low: 179.5,
            close: 180.75,
            volume: 734_211,
            name: "BA".to_string(),
        }
    }

    #[test]
    fn frames_are_newline_terminated_json() {
        let mut out = Vec::new();
        send_message(&mut out, &FeedMessage::Update(sample_bar())).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
        let decoded = FeedMessage::from_json(text.trim_end()).unwrap();
        assert_eq!(decoded.bar().close, 180.75);
    }

    #[test]
    fn session_sends_initial_then_updates() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let generator = Arc::new(Mutex::new(BarGenerator::with_seed(9)));
        let (shutdown_tx, shutdown_rx) = unbounded();

        let server_generator = Arc::clone(&generator);
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            run_session(
                1,
                stream,
                server_generator,
                shutdown_rx,
                Duration::from_millis(20),
            )
            .unwrap();
        });

        let client = TcpStream::connect(addr).unwrap();
        let mut reader = BufReader::new(client);
        let mut frames = Vec::new();
        for _ in 0..4 {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            frames.push(FeedMessage::from_json(line.trim_end()).unwrap());
        }
        shutdown_tx.send(()).unwrap();
        server.join().unwrap();

        // Initial carries the flat seed bar; every later frame is an update
        // whose open chains from the previous close.
        assert!(matches!(frames[0], FeedMessage::Initial(_)));
        assert_eq!(frames[0].bar().open, 180.0);
        for pair in frames.windows(2) {
            assert!(matches!(pair[1], FeedMessage::Update(_)));
            assert_eq!(pair[1].bar().open, pair[0].bar().close);
        }
    }

    #[test]
    fn back_to_back_initials_share_the_same_bar() {
        let generator = Arc::new(Mutex::new(BarGenerator::with_seed(4)));

        let first = {
            let generator = generator.lock().unwrap();
            generator.last_bar().clone()
        };
        let second = {
            let generator = generator.lock().unwrap();
            generator.last_bar().clone()
        };
        assert_eq!(first.open, second.open);
        assert_eq!(first, second);

        // Once a timer fires the shared path advances for everyone.
        let updated = generator.lock().unwrap().generate_next();
        assert_eq!(updated.open, first.close);
    }
}
