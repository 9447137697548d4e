//! Domain models and utilities for the feed server.
//!
//! - `bar_generator` — the bounded-random-walk OHLCV generator whose single
//!   instance feeds every connected client.

pub mod bar_generator;
