//!
//! Common types and utilities shared by the feed server and client.
//!
//! This crate aggregates:
//! - `error` — unified error type `FeedError` used across the workspace.
//! - `result` — handy `Result<T, FeedError>` alias.
//! - `bar` — the OHLCV `Bar` payload and the `FeedMessage` wire envelope.
//! - `net` — networking constants and small helpers.
#![warn(missing_docs)]
pub mod bar;
pub mod error;
pub mod net;
pub mod result;

pub use bar::{Bar, FeedMessage};
pub use error::FeedError;
pub use result::Result;
