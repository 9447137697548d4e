//! Command-line arguments for the feed client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use feed_common::net::DEFAULT_PORT;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server IP address (IPv4 or IPv6) where the feed server is running.
    #[clap(long, default_value = "127.0.0.1")]
    pub server_ip: String,

    /// TCP port of the feed server.
    #[clap(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}
