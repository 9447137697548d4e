//! Shared networking constants and helpers used by client and server.

/// Default TCP port for the feed stream (server -> client).
pub const DEFAULT_PORT: u16 = 8080;

/// Environment variable that overrides the listening port on the server.
pub const PORT_ENV: &str = "FEED_PORT";

/// Resolve the feed port from the environment, falling back to [`DEFAULT_PORT`]
/// when the variable is unset or not a valid port number.
pub fn feed_port() -> u16 {
    std::env::var(PORT_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Helper to format an IP address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_formats_ip_and_port() {
        assert_eq!(addr("127.0.0.1", 8080), "127.0.0.1:8080");
    }
}
