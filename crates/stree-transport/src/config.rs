use std::net::SocketAddr;
use std::time::Duration;

/// Port every node listens on when the topology address carries none.
pub const DEFAULT_PORT: u16 = 30000;

/// Configuration for a [`TcpNode`](crate::TcpNode).
///
/// All fields have sensible defaults. Use the builder pattern:
///
/// ```rust
/// use std::time::Duration;
/// use stree_transport::TransportConfig;
///
/// let config = TransportConfig::new()
///     .connect_timeout(Duration::from_millis(500))
///     .max_message_size(256);
/// ```
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on dialing a neighbor.
    pub(crate) connect_timeout: Duration,
    /// Upper bound on reading the single line of an accepted connection.
    pub(crate) read_timeout: Duration,
    /// Maximum accepted line length in bytes, LF included.
    pub(crate) max_message_size: usize,
    /// Channel buffer size for incoming lines.
    pub(crate) recv_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            max_message_size: 1024,
            recv_buffer: 256,
        }
    }

    /// Set the dial timeout (default: 2s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-connection read timeout (default: 2s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set maximum incoming line size (default: 1 KiB).
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the channel buffer size for incoming lines (default: 256).
    pub fn recv_buffer(mut self, capacity: usize) -> Self {
        self.recv_buffer = capacity;
        self
    }
}

/// Turn a topology address into a dialable `host:port`.
///
/// Addresses that already name a port are returned unchanged, bare
/// hosts get `port` appended.
pub fn resolve_addr(address: &str, port: u16) -> String {
    let address = address.trim();
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Some((host, p)) = address.rsplit_once(':') {
        // More than one colon means a bare IPv6 literal.
        if !host.contains(':') && p.parse::<u16>().is_ok() {
            return address.to_string();
        }
        if address.contains("::") || host.contains(':') {
            return format!("[{address}]:{port}");
        }
    }
    format!("{address}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TransportConfig::new();
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.max_message_size, 1024);
    }

    #[test]
    fn resolve_bare_host_appends_port() {
        assert_eq!(resolve_addr("10.0.0.5", 30000), "10.0.0.5:30000");
        assert_eq!(resolve_addr("node-3", 4000), "node-3:4000");
    }

    #[test]
    fn resolve_keeps_explicit_port() {
        assert_eq!(resolve_addr("127.0.0.1:31001", 30000), "127.0.0.1:31001");
        assert_eq!(resolve_addr("node-3:31002", 30000), "node-3:31002");
        assert_eq!(resolve_addr("[::1]:31003", 30000), "[::1]:31003");
    }

    #[test]
    fn resolve_bare_ipv6_gets_brackets() {
        assert_eq!(resolve_addr("::1", 30000), "[::1]:30000");
    }
}
