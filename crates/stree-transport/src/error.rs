use std::time::Duration;

/// Errors returned by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("send to {addr} failed: {source}")]
    Send {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),

    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("connection closed before end of line ({0} bytes buffered)")]
    UnexpectedEof(usize),

    #[error("node is shut down")]
    Shutdown,

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}
