//! Spanning-tree election transport layer.
//!
//! Every protocol message travels over its own TCP connection: the
//! sender dials, writes one LF-terminated line and closes. The receiver
//! accepts, reads exactly one line under a timeout and closes.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use stree_transport::{TcpNode, TransportConfig};
//!
//! # async fn example() -> Result<(), stree_transport::TransportError> {
//! let config = TransportConfig::new();
//! let mut node = TcpNode::bind("127.0.0.1:30000", config).await?;
//!
//! node.send_raw("127.0.0.1:30001", b"M\t7\t7\n").await?;
//!
//! let line = node.recv_raw().await?;
//! println!("got {} bytes", line.len());
//!
//! node.shutdown();
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod node;
mod protocol;

pub use config::{resolve_addr, TransportConfig, DEFAULT_PORT};
pub use error::TransportError;
pub use node::{TcpNode, TcpSender};

use std::fmt;
use std::str::FromStr;

/// Node identity: the integer id from the topology record.
///
/// Ordering is plain integer ordering; the elected leader is the
/// maximum id in the graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl FromStr for NodeId {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TransportError::InvalidNodeId(s.to_string()))
    }
}

impl serde::Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_parse_and_display() {
        let id: NodeId = "42".parse().unwrap();
        assert_eq!(id, NodeId::new(42));
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "NodeId(42)");
    }

    #[test]
    fn node_id_rejects_garbage() {
        let err = "abc".parse::<NodeId>().unwrap_err();
        assert!(matches!(err, TransportError::InvalidNodeId(s) if s == "abc"));
        assert!("-3".parse::<NodeId>().is_err());
    }

    #[test]
    fn node_id_orders_numerically() {
        assert!(NodeId::new(9) < NodeId::new(10));
        let max = [3, 10, 7].into_iter().map(NodeId::new).max();
        assert_eq!(max, Some(NodeId::new(10)));
    }

    #[test]
    fn node_id_serde_as_integer() {
        let json = serde_json::to_string(&NodeId::new(8)).unwrap();
        assert_eq!(json, "8");
        let back: NodeId = serde_json::from_str("8").unwrap();
        assert_eq!(back, NodeId::new(8));
    }
}
