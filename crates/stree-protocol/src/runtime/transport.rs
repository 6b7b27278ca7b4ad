use std::collections::BTreeMap;

use stree_transport::TcpSender;

use crate::error::ProtocolError;
use crate::types::NodeId;

/// Outbound network seam for the runtime.
///
/// In production: [`AddressedTcp`] (one TCP connection per message).
/// In tests: `MockTransport` (records what would have been sent).
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one encoded message to a neighbor.
    async fn send_raw(&self, target: NodeId, data: &[u8]) -> Result<(), ProtocolError>;
}

// ── TCP (production) ────────────────────────────────────────────────

/// Dials neighbors by id using the addresses from the topology record.
#[derive(Debug, Clone)]
pub struct AddressedTcp {
    sender: TcpSender,
    book: BTreeMap<NodeId, String>,
}

impl AddressedTcp {
    pub fn new(sender: TcpSender, book: BTreeMap<NodeId, String>) -> Self {
        Self { sender, book }
    }

    pub fn address_of(&self, target: NodeId) -> Option<&str> {
        self.book.get(&target).map(String::as_str)
    }
}

#[async_trait::async_trait]
impl Transport for AddressedTcp {
    async fn send_raw(&self, target: NodeId, data: &[u8]) -> Result<(), ProtocolError> {
        let addr = self.address_of(target).ok_or_else(|| {
            ProtocolError::InvariantViolation(format!("no address for node {target}"))
        })?;
        self.sender.send_raw(addr, data).await?;
        Ok(())
    }
}

// ── MockTransport (tests) ───────────────────────────────────────────
