use crate::eventlog::NodeEvent;
use crate::message::Message;
use crate::types::NodeId;

/// Intention produced by the pure logic in [`NodeState`](super::state::NodeState).
///
/// Every `handle_*` method returns `Vec<RuntimeEffect>`. The runtime
/// loop then executes them in order through the transport and the
/// event sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEffect {
    /// Open a connection to a neighbor and write one message.
    Send { to: NodeId, message: Message },

    /// Append a line to the node's event log.
    Record(NodeEvent),
}

impl RuntimeEffect {
    pub fn send(to: NodeId, message: Message) -> Self {
        RuntimeEffect::Send { to, message }
    }

    /// The outbound message, if this is a send.
    pub fn as_send(&self) -> Option<(NodeId, &Message)> {
        match self {
            RuntimeEffect::Send { to, message } => Some((*to, message)),
            RuntimeEffect::Record(_) => None,
        }
    }
}
