//! Spanning-tree leader election protocol.
//!
//! Every node floods its own id as a leader candidate, exploring one
//! neighbor at a time. Larger candidates win, the exploration of the
//! maximum id builds a spanning tree rooted at that node, and the root
//! finally sends a TERMINATE wave down the graph.
//!
//! Wire format: one tab-separated text line per TCP connection, carried
//! by `stree-transport`.

pub mod error;
pub mod eventlog;
pub mod message;
pub mod runtime;
pub mod selection;
pub mod sim;
pub mod topology;
pub mod types;

pub use error::ProtocolError;
pub use eventlog::{EventSink, FileEventLog, MemoryEventLog, NodeEvent, NullEventLog};
pub use message::Message;
pub use runtime::{
    NodeSnapshot, NodeState, ProtocolRuntime, RuntimeChannels, RuntimeConfig, RuntimeEffect,
    RuntimeHandle,
};
pub use selection::{FirstNeighbor, NeighborSelector, SeededRandom};
pub use sim::{Network, SimReport};
pub use topology::{Neighbor, Topology};
pub use types::{MessageType, NodeId, Phase};
