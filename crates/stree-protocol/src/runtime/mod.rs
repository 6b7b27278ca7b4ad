//! Protocol runtime: drives one node's [`NodeState`] from a live transport.
//!
//! The runtime owns a `TcpNode` (inbound lines) and the node's protocol
//! state. A single task drains the inbound queue, so state is never
//! shared between connection handlers. The application only sees a
//! handle, an event stream and the final snapshot.
mod executor;
mod r#loop;
pub mod effect;
pub mod state;
pub mod transport;

use std::path::PathBuf;
use std::time::Duration;

use stree_transport::TcpNode;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::eventlog::{EventSink, FileEventLog, NodeEvent, NullEventLog};
use crate::error::ProtocolError;
use crate::selection::{NeighborSelector, SeededRandom};
use crate::topology::Topology;
use crate::types::NodeId;

pub use effect::RuntimeEffect;
pub use state::{NodeSnapshot, NodeState};
pub use transport::{AddressedTcp, Transport};

// ── Configuration ─────────────────────────────────────────────────────

/// Configuration for the protocol runtime.
pub struct RuntimeConfig {
    /// Wait before the startup action, so every node is listening.
    pub settle_delay: Duration,
    /// Port for topology addresses that carry none.
    pub port: u16,
    /// Directory for the `Log-<address>` event log. `None` disables it.
    pub log_dir: Option<PathBuf>,
    /// Seed for the initial neighbor choice. `None` draws from the OS.
    pub seed: Option<u64>,
    /// Observer channel capacity.
    pub event_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            port: stree_transport::DEFAULT_PORT,
            log_dir: None,
            seed: None,
            event_buffer: 256,
        }
    }
}

impl RuntimeConfig {
    fn selector(&self, local_id: NodeId) -> Box<dyn NeighborSelector> {
        match self.seed {
            // Mix in the id so nodes sharing a seed still differ.
            Some(seed) => Box::new(SeededRandom::new(seed ^ local_id.get())),
            None => Box::new(SeededRandom::from_entropy()),
        }
    }
}

// ── Commands (app → runtime) ──────────────────────────────────────────

/// Commands the application sends to the runtime loop.
pub enum RuntimeCommand {
    /// Current state of the node.
    Snapshot { reply: oneshot::Sender<NodeSnapshot> },
    /// Stop serving without waiting for termination.
    Shutdown,
}

// ── RuntimeHandle (app-facing API) ───────────────────────────────────

/// Handle to a running node. Cheap to clone.
#[derive(Clone)]
pub struct RuntimeHandle {
    cmd_tx: mpsc::Sender<RuntimeCommand>,
    local_id: NodeId,
}

impl RuntimeHandle {
    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    /// Current state, or `None` once the loop has exited.
    pub async fn snapshot(&self) -> Option<NodeSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RuntimeCommand::Snapshot { reply: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown).await;
    }
}

// ── RuntimeChannels ──────────────────────────────────────────────────

/// Returned to the application when the runtime starts.
pub struct RuntimeChannels {
    pub handle: RuntimeHandle,
    /// Every event also written to the event log.
    pub events: mpsc::Receiver<NodeEvent>,
    /// Resolves with the final state once the loop ends.
    pub done: JoinHandle<NodeSnapshot>,
}

// ── ProtocolRuntime ──────────────────────────────────────────────────

/// The protocol runtime. Spawn it and communicate via channels.
pub struct ProtocolRuntime;

impl ProtocolRuntime {
    /// Start a node over TCP.
    ///
    /// Takes ownership of a bound `TcpNode`; outbound messages go to the
    /// neighbor addresses in `topology`. Fails only if the event log
    /// cannot be opened.
    pub fn spawn(
        node: TcpNode,
        topology: &Topology,
        config: RuntimeConfig,
    ) -> Result<RuntimeChannels, ProtocolError> {
        let transport = AddressedTcp::new(node.sender(), topology.address_book(config.port));
        let sink: Box<dyn EventSink> = match &config.log_dir {
            Some(dir) => Box::new(FileEventLog::open(dir, &topology.log_file_name())?),
            None => Box::new(NullEventLog),
        };
        let selector = config.selector(topology.id);
        Ok(Self::spawn_with(node, transport, topology, config, selector, sink))
    }

    /// Start a node with explicit transport, selector and sink.
    pub fn spawn_with<T: Transport + 'static>(
        node: TcpNode,
        transport: T,
        topology: &Topology,
        config: RuntimeConfig,
        selector: Box<dyn NeighborSelector>,
        sink: Box<dyn EventSink>,
    ) -> RuntimeChannels {
        let local_id = topology.id;
        let state = NodeState::from_topology(topology);

        let (cmd_tx, cmd_rx) = mpsc::channel::<RuntimeCommand>(16);
        let (event_tx, event_rx) = mpsc::channel::<NodeEvent>(config.event_buffer);

        let started = NodeEvent::Started {
            address: topology.address.clone(),
            neighbors: topology.neighbors.len(),
        };

        let done = tokio::spawn(r#loop::runtime_loop(
            node,
            transport,
            state,
            selector,
            sink,
            config.settle_delay,
            started,
            cmd_rx,
            event_tx,
        ));

        RuntimeChannels {
            handle: RuntimeHandle { cmd_tx, local_id },
            events: event_rx,
            done,
        }
    }
}
