//! The protocol runtime event loop.
//!
//! A single async task that owns the node state and multiplexes over
//! the settle timer, inbound lines and application commands.
use std::time::Duration;

use stree_transport::TcpNode;
use tokio::sync::mpsc;

use crate::eventlog::{EventSink, NodeEvent};
use crate::selection::NeighborSelector;

use super::executor::{execute_effects, record};
use super::state::{NodeSnapshot, NodeState};
use super::transport::Transport;
use super::RuntimeCommand;

/// Main event loop. Owns all protocol state. Returns the final state.
#[allow(clippy::too_many_arguments)]
pub(super) async fn runtime_loop<T: Transport>(
    mut node: TcpNode,
    transport: T,
    mut state: NodeState,
    mut selector: Box<dyn NeighborSelector>,
    mut sink: Box<dyn EventSink>,
    settle_delay: Duration,
    started: NodeEvent,
    mut cmd_rx: mpsc::Receiver<RuntimeCommand>,
    event_tx: mpsc::Sender<NodeEvent>,
) -> NodeSnapshot {
    let local_id = state.local_id();
    record(local_id, started, sink.as_mut(), &event_tx);

    let settle = tokio::time::sleep(settle_delay);
    tokio::pin!(settle);
    let mut settled = false;

    loop {
        tokio::select! {
            // ── 1. Startup action, once ─────────────────────────
            _ = &mut settle, if !settled => {
                settled = true;
                let effects = state.handle_startup(selector.as_mut());
                execute_effects(effects, local_id, &transport, sink.as_mut(), &event_tx).await;
            }

            // ── 2. Inbound line from the transport ──────────────
            result = node.recv_raw() => {
                match result {
                    Ok(data) => {
                        let effects = state.handle_incoming(&data);
                        execute_effects(effects, local_id, &transport, sink.as_mut(), &event_tx).await;
                    }
                    Err(e) => {
                        tracing::warn!(node = %local_id, "transport closed: {e}");
                        break;
                    }
                }
            }

            // ── 3. Application commands ─────────────────────────
            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    RuntimeCommand::Snapshot { reply } => {
                        let _ = reply.send(state.snapshot());
                    }
                    RuntimeCommand::Shutdown => {
                        tracing::info!(node = %local_id, "shutdown requested");
                        break;
                    }
                }
            }
        }

        if state.is_terminated() {
            break;
        }
    }

    node.shutdown();
    state.snapshot()
}
