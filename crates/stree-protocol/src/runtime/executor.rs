//! Effect executor: the only place that touches I/O.
//!
//! Takes a list of RuntimeEffect and executes them concretely:
//! - Send -> transport.send_raw(), then a Sent or SendFailed log line
//! - Record -> tracing, the event sink, and the observer channel

use tokio::sync::mpsc;

use crate::eventlog::{EventSink, NodeEvent};
use crate::types::NodeId;

use super::effect::RuntimeEffect;
use super::transport::Transport;

/// Execute a list of effects in order.
///
/// A failed send is logged and dropped: there is no retry.
pub(super) async fn execute_effects<T: Transport>(
    effects: Vec<RuntimeEffect>,
    local_id: NodeId,
    transport: &T,
    sink: &mut dyn EventSink,
    event_tx: &mpsc::Sender<NodeEvent>,
) {
    for effect in effects {
        match effect {
            RuntimeEffect::Send { to, message } => {
                let event = match transport.send_raw(to, &message.encode()).await {
                    Ok(()) => NodeEvent::Sent {
                        kind: message.msg_type,
                        leader: message.leader,
                        to,
                    },
                    Err(e) => NodeEvent::SendFailed {
                        kind: message.msg_type,
                        to,
                        reason: e.to_string(),
                    },
                };
                record(local_id, event, sink, event_tx);
            }
            RuntimeEffect::Record(event) => record(local_id, event, sink, event_tx),
        }
    }
}

pub(super) fn record(
    local_id: NodeId,
    event: NodeEvent,
    sink: &mut dyn EventSink,
    event_tx: &mpsc::Sender<NodeEvent>,
) {
    trace_event(local_id, &event);
    sink.record(local_id, &event);
    // try_send: an observer that stopped draining must not stall the node
    let _ = event_tx.try_send(event);
}

fn trace_event(node: NodeId, event: &NodeEvent) {
    match event {
        NodeEvent::Started { address, neighbors } => {
            tracing::info!(%node, %address, neighbors, "node started");
        }
        NodeEvent::Initiated { to, leader } => {
            tracing::info!(%node, %to, %leader, "sent initial explore");
        }
        NodeEvent::Isolated => tracing::info!(%node, "no neighbours, staying idle"),
        NodeEvent::StartupSkipped { phase } => {
            tracing::debug!(%node, %phase, "startup skipped, already recruited");
        }
        NodeEvent::Received { kind, leader, from } => {
            tracing::debug!(%node, %kind, %leader, %from, "received");
        }
        NodeEvent::Sent { kind, leader, to } => {
            tracing::debug!(%node, %kind, %leader, %to, "sent");
        }
        NodeEvent::Adopted { leader, parent } => {
            tracing::info!(%node, %leader, %parent, "adopted leader");
        }
        NodeEvent::Rejected { candidate, to } => {
            tracing::debug!(%node, %candidate, %to, "rejected candidate");
        }
        NodeEvent::Ignored {
            kind,
            leader,
            from,
            reason,
        } => {
            tracing::debug!(%node, %kind, %leader, %from, "ignored: {reason}");
        }
        NodeEvent::BecameRoot { leader } => tracing::info!(%node, %leader, "I am the root"),
        NodeEvent::Terminated { leader, parent } => {
            tracing::info!(%node, %leader, parent = ?parent, "terminated");
        }
        NodeEvent::Dropped { reason } => tracing::warn!(%node, "dropped message: {reason}"),
        NodeEvent::SendFailed { kind, to, reason } => {
            tracing::warn!(%node, %kind, %to, "send failed: {reason}");
        }
    }
}
