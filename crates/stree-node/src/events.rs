use serde::Serialize;
use std::io::Write;

use stree_protocol::{MessageType, NodeId, NodeSnapshot, Phase};

/// Emit a JSONL event to stdout (flushed immediately for piped output).
pub fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{json}");
        let _ = lock.flush();
    }
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ── Node results ────────────────────────────────────────────────

/// Final state of one node, as printed by `run` and `cluster`.
#[derive(Serialize)]
pub struct EventNodeDone {
    pub event: &'static str,
    pub id: NodeId,
    pub leader: NodeId,
    pub parent: Option<NodeId>,
    pub phase: Phase,
    pub is_root: bool,
    pub children: Vec<NodeId>,
    pub elapsed_s: f64,
    pub timestamp: String,
}

impl EventNodeDone {
    pub fn new(snapshot: &NodeSnapshot, elapsed_s: f64) -> Self {
        Self {
            event: "node_done",
            id: snapshot.id,
            leader: snapshot.leader,
            parent: snapshot.parent,
            phase: snapshot.phase,
            is_root: snapshot.is_root,
            children: snapshot.positive_reports.clone(),
            elapsed_s,
            timestamp: now_iso(),
        }
    }
}

/// A node that did not report back before the deadline.
#[derive(Serialize)]
pub struct EventNodeTimeout {
    pub event: &'static str,
    pub id: NodeId,
    pub timestamp: String,
}

// ── Cluster / simulation summaries ──────────────────────────────

#[derive(Serialize)]
pub struct EventSummary {
    pub event: &'static str,
    pub mode: &'static str,
    pub nodes: usize,
    pub terminated: usize,
    pub leader: Option<NodeId>,
    pub root: Option<NodeId>,
    pub elapsed_s: f64,
}

#[derive(Serialize)]
pub struct EventSimulation {
    pub event: &'static str,
    pub seed: u64,
    pub deliveries: usize,
    pub messages: std::collections::BTreeMap<MessageType, usize>,
    pub terminate_initiators: Vec<NodeId>,
    pub spanning_tree: bool,
    pub lost: usize,
    pub exhausted: bool,
}
