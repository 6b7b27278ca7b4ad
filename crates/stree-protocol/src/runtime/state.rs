use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::Serialize;

use crate::eventlog::NodeEvent;
use crate::message::Message;
use crate::selection::NeighborSelector;
use crate::topology::Topology;
use crate::types::{MessageType, NodeId, Phase};

use super::effect::RuntimeEffect;

/// Point-in-time view of a node, for observers and final reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub leader: NodeId,
    pub parent: Option<NodeId>,
    pub phase: Phase,
    pub is_root: bool,
    pub pending: Vec<NodeId>,
    pub positive_reports: Vec<NodeId>,
    pub negative_reports: Vec<NodeId>,
}

/// Complete protocol state of one node. Pure logic without I/O.
///
/// Every `handle_*` method returns `Vec<RuntimeEffect>`; none of them
/// touch the network or the log. The node explores one neighbor at a
/// time: an EXPLORE goes out, the matching report comes back, the next
/// pending neighbor is explored. Once nothing is pending the node either
/// reports ACCEPT to its parent or, if it is its own leader, becomes the
/// root and starts the TERMINATE wave.
pub struct NodeState {
    local_id: NodeId,
    /// Topology order, fixed for the node's lifetime.
    neighbors: Vec<NodeId>,
    neighbor_set: HashSet<NodeId>,

    leader: NodeId,
    parent: Option<NodeId>,
    /// Neighbors not yet explored under the current leader.
    pending: VecDeque<NodeId>,
    pending_set: HashSet<NodeId>,
    /// Neighbor holding our single outstanding EXPLORE.
    awaiting: Option<NodeId>,
    positive: BTreeSet<NodeId>,
    negative: BTreeSet<NodeId>,

    phase: Phase,
    root: bool,
}

impl NodeState {
    pub fn new(local_id: NodeId, neighbors: Vec<NodeId>) -> Self {
        let neighbor_set: HashSet<NodeId> = neighbors.iter().copied().collect();
        Self {
            pending: neighbors.iter().copied().collect(),
            pending_set: neighbor_set.clone(),
            neighbor_set,
            neighbors,
            local_id,
            leader: local_id,
            parent: None,
            awaiting: None,
            positive: BTreeSet::new(),
            negative: BTreeSet::new(),
            phase: Phase::Idle,
            root: false,
        }
    }

    pub fn from_topology(topology: &Topology) -> Self {
        Self::new(topology.id, topology.neighbor_ids())
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    pub fn leader(&self) -> NodeId {
        self.leader
    }

    /// Tree edge toward the root. The root's parent is itself.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    pub fn pending(&self) -> Vec<NodeId> {
        self.pending.iter().copied().collect()
    }

    pub fn awaiting(&self) -> Option<NodeId> {
        self.awaiting
    }

    pub fn positive_reports(&self) -> &BTreeSet<NodeId> {
        &self.positive
    }

    pub fn negative_reports(&self) -> &BTreeSet<NodeId> {
        &self.negative
    }

    /// Neighbors that joined the tree under us.
    pub fn children(&self) -> &BTreeSet<NodeId> {
        &self.positive
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.local_id,
            leader: self.leader,
            parent: self.parent,
            phase: self.phase,
            is_root: self.root,
            pending: self.pending(),
            positive_reports: self.positive.iter().copied().collect(),
            negative_reports: self.negative.iter().copied().collect(),
        }
    }

    // ── Startup ──────────────────────────────────────────────────────────

    /// The single spontaneous action: propose ourselves to one neighbor.
    ///
    /// Only an Idle node starts a candidacy. A node already recruited by
    /// a larger leader stays quiet, and a node without neighbors stays
    /// Idle forever.
    pub fn handle_startup(&mut self, selector: &mut dyn NeighborSelector) -> Vec<RuntimeEffect> {
        if self.phase != Phase::Idle {
            return vec![RuntimeEffect::Record(NodeEvent::StartupSkipped {
                phase: self.phase,
            })];
        }

        let candidates = self.pending();
        let Some(index) = selector
            .select(&candidates)
            .filter(|&i| i < candidates.len())
        else {
            return vec![RuntimeEffect::Record(NodeEvent::Isolated)];
        };

        let target = candidates[index];
        self.remove_pending(target);
        self.parent = Some(self.local_id);
        self.leader = self.local_id;

        let mut effects = vec![RuntimeEffect::Record(NodeEvent::Initiated {
            to: target,
            leader: self.leader,
        })];
        self.explore(target, &mut effects);
        effects
    }

    // ── Inbound ──────────────────────────────────────────────────────────

    /// Decode one wire line and dispatch it. Malformed lines are dropped.
    pub fn handle_incoming(&mut self, raw: &[u8]) -> Vec<RuntimeEffect> {
        match Message::decode(raw) {
            Ok(message) => self.handle_message(message),
            Err(e) => vec![RuntimeEffect::Record(NodeEvent::Dropped {
                reason: e.to_string(),
            })],
        }
    }

    pub fn handle_message(&mut self, message: Message) -> Vec<RuntimeEffect> {
        let mut effects = vec![RuntimeEffect::Record(NodeEvent::Received {
            kind: message.msg_type,
            leader: message.leader,
            from: message.sender,
        })];

        if !self.neighbor_set.contains(&message.sender) {
            effects.push(ignored(&message, "sender is not a neighbour"));
            return effects;
        }

        match message.msg_type {
            MessageType::Terminate => self.handle_terminate(message, &mut effects),
            _ if self.is_terminated() => {
                effects.push(ignored(&message, "node already terminated"));
            }
            MessageType::Explore => self.handle_explore(message, &mut effects),
            MessageType::Accept | MessageType::Reject => self.handle_report(message, &mut effects),
        }
        effects
    }

    fn handle_explore(&mut self, message: Message, effects: &mut Vec<RuntimeEffect>) {
        let Message {
            leader: candidate,
            sender,
            ..
        } = message;

        if candidate > self.leader {
            self.adopt(candidate, sender);
            effects.push(RuntimeEffect::Record(NodeEvent::Adopted {
                leader: candidate,
                parent: sender,
            }));
            self.advance(effects);
            return;
        }

        // Our parent never legitimately explores us twice under one
        // leader; this is a leftover of an older, smaller candidacy.
        // A REJECT{leader} here would read as our subtree report.
        if self.parent == Some(sender) {
            effects.push(ignored(&message, "stale explore from parent"));
            return;
        }

        effects.push(RuntimeEffect::Record(NodeEvent::Rejected { candidate, to: sender }));
        effects.push(RuntimeEffect::send(
            sender,
            Message::reject(self.leader, self.local_id),
        ));
    }

    fn handle_report(&mut self, message: Message, effects: &mut Vec<RuntimeEffect>) {
        if message.leader != self.leader {
            effects.push(ignored(&message, "report for a different leader"));
            return;
        }

        let sender = message.sender;
        if message.msg_type == MessageType::Accept {
            self.positive.insert(sender);
        } else {
            self.negative.insert(sender);
        }
        self.remove_pending(sender);

        if self.awaiting != Some(sender) {
            effects.push(ignored(&message, "recorded, not the awaited neighbour"));
            return;
        }

        self.awaiting = None;
        self.advance(effects);
    }

    fn handle_terminate(&mut self, message: Message, effects: &mut Vec<RuntimeEffect>) {
        if self.is_terminated() {
            effects.push(ignored(&message, "already terminated"));
            return;
        }

        for &neighbor in &self.neighbors {
            if neighbor != message.sender {
                effects.push(RuntimeEffect::send(
                    neighbor,
                    Message::terminate(message.leader, self.local_id),
                ));
            }
        }
        self.terminate(effects);
    }

    // ── Transitions ──────────────────────────────────────────────────────

    fn adopt(&mut self, leader: NodeId, parent: NodeId) {
        self.leader = leader;
        self.parent = Some(parent);
        self.positive.clear();
        self.negative.clear();
        self.awaiting = None;
        self.pending = self
            .neighbors
            .iter()
            .copied()
            .filter(|&n| n != parent)
            .collect();
        self.pending_set = self.pending.iter().copied().collect();
    }

    /// Explore the next pending neighbor, or finish if none is left.
    fn advance(&mut self, effects: &mut Vec<RuntimeEffect>) {
        match self.pending.pop_front() {
            Some(next) => {
                self.pending_set.remove(&next);
                self.explore(next, effects);
            }
            None => self.finish(effects),
        }
    }

    fn explore(&mut self, target: NodeId, effects: &mut Vec<RuntimeEffect>) {
        self.awaiting = Some(target);
        self.phase = if self.pending.is_empty() {
            Phase::AwaitingReports
        } else {
            Phase::Exploring
        };
        effects.push(RuntimeEffect::send(
            target,
            Message::explore(self.leader, self.local_id),
        ));
    }

    fn finish(&mut self, effects: &mut Vec<RuntimeEffect>) {
        self.awaiting = None;

        if self.leader == self.local_id {
            self.root = true;
            effects.push(RuntimeEffect::Record(NodeEvent::BecameRoot {
                leader: self.leader,
            }));
            for &neighbor in &self.neighbors {
                effects.push(RuntimeEffect::send(
                    neighbor,
                    Message::terminate(self.leader, self.local_id),
                ));
            }
            self.terminate(effects);
            return;
        }

        // Non-root nodes only reach here after an adoption.
        if let Some(parent) = self.parent {
            self.phase = Phase::Forwarding;
            effects.push(RuntimeEffect::send(
                parent,
                Message::accept(self.leader, self.local_id),
            ));
        }
    }

    fn terminate(&mut self, effects: &mut Vec<RuntimeEffect>) {
        self.phase = Phase::Terminated;
        effects.push(RuntimeEffect::Record(NodeEvent::Terminated {
            leader: self.leader,
            parent: self.parent,
        }));
    }

    fn remove_pending(&mut self, neighbor: NodeId) {
        if self.pending_set.remove(&neighbor) {
            self.pending.retain(|&n| n != neighbor);
        }
    }
}

fn ignored(message: &Message, reason: &str) -> RuntimeEffect {
    RuntimeEffect::Record(NodeEvent::Ignored {
        kind: message.msg_type,
        leader: message.leader,
        from: message.sender,
        reason: reason.to_string(),
    })
}
