//! In-memory network simulator.
//!
//! Runs a whole cluster of [`NodeState`]s without sockets. Each step the
//! scheduler picks, uniformly at random from a seeded RNG, either a node
//! whose startup action has not fired yet or one in-flight message. Since
//! every message travels over its own connection, any delivery order is
//! possible on a real network, and the scheduler explores exactly that.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::ProtocolError;
use crate::eventlog::NodeEvent;
use crate::message::Message;
use crate::runtime::{NodeSnapshot, NodeState, RuntimeEffect};
use crate::selection::SeededRandom;
use crate::topology::{Neighbor, Topology};
use crate::types::{MessageType, NodeId};

#[derive(Debug, Clone, Copy)]
struct InFlight {
    to: NodeId,
    message: Message,
}

/// A simulated cluster.
pub struct Network {
    nodes: BTreeMap<NodeId, NodeState>,
    unstarted: Vec<NodeId>,
    in_flight: Vec<InFlight>,
    rng: StdRng,
    report: Counters,
}

#[derive(Default)]
struct Counters {
    messages_by_type: BTreeMap<MessageType, usize>,
    terminate_initiators: Vec<NodeId>,
    sends_after_terminated: usize,
    lost: usize,
    deliveries: usize,
}

/// Outcome of [`Network::run`].
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub nodes: BTreeMap<NodeId, NodeSnapshot>,
    /// Every message put on the wire, by type.
    pub messages_by_type: BTreeMap<MessageType, usize>,
    /// Nodes that started a TERMINATE wave on their own.
    pub terminate_initiators: Vec<NodeId>,
    /// Sends emitted by nodes that were already Terminated.
    pub sends_after_terminated: usize,
    /// Messages addressed to ids outside the network.
    pub lost: usize,
    pub deliveries: usize,
    /// True if `max_steps` ran out with work still queued.
    pub exhausted: bool,
}

impl SimReport {
    pub fn all_terminated(&self) -> bool {
        self.nodes.values().all(|n| n.phase == crate::types::Phase::Terminated)
    }

    /// The leader every node agrees on, if they all agree.
    pub fn agreed_leader(&self) -> Option<NodeId> {
        let mut leaders = self.nodes.values().map(|n| n.leader);
        let first = leaders.next()?;
        leaders.all(|l| l == first).then_some(first)
    }

    pub fn root(&self) -> Option<NodeId> {
        let mut roots = self.nodes.values().filter(|n| n.is_root).map(|n| n.id);
        let root = roots.next()?;
        roots.next().is_none().then_some(root)
    }

    pub fn sent(&self, kind: MessageType) -> usize {
        self.messages_by_type.get(&kind).copied().unwrap_or(0)
    }

    /// True if the parent pointers form one tree spanning every node.
    ///
    /// The root is its own parent; every other node must reach the root
    /// by following parents without revisiting a node.
    pub fn is_spanning_tree(&self) -> bool {
        let Some(root) = self.root() else {
            return false;
        };
        self.nodes.keys().all(|&start| {
            let mut seen = BTreeSet::new();
            let mut current = start;
            while current != root {
                if !seen.insert(current) {
                    return false;
                }
                match self.nodes.get(&current).and_then(|n| n.parent) {
                    Some(parent) if parent != current => current = parent,
                    _ => return false,
                }
            }
            true
        })
    }
}

impl Network {
    /// Build a network from one topology record per node.
    pub fn from_topologies(topologies: &[Topology], seed: u64) -> Result<Self, ProtocolError> {
        let mut nodes = BTreeMap::new();
        for topology in topologies {
            topology.validate()?;
            let state = NodeState::from_topology(topology);
            if nodes.insert(topology.id, state).is_some() {
                return Err(ProtocolError::Config(format!(
                    "node {} appears twice",
                    topology.id
                )));
            }
        }
        Ok(Self {
            unstarted: nodes.keys().copied().collect(),
            nodes,
            in_flight: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            report: Counters::default(),
        })
    }

    /// Build a network from an undirected edge list. `ids` may name
    /// nodes with no edges.
    pub fn from_edges(ids: &[u64], edges: &[(u64, u64)], seed: u64) -> Result<Self, ProtocolError> {
        let mut adjacency: BTreeMap<u64, Vec<u64>> =
            ids.iter().map(|&id| (id, Vec::new())).collect();
        for &(a, b) in edges {
            for (from, to) in [(a, b), (b, a)] {
                let list = adjacency.entry(from).or_default();
                if !list.contains(&to) {
                    list.push(to);
                }
            }
        }

        let topologies: Vec<Topology> = adjacency
            .into_iter()
            .map(|(id, neighbors)| Topology {
                id: NodeId::new(id),
                address: format!("node-{id}"),
                neighbors: neighbors
                    .into_iter()
                    .map(|n| Neighbor {
                        id: NodeId::new(n),
                        address: format!("node-{n}"),
                        edge_weight: 0,
                    })
                    .collect(),
            })
            .collect();
        Self::from_topologies(&topologies, seed)
    }

    /// Run until no work is left or `max_steps` steps have been taken.
    pub fn run(mut self, max_steps: usize) -> SimReport {
        let mut steps = 0;
        while steps < max_steps && self.step() {
            steps += 1;
        }
        let exhausted = !self.unstarted.is_empty() || !self.in_flight.is_empty();
        if exhausted {
            tracing::warn!(steps, in_flight = self.in_flight.len(), "simulation stopped early");
        }

        let Counters {
            messages_by_type,
            terminate_initiators,
            sends_after_terminated,
            lost,
            deliveries,
        } = self.report;
        SimReport {
            nodes: self
                .nodes
                .iter()
                .map(|(&id, state)| (id, state.snapshot()))
                .collect(),
            messages_by_type,
            terminate_initiators,
            sends_after_terminated,
            lost,
            deliveries,
            exhausted,
        }
    }

    /// Take one scheduling decision. Returns false when nothing is left.
    pub fn step(&mut self) -> bool {
        let choices = self.unstarted.len() + self.in_flight.len();
        if choices == 0 {
            return false;
        }

        let pick = self.rng.random_range(0..choices);
        if pick < self.unstarted.len() {
            let id = self.unstarted.swap_remove(pick);
            let mut selector = SeededRandom::new(self.rng.random());
            if let Some(state) = self.nodes.get_mut(&id) {
                let was_terminated = state.is_terminated();
                let effects = state.handle_startup(&mut selector);
                self.apply(id, was_terminated, effects);
            }
        } else {
            let InFlight { to, message } = self.in_flight.swap_remove(pick - self.unstarted.len());
            self.report.deliveries += 1;
            if let Some(state) = self.nodes.get_mut(&to) {
                let was_terminated = state.is_terminated();
                // Through the codec, as on the wire.
                let effects = state.handle_incoming(&message.encode());
                self.apply(to, was_terminated, effects);
            }
        }
        true
    }

    fn apply(&mut self, id: NodeId, was_terminated: bool, effects: Vec<RuntimeEffect>) {
        for effect in effects {
            match effect {
                RuntimeEffect::Send { to, message } => {
                    *self
                        .report
                        .messages_by_type
                        .entry(message.msg_type)
                        .or_default() += 1;
                    if was_terminated {
                        self.report.sends_after_terminated += 1;
                    }
                    if self.nodes.contains_key(&to) {
                        self.in_flight.push(InFlight { to, message });
                    } else {
                        self.report.lost += 1;
                    }
                }
                RuntimeEffect::Record(NodeEvent::BecameRoot { .. }) => {
                    self.report.terminate_initiators.push(id);
                }
                RuntimeEffect::Record(event) => {
                    tracing::trace!(node = %id, ?event, "sim");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    fn id(n: u64) -> NodeId {
        NodeId::new(n)
    }

    #[test]
    fn line_of_two() {
        let report = Network::from_edges(&[1, 2], &[(1, 2)], 7).unwrap().run(1_000);

        assert!(!report.exhausted);
        assert!(report.all_terminated());
        assert_eq!(report.agreed_leader(), Some(id(2)));
        assert_eq!(report.root(), Some(id(2)));
        assert_eq!(report.nodes[&id(1)].parent, Some(id(2)));
        assert_eq!(report.sent(MessageType::Terminate), 1);
        assert_eq!(report.terminate_initiators, vec![id(2)]);
    }

    #[test]
    fn isolated_node_never_terminates() {
        let report = Network::from_edges(&[5], &[], 1).unwrap().run(100);
        assert!(!report.exhausted);
        assert_eq!(report.nodes[&id(5)].phase, Phase::Idle);
        assert!(report.messages_by_type.is_empty());
    }

    #[test]
    fn same_seed_same_run() {
        let edges = [(1, 2), (2, 3), (3, 4), (4, 1), (1, 3)];
        let a = Network::from_edges(&[], &edges, 42).unwrap().run(10_000);
        let b = Network::from_edges(&[], &edges, 42).unwrap().run(10_000);
        assert_eq!(a.messages_by_type, b.messages_by_type);
        assert_eq!(a.nodes, b.nodes);
    }

    #[test]
    fn neighbor_outside_network_counts_as_lost() {
        let topology = Topology::from_yaml_str(
            "id: 1\naddress: a\nneighbours:\n  - id: 9\n    address: z\n",
        )
        .unwrap();
        let report = Network::from_topologies(&[topology], 3).unwrap().run(100);
        assert_eq!(report.lost, 1);
        assert_eq!(report.nodes[&id(1)].phase, Phase::AwaitingReports);
    }

    #[test]
    fn duplicate_node_is_a_config_error() {
        let topology = Topology::from_yaml_str("id: 1\naddress: a\n").unwrap();
        let err = Network::from_topologies(&[topology.clone(), topology], 0)
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn step_budget_reports_exhaustion() {
        let report = Network::from_edges(&[], &[(1, 2), (2, 3)], 0).unwrap().run(2);
        assert!(report.exhausted);
    }
}
