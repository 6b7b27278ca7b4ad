use stree_protocol::sim::Network;
use stree_protocol::{Phase, Topology};

use crate::events::{emit, EventNodeDone, EventSimulation, EventSummary};

/// Replay the cluster in memory under `runs` consecutive seeds.
pub fn run(topologies: &[Topology], seed: u64, runs: u64, max_steps: usize) -> anyhow::Result<()> {
    let mut failed = Vec::new();

    for seed in seed..seed.saturating_add(runs.max(1)) {
        let report = Network::from_topologies(topologies, seed)?.run(max_steps);

        if runs <= 1 {
            for snapshot in report.nodes.values() {
                emit(&EventNodeDone::new(snapshot, 0.0));
            }
        }
        emit(&EventSimulation {
            event: "simulation",
            seed,
            deliveries: report.deliveries,
            messages: report.messages_by_type.clone(),
            terminate_initiators: report.terminate_initiators.clone(),
            spanning_tree: report.is_spanning_tree(),
            lost: report.lost,
            exhausted: report.exhausted,
        });

        let summary = EventSummary {
            event: "summary",
            mode: "simulate",
            nodes: report.nodes.len(),
            terminated: report
                .nodes
                .values()
                .filter(|n| n.phase == Phase::Terminated)
                .count(),
            leader: report.agreed_leader(),
            root: report.root(),
            elapsed_s: 0.0,
        };
        if report.exhausted || summary.terminated != summary.nodes {
            failed.push(seed);
        }
        emit(&summary);
    }

    if !failed.is_empty() {
        anyhow::bail!("{} run(s) did not converge, seeds {:?}", failed.len(), failed);
    }
    Ok(())
}
