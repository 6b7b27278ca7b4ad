use std::time::{Duration, Instant};

use anyhow::Context;
use stree_protocol::{NodeSnapshot, Phase, ProtocolRuntime, Topology};
use stree_transport::TcpNode;

use crate::events::{emit, now_iso, EventNodeDone, EventNodeTimeout, EventSummary};
use crate::NodeOpts;

pub struct ClusterConfig {
    /// Deadline for the whole cluster to terminate.
    pub timeout: Duration,
    /// Pause after the last node finished.
    pub grace: Duration,
}

/// Run every topology as a node of one in-process cluster.
///
/// All listeners are bound before any runtime starts, so no startup
/// EXPLORE can hit a port that is not open yet.
pub async fn run(topologies: Vec<Topology>, opts: &NodeOpts, config: ClusterConfig) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut bound = Vec::with_capacity(topologies.len());
    for topology in topologies {
        let listen = topology.listen_addr(opts.port);
        let node = TcpNode::bind(&listen, opts.transport_config())
            .await
            .with_context(|| format!("node {} cannot listen on {listen}", topology.id))?;
        bound.push((node, topology));
    }
    tracing::info!(nodes = bound.len(), "cluster bound");

    let mut running = Vec::with_capacity(bound.len());
    for (node, topology) in bound {
        let channels = ProtocolRuntime::spawn(node, &topology, opts.runtime_config())?;
        running.push((topology.id, channels));
    }

    let deadline = tokio::time::Instant::now() + config.timeout;
    let mut finals: Vec<NodeSnapshot> = Vec::with_capacity(running.len());
    for (id, mut channels) in running {
        let snapshot = match tokio::time::timeout_at(deadline, &mut channels.done).await {
            Ok(result) => result?,
            Err(_) => {
                emit(&EventNodeTimeout {
                    event: "node_timeout",
                    id,
                    timestamp: now_iso(),
                });
                channels.handle.shutdown().await;
                channels.done.await?
            }
        };
        emit(&EventNodeDone::new(&snapshot, start.elapsed().as_secs_f64()));
        finals.push(snapshot);
    }

    tokio::time::sleep(config.grace).await;

    let summary = summarize(&finals, start.elapsed().as_secs_f64());
    emit(&summary);

    if summary.terminated != summary.nodes {
        anyhow::bail!(
            "{} of {} nodes did not terminate",
            summary.nodes - summary.terminated,
            summary.nodes
        );
    }
    Ok(())
}

fn summarize(finals: &[NodeSnapshot], elapsed_s: f64) -> EventSummary {
    let leader = finals
        .first()
        .map(|s| s.leader)
        .filter(|&l| finals.iter().all(|s| s.leader == l));
    let mut roots = finals.iter().filter(|s| s.is_root).map(|s| s.id);
    let root = match (roots.next(), roots.next()) {
        (Some(root), None) => Some(root),
        _ => None,
    };

    EventSummary {
        event: "summary",
        mode: "cluster",
        nodes: finals.len(),
        terminated: finals.iter().filter(|s| s.phase == Phase::Terminated).count(),
        leader,
        root,
        elapsed_s,
    }
}
