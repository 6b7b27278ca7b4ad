use std::time::Instant;

use anyhow::Context;
use stree_protocol::{Phase, ProtocolRuntime, Topology};
use stree_transport::TcpNode;

use crate::common;
use crate::events::{emit, EventNodeDone};
use crate::NodeOpts;

/// Serve one node until it terminates or Ctrl+C.
pub async fn run(topology: Topology, listen: Option<String>, opts: &NodeOpts) -> anyhow::Result<()> {
    let start = Instant::now();
    let listen = listen.unwrap_or_else(|| topology.listen_addr(opts.port));

    let node = TcpNode::bind(&listen, opts.transport_config())
        .await
        .with_context(|| format!("node {} cannot listen", topology.id))?;
    eprintln!(
        "Node {} listening on {} ({} neighbours)",
        topology.id,
        node.local_addr(),
        topology.neighbors.len()
    );

    let mut channels = ProtocolRuntime::spawn(node, &topology, opts.runtime_config())?;

    let snapshot = tokio::select! {
        result = &mut channels.done => result?,
        _ = common::ctrl_c() => {
            channels.handle.shutdown().await;
            (&mut channels.done).await?
        }
    };

    emit(&EventNodeDone::new(&snapshot, start.elapsed().as_secs_f64()));

    if snapshot.phase != Phase::Terminated {
        anyhow::bail!("node {} stopped in phase {}", snapshot.id, snapshot.phase);
    }
    Ok(())
}
