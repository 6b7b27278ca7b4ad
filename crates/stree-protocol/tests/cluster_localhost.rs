//! Integration tests: a full cluster of runtimes over localhost TCP.

use std::collections::BTreeMap;
use std::time::Duration;

use stree_protocol::runtime::transport::AddressedTcp;
use stree_protocol::{
    FirstNeighbor, MemoryEventLog, Neighbor, NodeEvent, NodeId, NodeSnapshot, Phase,
    ProtocolRuntime, RuntimeConfig, Topology,
};
use stree_transport::{TcpNode, TransportConfig};

fn id(n: u64) -> NodeId {
    NodeId::new(n)
}

/// Bind one listener per node, then describe the graph with the real
/// ephemeral addresses.
async fn bind_cluster(edges: &[(u64, u64)]) -> Vec<(TcpNode, Topology)> {
    let mut adjacency: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for &(a, b) in edges {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    let mut nodes = BTreeMap::new();
    for &n in adjacency.keys() {
        let node = TcpNode::bind("127.0.0.1:0", TransportConfig::new())
            .await
            .unwrap();
        nodes.insert(n, node);
    }
    let addresses: BTreeMap<u64, String> = nodes
        .iter()
        .map(|(&n, node)| (n, node.local_addr().to_string()))
        .collect();

    nodes
        .into_iter()
        .map(|(n, node)| {
            let topology = Topology {
                id: id(n),
                address: addresses[&n].clone(),
                neighbors: adjacency[&n]
                    .iter()
                    .map(|&m| Neighbor {
                        id: id(m),
                        address: addresses[&m].clone(),
                        edge_weight: 1,
                    })
                    .collect(),
            };
            (node, topology)
        })
        .collect()
}

fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        settle_delay: Duration::from_millis(100),
        seed: Some(5),
        ..RuntimeConfig::default()
    }
}

async fn run_cluster(edges: &[(u64, u64)]) -> BTreeMap<NodeId, NodeSnapshot> {
    let mut running = Vec::new();
    for (node, topology) in bind_cluster(edges).await {
        let channels = ProtocolRuntime::spawn(node, &topology, fast_config()).unwrap();
        running.push(channels.done);
    }

    let mut finals = BTreeMap::new();
    for done in running {
        let snapshot = tokio::time::timeout(Duration::from_secs(20), done)
            .await
            .expect("node did not terminate")
            .unwrap();
        finals.insert(snapshot.id, snapshot);
    }
    finals
}

#[tokio::test]
async fn triangle_over_tcp() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .try_init();

    let finals = run_cluster(&[(1, 2), (2, 3), (1, 3)]).await;

    assert_eq!(finals.len(), 3);
    for snapshot in finals.values() {
        assert_eq!(snapshot.phase, Phase::Terminated);
        assert_eq!(snapshot.leader, id(3));
    }
    assert!(finals[&id(3)].is_root);
    assert_eq!(finals[&id(3)].parent, Some(id(3)));
    assert!(matches!(finals[&id(1)].parent, Some(p) if p != id(1)));
    assert!(matches!(finals[&id(2)].parent, Some(p) if p != id(2)));
}

#[tokio::test]
async fn ring_of_six_over_tcp() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .try_init();

    let edges: Vec<(u64, u64)> = (1..=6).map(|i| (i, i % 6 + 1)).collect();
    let finals = run_cluster(&edges).await;

    let roots: Vec<NodeId> = finals.values().filter(|s| s.is_root).map(|s| s.id).collect();
    assert_eq!(roots, vec![id(6)]);
    assert!(finals.values().all(|s| s.leader == id(6)));
    assert!(finals.values().all(|s| s.phase == Phase::Terminated));
}

/// Events reach both the observer channel and the memory sink, in order.
#[tokio::test]
async fn line_of_two_events() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .try_init();

    let mut logs = BTreeMap::new();
    let mut running = Vec::new();
    for (node, topology) in bind_cluster(&[(1, 2)]).await {
        let sink = MemoryEventLog::new();
        logs.insert(topology.id, sink.clone());
        let transport = AddressedTcp::new(node.sender(), topology.address_book(0));
        let channels = ProtocolRuntime::spawn_with(
            node,
            transport,
            &topology,
            fast_config(),
            Box::new(FirstNeighbor),
            Box::new(sink),
        );
        running.push(channels);
    }

    for channels in running.iter_mut() {
        let first = channels.events.recv().await.unwrap();
        assert!(matches!(first, NodeEvent::Started { neighbors: 1, .. }));
    }
    for channels in running {
        let snapshot = tokio::time::timeout(Duration::from_secs(10), channels.done)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.phase, Phase::Terminated);
    }

    let root_events = logs[&id(2)].events();
    assert!(root_events
        .iter()
        .any(|e| matches!(e, NodeEvent::BecameRoot { leader } if *leader == id(2))));
    assert_eq!(
        root_events
            .iter()
            .filter(|e| matches!(e, NodeEvent::Sent { kind: stree_protocol::MessageType::Terminate, .. }))
            .count(),
        1
    );

    let child_events = logs[&id(1)].events();
    assert!(matches!(
        child_events.last(),
        Some(NodeEvent::Terminated { leader, parent: Some(p) }) if *leader == id(2) && *p == id(2)
    ));
}

/// A node writes its events to `Log-<address>` in the log directory.
#[tokio::test]
async fn event_log_file_is_written() {
    let dir = tempfile::tempdir().unwrap();

    let mut running = Vec::new();
    let mut names = Vec::new();
    for (node, topology) in bind_cluster(&[(1, 2)]).await {
        names.push(topology.log_file_name());
        let config = RuntimeConfig {
            log_dir: Some(dir.path().to_path_buf()),
            ..fast_config()
        };
        running.push(ProtocolRuntime::spawn(node, &topology, config).unwrap().done);
    }
    for done in running {
        tokio::time::timeout(Duration::from_secs(10), done)
            .await
            .unwrap()
            .unwrap();
    }

    for name in names {
        let text = std::fs::read_to_string(dir.path().join(&name)).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.first().unwrap()["event"], "started");
        assert_eq!(lines.last().unwrap()["event"], "terminated");
        assert!(lines.iter().all(|l| l["timestamp"].is_string()));
    }
}

/// Shutdown stops a node that can never terminate.
#[tokio::test]
async fn isolated_node_shuts_down_on_request() {
    let node = TcpNode::bind("127.0.0.1:0", TransportConfig::new())
        .await
        .unwrap();
    let topology = Topology {
        id: id(1),
        address: node.local_addr().to_string(),
        neighbors: Vec::new(),
    };
    let channels = ProtocolRuntime::spawn(node, &topology, fast_config()).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = channels.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Idle);

    channels.handle.shutdown().await;
    let last = tokio::time::timeout(Duration::from_secs(5), channels.done)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.phase, Phase::Idle);
}
