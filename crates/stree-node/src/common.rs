use std::path::PathBuf;

use anyhow::Context;
use stree_protocol::Topology;

/// Load every topology file, failing on the first bad one.
pub fn load_topologies(paths: &[PathBuf]) -> anyhow::Result<Vec<Topology>> {
    if paths.is_empty() {
        anyhow::bail!("no topology files given");
    }
    paths
        .iter()
        .map(|p| Topology::load(p).with_context(|| format!("loading {}", p.display())))
        .collect()
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    eprintln!("\nCtrl+C received, shutting down...");
}
