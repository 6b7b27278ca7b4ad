//! Static topology records.
//!
//! Each node is started with one YAML file describing itself and its
//! neighbors:
//!
//! ```yaml
//! id: 3
//! address: 10.0.0.3
//! neighbours:
//!   - id: 1
//!     address: 10.0.0.1
//!     edge_weight: 4
//! ```
//!
//! `edge_weight` is carried along but never consulted.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::NodeId;

/// One adjacent node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: NodeId,
    pub address: String,
    #[serde(default)]
    pub edge_weight: i64,
}

/// A node's identity plus its fixed neighbor list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub id: NodeId,
    pub address: String,
    #[serde(default, rename = "neighbours")]
    pub neighbors: Vec<Neighbor>,
}

impl Topology {
    /// Read and validate a topology file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
            .map_err(|e| ProtocolError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate a topology record.
    pub fn from_yaml_str(text: &str) -> Result<Self, ProtocolError> {
        let topology: Topology = serde_yaml::from_str(text)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Neighbor ids must be unique and must not name the node itself.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.address.trim().is_empty() {
            return Err(ProtocolError::Config(format!("node {} has an empty address", self.id)));
        }
        let mut seen = HashSet::new();
        for neighbor in &self.neighbors {
            if neighbor.id == self.id {
                return Err(ProtocolError::Config(format!(
                    "node {} lists itself as a neighbour",
                    self.id
                )));
            }
            if !seen.insert(neighbor.id) {
                return Err(ProtocolError::Config(format!(
                    "node {} lists neighbour {} more than once",
                    self.id, neighbor.id
                )));
            }
            if neighbor.address.trim().is_empty() {
                return Err(ProtocolError::Config(format!(
                    "neighbour {} of node {} has an empty address",
                    neighbor.id, self.id
                )));
            }
        }
        Ok(())
    }

    /// Neighbor ids in topology order.
    pub fn neighbor_ids(&self) -> Vec<NodeId> {
        self.neighbors.iter().map(|n| n.id).collect()
    }

    /// Dialable address of every neighbor.
    pub fn address_book(&self, port: u16) -> BTreeMap<NodeId, String> {
        self.neighbors
            .iter()
            .map(|n| (n.id, stree_transport::resolve_addr(&n.address, port)))
            .collect()
    }

    /// Where this node should listen.
    pub fn listen_addr(&self, port: u16) -> String {
        stree_transport::resolve_addr(&self.address, port)
    }

    /// Name of the per-node event log file.
    pub fn log_file_name(&self) -> String {
        format!("Log-{}", self.address.replace(['/', '\\'], "_"))
    }
}
