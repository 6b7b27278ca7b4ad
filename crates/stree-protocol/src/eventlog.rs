//! Per-node event log.
//!
//! An append-only file, one JSON object per line. Observability only:
//! nothing in the protocol ever reads it back, and a failed write never
//! affects the node.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::types::{MessageType, NodeId, Phase};

/// Something worth one log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NodeEvent {
    Started {
        address: String,
        neighbors: usize,
    },
    /// Startup action: first EXPLORE of our own candidacy.
    Initiated {
        to: NodeId,
        leader: NodeId,
    },
    /// Startup fired while the node had no neighbor to explore.
    Isolated,
    /// Startup fired after another candidate had already recruited us.
    StartupSkipped {
        phase: Phase,
    },
    Received {
        kind: MessageType,
        leader: NodeId,
        from: NodeId,
    },
    Sent {
        kind: MessageType,
        leader: NodeId,
        to: NodeId,
    },
    Adopted {
        leader: NodeId,
        parent: NodeId,
    },
    Rejected {
        candidate: NodeId,
        to: NodeId,
    },
    /// A well-formed message that did not change state.
    Ignored {
        kind: MessageType,
        leader: NodeId,
        from: NodeId,
        reason: String,
    },
    BecameRoot {
        leader: NodeId,
    },
    Terminated {
        leader: NodeId,
        parent: Option<NodeId>,
    },
    /// Unparsable inbound line.
    Dropped {
        reason: String,
    },
    SendFailed {
        kind: MessageType,
        to: NodeId,
        reason: String,
    },
}

#[derive(Serialize)]
struct LogLine<'a> {
    timestamp: String,
    node: NodeId,
    #[serde(flatten)]
    event: &'a NodeEvent,
}

/// Destination for [`NodeEvent`]s.
pub trait EventSink: Send {
    fn record(&mut self, node: NodeId, event: &NodeEvent);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullEventLog;

impl EventSink for NullEventLog {
    fn record(&mut self, _node: NodeId, _event: &NodeEvent) {}
}

/// `Log-<address>` file under a directory.
pub struct FileEventLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileEventLog {
    /// Open (creating if needed) `dir/file_name` for appending.
    pub fn open(dir: &Path, file_name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileEventLog {
    fn record(&mut self, node: NodeId, event: &NodeEvent) {
        let line = LogLine {
            timestamp: chrono::Utc::now().to_rfc3339(),
            node,
            event,
        };
        let json = match serde_json::to_string(&line) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("event log: serialize failed: {e}");
                return;
            }
        };
        if let Err(e) = writeln!(self.writer, "{json}").and_then(|_| self.writer.flush()) {
            tracing::warn!("event log {}: write failed: {e}", self.path.display());
        }
    }
}

/// In-memory sink, cheap to clone; every clone sees the same events.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    events: Arc<Mutex<Vec<NodeEvent>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for MemoryEventLog {
    fn record(&mut self, _node: NodeId, event: &NodeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_log_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = FileEventLog::open(dir.path(), "Log-10.0.0.1").unwrap();
        let node = NodeId::new(1);

        log.record(
            node,
            &NodeEvent::Received {
                kind: MessageType::Explore,
                leader: NodeId::new(3),
                from: NodeId::new(2),
            },
        );
        log.record(node, &NodeEvent::BecameRoot { leader: node });

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "received");
        assert_eq!(first["kind"], "explore");
        assert_eq!(first["leader"], 3);
        assert_eq!(first["from"], 2);
        assert_eq!(first["node"], 1);
        assert!(first["timestamp"].is_string());

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "became_root");
    }

    #[test]
    fn file_log_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            let mut log = FileEventLog::open(dir.path(), "Log-h").unwrap();
            log.record(NodeId::new(4), &NodeEvent::Isolated);
        }
        let text = std::fs::read_to_string(dir.path().join("Log-h")).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn memory_log_shared_between_clones() {
        let log = MemoryEventLog::new();
        let mut writer = log.clone();
        writer.record(NodeId::new(1), &NodeEvent::Isolated);
        assert_eq!(log.events(), vec![NodeEvent::Isolated]);
    }
}
