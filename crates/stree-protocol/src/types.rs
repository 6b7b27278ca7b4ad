use serde::{Deserialize, Serialize};

pub use stree_transport::NodeId;

/// Message type. Determines which handler the node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Carries a candidate leader id along the graph.
    Explore,
    /// Positive report: the sender joined the tree under the current leader.
    Accept,
    /// Negative report: the sender already belongs to that leader's tree
    /// or declined the candidate.
    Reject,
    /// Root-initiated halt wave.
    Terminate,
}

impl MessageType {
    /// Single-letter wire tag.
    pub fn wire_tag(self) -> char {
        match self {
            MessageType::Explore => 'M',
            MessageType::Accept => 'P',
            MessageType::Reject => 'R',
            MessageType::Terminate => 'T',
        }
    }

    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        match tag {
            "M" => Some(MessageType::Explore),
            "P" => Some(MessageType::Accept),
            "R" => Some(MessageType::Reject),
            "T" => Some(MessageType::Terminate),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Explore => write!(f, "EXPLORE"),
            MessageType::Accept => write!(f, "ACCEPT"),
            MessageType::Reject => write!(f, "REJECT"),
            MessageType::Terminate => write!(f, "TERMINATE"),
        }
    }
}

/// Lifecycle of a node.
///
/// Follows the progression: Idle -> Exploring -> AwaitingReports ->
/// Forwarding -> Terminated. The root skips Forwarding: once its own
/// candidacy completes it broadcasts TERMINATE and goes straight to
/// Terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not yet started and not yet recruited by any candidate.
    Idle,
    /// An EXPLORE is outstanding and more neighbors are still pending.
    Exploring,
    /// Every neighbor has been handed an EXPLORE, waiting on the last report.
    AwaitingReports,
    /// Reported ACCEPT to the parent, waiting for TERMINATE.
    Forwarding,
    /// Absorbing.
    Terminated,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Exploring => "exploring",
            Phase::AwaitingReports => "awaiting_reports",
            Phase::Forwarding => "forwarding",
            Phase::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tags_are_stable() {
        assert_eq!(MessageType::Explore.wire_tag(), 'M');
        assert_eq!(MessageType::Accept.wire_tag(), 'P');
        assert_eq!(MessageType::Reject.wire_tag(), 'R');
        assert_eq!(MessageType::Terminate.wire_tag(), 'T');
    }

    #[test]
    fn wire_tag_lookup() {
        assert_eq!(MessageType::from_wire_tag("P"), Some(MessageType::Accept));
        assert_eq!(MessageType::from_wire_tag("m"), None);
        assert_eq!(MessageType::from_wire_tag("MM"), None);
        assert_eq!(MessageType::from_wire_tag(""), None);
    }
}
