//! Wire message and its line codec.
//!
//! One message per line: `<TYPE>\t<leaderId>\t<senderId>\n` where TYPE
//! is one of `M` (explore), `P` (accept), `R` (reject), `T` (terminate).

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{MessageType, NodeId};

/// Field separator on the wire.
pub const FIELD_DELIMITER: char = '\t';

/// A protocol message as it travels between neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_type: MessageType,
    /// The candidate leader this message is about.
    pub leader: NodeId,
    /// The neighbor that sent it.
    pub sender: NodeId,
}

impl Message {
    pub fn new(msg_type: MessageType, leader: NodeId, sender: NodeId) -> Self {
        Self {
            msg_type,
            leader,
            sender,
        }
    }

    pub fn explore(leader: NodeId, sender: NodeId) -> Self {
        Self::new(MessageType::Explore, leader, sender)
    }

    pub fn accept(leader: NodeId, sender: NodeId) -> Self {
        Self::new(MessageType::Accept, leader, sender)
    }

    pub fn reject(leader: NodeId, sender: NodeId) -> Self {
        Self::new(MessageType::Reject, leader, sender)
    }

    pub fn terminate(leader: NodeId, sender: NodeId) -> Self {
        Self::new(MessageType::Terminate, leader, sender)
    }

    /// Encode as one LF-terminated line.
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{}{d}{}{d}{}\n",
            self.msg_type.wire_tag(),
            self.leader,
            self.sender,
            d = FIELD_DELIMITER
        )
        .into_bytes()
    }

    /// Decode one line. Fails closed on anything unexpected.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| ProtocolError::decode("line is not valid UTF-8"))?;
        let text = text
            .strip_suffix('\n')
            .map(|t| t.strip_suffix('\r').unwrap_or(t))
            .unwrap_or(text);
        if text.is_empty() {
            return Err(ProtocolError::decode("empty line"));
        }

        let fields: Vec<&str> = text.split(FIELD_DELIMITER).collect();
        let [tag, leader, sender] = fields.as_slice() else {
            return Err(ProtocolError::decode(format!(
                "expected 3 fields, got {}",
                fields.len()
            )));
        };

        let msg_type = MessageType::from_wire_tag(tag)
            .ok_or_else(|| ProtocolError::decode(format!("unknown type tag {tag:?}")))?;
        let leader = parse_id(leader, "leader")?;
        let sender = parse_id(sender, "sender")?;

        Ok(Self {
            msg_type,
            leader,
            sender,
        })
    }
}

fn parse_id(field: &str, name: &str) -> Result<NodeId, ProtocolError> {
    field
        .parse::<u64>()
        .map(NodeId::new)
        .map_err(|_| ProtocolError::decode(format!("bad {name} id {field:?}")))
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}, {}> from {}", self.msg_type, self.leader, self.sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> NodeId {
        NodeId::new(n)
    }

    #[test]
    fn encode_explore() {
        let msg = Message::explore(id(8), id(3));
        assert_eq!(msg.encode(), b"M\t8\t3\n");
    }

    #[test]
    fn encode_every_type_uses_its_tag() {
        assert_eq!(Message::accept(id(5), id(1)).encode(), b"P\t5\t1\n");
        assert_eq!(Message::reject(id(5), id(2)).encode(), b"R\t5\t2\n");
        assert_eq!(Message::terminate(id(5), id(5)).encode(), b"T\t5\t5\n");
    }

    #[test]
    fn decode_accepts_crlf_and_missing_lf() {
        let msg = Message::decode(b"R\t12\t4\r\n").unwrap();
        assert_eq!(msg, Message::reject(id(12), id(4)));

        let msg = Message::decode(b"T\t12\t4").unwrap();
        assert_eq!(msg, Message::terminate(id(12), id(4)));
    }

    #[test]
    fn decode_encoded_line() {
        let msg = Message::accept(id(u64::MAX), id(0));
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let err = Message::decode(b"X\t1\t2\n").unwrap_err();
        assert!(err.to_string().contains("unknown type tag"), "{err}");
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        assert!(Message::decode(b"M\t1\n").is_err());
        assert!(Message::decode(b"M\t1\t2\t3\n").is_err());
        // Sender must be its own field.
        assert!(Message::decode(b"M\t1 from 2\n").is_err());
    }

    #[test]
    fn decode_rejects_bad_ids() {
        assert!(Message::decode(b"M\t-1\t2\n").is_err());
        assert!(Message::decode(b"M\t1\tabc\n").is_err());
        assert!(Message::decode(b"M\t\t2\n").is_err());
        assert!(Message::decode(b"M\t 1\t2\n").is_err());
    }

    #[test]
    fn decode_rejects_empty_and_binary() {
        assert!(Message::decode(b"").is_err());
        assert!(Message::decode(b"\n").is_err());
        assert!(Message::decode(&[0xff, 0xfe, b'\n']).is_err());
    }

    #[test]
    fn display_is_readable() {
        let msg = Message::explore(id(7), id(2));
        assert_eq!(msg.to_string(), "<EXPLORE, 7> from 2");
    }
}
