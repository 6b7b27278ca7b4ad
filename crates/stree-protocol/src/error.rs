/// Protocol-level errors.
///
/// Only [`ProtocolError::Config`] is fatal: a node without a valid
/// topology record cannot run. Everything else is logged and the
/// offending message or send is discarded.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(#[from] stree_transport::TransportError),

    #[error("malformed message: {reason}")]
    Decode { reason: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for ProtocolError {
    fn from(e: serde_yaml::Error) -> Self {
        ProtocolError::Config(e.to_string())
    }
}

impl ProtocolError {
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        ProtocolError::Decode {
            reason: reason.into(),
        }
    }

    /// Whether the node must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_config() {
        let err = ProtocolError::Config("missing field `id`".into());
        assert_eq!(err.to_string(), "config error: missing field `id`");
    }

    #[test]
    fn test_display_decode() {
        let err = ProtocolError::decode("unknown type tag \"X\"");
        assert_eq!(err.to_string(), "malformed message: unknown type tag \"X\"");
    }

    #[test]
    fn test_display_invariant() {
        let err = ProtocolError::InvariantViolation("report from non-neighbor 9".into());
        assert_eq!(err.to_string(), "invariant violation: report from non-neighbor 9");
    }

    #[test]
    fn test_only_config_is_fatal() {
        assert!(ProtocolError::Config("x".into()).is_fatal());
        assert!(!ProtocolError::decode("x").is_fatal());
        assert!(!ProtocolError::InvariantViolation("x".into()).is_fatal());
        assert!(!ProtocolError::Transport(stree_transport::TransportError::Shutdown).is_fatal());
    }
}
