use thiserror::Error;

/// The taxonomy of failures a master component can hit while serving a
/// builder, a client, or an internal caller. Kept deliberately small and
/// named by what went wrong rather than which component saw it, so that
/// TRANSPORT can carry it across a wire boundary without each side needing
/// the other's internal error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("database unavailable: {0}")]
    DbUnavailable(String),

    #[error("database integrity violation: {0}")]
    DbIntegrity(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("filesystem error: {0}")]
    FsError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_mismatch_renders_both_sides() {
        let err = ErrorKind::HashMismatch {
            expected: "aaaa".into(),
            actual: "bbbb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("aaaa"));
        assert!(msg.contains("bbbb"));
    }

    #[test]
    fn not_found_carries_its_message() {
        let err = ErrorKind::NotFound("package numpy".into());
        assert_eq!(err.to_string(), "not found: package numpy");
    }
}
