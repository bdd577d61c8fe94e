//! Storage-protocol session seam
//!
//! The low-level storage client library is an external collaborator; the
//! round engine only needs a session it can clone per request and a keyed
//! async read restricted to a group list. Everything else stays behind
//! this trait.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("metadata session is not configured")]
    Unavailable,
    #[error("read failed: {0}")]
    Read(String),
    #[error("read timed out")]
    Timeout,
}

/// Keyed read access to the cluster's metadata namespace.
#[async_trait]
pub trait MetaSession: Send + Sync {
    /// Clone the underlying session. Sessions carry per-request state
    /// (namespace, group list), so every read goes through a fresh clone.
    fn clone_session(&self) -> Box<dyn MetaSession>;

    /// Read the value of `key` in `namespace`, restricted to `groups`.
    async fn read(&self, namespace: &str, key: &str, groups: &[u64]) -> Result<Vec<u8>, MetaError>;
}

/// Session used when no storage client is wired in. Every read fails,
/// which the round turns into a per-group status text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetaSession;

#[async_trait]
impl MetaSession for NullMetaSession {
    fn clone_session(&self) -> Box<dyn MetaSession> {
        Box::new(*self)
    }

    async fn read(
        &self,
        _namespace: &str,
        _key: &str,
        _groups: &[u64],
    ) -> Result<Vec<u8>, MetaError> {
        Err(MetaError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_session_fails_reads() {
        let session = NullMetaSession.clone_session();
        let err = session
            .read("metabalancer", "symmetric_groups", &[1])
            .await
            .unwrap_err();
        assert!(matches!(err, MetaError::Unavailable));
    }
}
