//! Stable entity keys
//!
//! Every entity in a snapshot is addressed by a key computed from its
//! immutable attributes. Cross-references inside the cluster graph are
//! stored as keys and resolved through the `Storage` indexes, so no
//! reference can outlive a snapshot swap.

use serde::{Deserialize, Serialize};

/// Replication group identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct GroupId(u64);

impl GroupId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for GroupId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a polled node: `host:port:family`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    #[must_use]
    pub fn new(host: &str, port: u16, family: u32) -> Self {
        Self(format!("{}:{}:{}", host, port, family))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Key of a backend: `<node-key>/<backend-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendKey(String);

impl BackendKey {
    #[must_use]
    pub fn new(node: &NodeKey, backend_id: u64) -> Self {
        Self(format!("{}/{}", node, backend_id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The node part of the key (everything before the last `/`).
    #[must_use]
    pub fn node_part(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(n, _)| n)
    }
}

impl std::fmt::Display for BackendKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a filesystem: `<node-key>/<fsid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FsKey(String);

impl FsKey {
    #[must_use]
    pub fn new(node: &NodeKey, fsid: u64) -> Self {
        Self(format!("{}/{}", node, fsid))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a couple: member group ids, sorted, joined by `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoupleKey(String);

impl CoupleKey {
    /// Build the canonical key from a set of group ids. The input does not
    /// have to be sorted.
    #[must_use]
    pub fn from_group_ids(ids: &[GroupId]) -> Self {
        let mut sorted: Vec<u64> = ids.iter().map(GroupId::get).collect();
        sorted.sort_unstable();
        let parts: Vec<String> = sorted.iter().map(u64::to_string).collect();
        Self(parts.join(":"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CoupleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
