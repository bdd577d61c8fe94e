//! Backend state

use serde::Serialize;
use std::time::Duration;

use crate::stats::BackendStat;
use crate::types::{BackendKey, FsKey, GroupId, NodeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendStatus {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "RO")]
    Ro,
    #[serde(rename = "BAD")]
    Bad,
    #[serde(rename = "STALLED")]
    Stalled,
    #[serde(rename = "BROKEN")]
    Broken,
}

impl BackendStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Ok => "OK",
            Self::Ro => "RO",
            Self::Bad => "BAD",
            Self::Stalled => "STALLED",
            Self::Broken => "BROKEN",
        }
    }
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One storage shard on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Backend {
    pub key: BackendKey,
    pub node_key: NodeKey,
    pub backend_id: u64,
    pub stat: BackendStat,
    /// Node stat timestamp at the time `stat` was parsed
    pub ts_sec: u64,
    pub ts_usec: u64,
    /// EROFS error count from `stat_commit` for this backend
    pub rofs_errors: u64,
    pub status: BackendStatus,
}

impl Backend {
    #[must_use]
    pub fn new(node_key: NodeKey, stat: BackendStat, ts_sec: u64, ts_usec: u64) -> Self {
        let key = BackendKey::new(&node_key, stat.backend_id);
        Self {
            key,
            node_key,
            backend_id: stat.backend_id,
            stat,
            ts_sec,
            ts_usec,
            rofs_errors: 0,
            status: BackendStatus::Init,
        }
    }

    /// Merge a freshly parsed record. The record with the newer
    /// `(ts_sec, ts_usec)` wins; an older record is dropped.
    pub fn merge(&mut self, stat: BackendStat, ts_sec: u64, ts_usec: u64, rofs_errors: u64) {
        if (ts_sec, ts_usec) < (self.ts_sec, self.ts_usec) {
            return;
        }
        self.stat = stat;
        self.ts_sec = ts_sec;
        self.ts_usec = ts_usec;
        self.rofs_errors = rofs_errors;
    }

    /// Group id this backend claims to serve, zero when unassigned.
    #[must_use]
    pub fn group_id(&self) -> Option<GroupId> {
        (self.stat.group != 0).then(|| GroupId::new(self.stat.group))
    }

    /// Filesystem key, when vfs stats carried an fsid.
    #[must_use]
    pub fn fs_key(&self) -> Option<FsKey> {
        (self.stat.fsid != 0).then(|| FsKey::new(&self.node_key, self.stat.fsid))
    }

    #[must_use]
    pub fn total_space(&self) -> u64 {
        self.stat.vfs_blocks.saturating_mul(self.stat.vfs_bsize)
    }

    #[must_use]
    pub fn free_space(&self) -> u64 {
        self.stat.vfs_bavail.saturating_mul(self.stat.vfs_bsize)
    }

    /// Derive the status from the current record.
    ///
    /// Stat errors dominate; then staleness of the record against wall
    /// time, then the enabled state, then the read-only signals (explicit
    /// flag or EROFS counters from `stat_commit`).
    pub fn recalculate_status(&mut self, now_sec: u64, stale_timeout: Duration) {
        self.status = if self.stat.vfs_error != 0 || self.stat.dstat_error != 0 {
            BackendStatus::Bad
        } else if now_sec.saturating_sub(self.ts_sec) > stale_timeout.as_secs() {
            BackendStatus::Stalled
        } else if self.stat.state != 1 {
            BackendStatus::Init
        } else if self.stat.read_only != 0 || self.rofs_errors > 0 {
            BackendStatus::Ro
        } else {
            BackendStatus::Ok
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STALE: Duration = Duration::from_secs(120);

    fn backend(state: u64, read_only: u64) -> Backend {
        let stat = BackendStat {
            backend_id: 1,
            group: 7,
            state,
            read_only,
            vfs_blocks: 1000,
            vfs_bavail: 400,
            vfs_bsize: 4096,
            fsid: 42,
            ..Default::default()
        };
        Backend::new(NodeKey::new("h1", 1025, 2), stat, 10_000, 0)
    }

    #[test]
    fn test_key() {
        let b = backend(1, 0);
        assert_eq!(b.key.as_str(), "h1:1025:2/1");
        assert_eq!(b.fs_key().unwrap().as_str(), "h1:1025:2/42");
        assert_eq!(b.group_id(), Some(GroupId::new(7)));
    }

    #[test]
    fn test_spaces() {
        let b = backend(1, 0);
        assert_eq!(b.total_space(), 1000 * 4096);
        assert_eq!(b.free_space(), 400 * 4096);
    }

    #[test]
    fn test_status_ok() {
        let mut b = backend(1, 0);
        b.recalculate_status(10_050, STALE);
        assert_eq!(b.status, BackendStatus::Ok);
    }

    #[test]
    fn test_status_stalled() {
        let mut b = backend(1, 0);
        b.recalculate_status(10_121, STALE);
        assert_eq!(b.status, BackendStatus::Stalled);
    }

    #[test]
    fn test_status_disabled_is_init() {
        let mut b = backend(0, 0);
        b.recalculate_status(10_050, STALE);
        assert_eq!(b.status, BackendStatus::Init);
    }

    #[test]
    fn test_status_read_only_flag() {
        let mut b = backend(1, 1);
        b.recalculate_status(10_050, STALE);
        assert_eq!(b.status, BackendStatus::Ro);
    }

    #[test]
    fn test_status_rofs_errors() {
        let mut b = backend(1, 0);
        b.rofs_errors = 3;
        b.recalculate_status(10_050, STALE);
        assert_eq!(b.status, BackendStatus::Ro);
    }

    #[test]
    fn test_status_stat_error_is_bad() {
        let mut b = backend(1, 0);
        b.stat.vfs_error = 5;
        b.recalculate_status(10_050, STALE);
        assert_eq!(b.status, BackendStatus::Bad);
    }

    #[test]
    fn test_merge_newer_wins() {
        let mut b = backend(1, 0);
        let newer = BackendStat {
            backend_id: 1,
            group: 7,
            vfs_blocks: 2000,
            ..Default::default()
        };
        b.merge(newer, 10_001, 0, 2);
        assert_eq!(b.stat.vfs_blocks, 2000);
        assert_eq!(b.rofs_errors, 2);
    }

    #[test]
    fn test_merge_older_dropped() {
        let mut b = backend(1, 0);
        let older = BackendStat {
            backend_id: 1,
            vfs_blocks: 1,
            ..Default::default()
        };
        b.merge(older, 9_999, 0, 0);
        assert_eq!(b.stat.vfs_blocks, 1000);
    }
}
