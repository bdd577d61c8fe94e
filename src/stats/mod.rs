//! Node monitor statistics
//!
//! A node's monitor endpoint answers one large JSON document per poll.
//! [`StatsParser`] extracts the handful of leaves the collector cares
//! about into flat per-backend and per-node records without building a
//! DOM. See `parser` for the tree-state machine.

mod parser;
pub mod sax;

pub use parser::StatsParser;

use serde::Serialize;
use std::collections::BTreeMap;

/// Statistics of one backend, extracted from a monitor response.
///
/// All counters default to zero; a field missing from the response keeps
/// its default. Wire names follow the monitor JSON schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackendStat {
    pub backend_id: u64,

    // dstat
    pub read_ios: u64,
    pub write_ios: u64,
    pub read_ticks: u64,
    pub write_ticks: u64,
    pub io_ticks: u64,
    pub read_sectors: u64,
    pub dstat_error: u64,

    // vfs
    pub vfs_blocks: u64,
    pub vfs_bavail: u64,
    pub vfs_bsize: u64,
    pub fsid: u64,
    pub vfs_error: u64,

    // summary_stats
    pub records_total: u64,
    pub records_removed: u64,
    pub records_removed_size: u64,
    pub want_defrag: u64,
    pub base_size: u64,

    // config
    pub blob_size_limit: u64,
    pub blob_size: u64,
    /// Group id this backend claims to serve
    pub group: u64,
    pub data_path: String,
    pub file_path: String,

    /// Largest base blob size across the backend's blobs
    pub max_blob_base_size: u64,

    // status
    pub defrag_state: u64,
    pub state: u64,
    pub read_only: u64,
    pub last_start_ts_sec: u64,
    pub last_start_ts_usec: u64,

    // command counters, cache/disk split
    pub ell_cache_write_size: u64,
    pub ell_cache_write_time: u64,
    pub ell_disk_write_size: u64,
    pub ell_disk_write_time: u64,
    pub ell_cache_read_size: u64,
    pub ell_cache_read_time: u64,
    pub ell_disk_read_size: u64,
    pub ell_disk_read_time: u64,

    // io queues
    pub io_blocking_size: u64,
    pub io_nonblocking_size: u64,

    /// Set when a value of an unexpected JSON type was seen at one of this
    /// record's paths; the field in question keeps its default.
    #[serde(skip)]
    pub malformed: bool,
}

/// Node-level statistics extracted from a monitor response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStat {
    pub ts_sec: u64,
    pub ts_usec: u64,
    pub la1: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Staging area for one `stats.*.count` entry while its object is open.
#[derive(Debug, Clone, Copy, Default)]
struct StatCommitStat {
    backend: u64,
    err: u64,
    count: u64,
}

/// Everything extracted from one monitor response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStats {
    pub node: NodeStat,
    pub backends: Vec<BackendStat>,
    /// EROFS error counts from `stat_commit`, keyed by backend id
    pub rofs_errors: BTreeMap<u64, u64>,
}
