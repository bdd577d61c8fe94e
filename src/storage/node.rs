//! Polled node state
//!
//! A Node owns its download buffer, its last parsed node-level stat and
//! the Backend and FS records discovered through its monitor endpoint.
//! Nodes are created from configuration at startup and never destroyed;
//! a failed poll leaves the previous records in place.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

use super::backend::Backend;
use super::fs::Fs;
use crate::config::NodeInfo;
use crate::stats::{NodeStat, StatsParser};
use crate::types::NodeKey;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub key: NodeKey,
    pub host: String,
    pub port: u16,
    pub family: u32,
    /// Raw monitor response being collected during a round
    download: Vec<u8>,
    pub stat: NodeStat,
    pub backends: BTreeMap<u64, Backend>,
    pub filesystems: BTreeMap<u64, Fs>,
}

impl Node {
    #[must_use]
    pub fn new(info: &NodeInfo) -> Self {
        Self {
            key: NodeKey::new(&info.host, info.port, info.family),
            host: info.host.clone(),
            port: info.port,
            family: info.family,
            download: Vec::new(),
            stat: NodeStat::default(),
            backends: BTreeMap::new(),
            filesystems: BTreeMap::new(),
        }
    }

    pub fn add_download_data(&mut self, chunk: &[u8]) {
        self.download.extend_from_slice(chunk);
    }

    pub fn drop_download_data(&mut self) {
        self.download.clear();
    }

    #[must_use]
    pub fn has_download_data(&self) -> bool {
        !self.download.is_empty()
    }

    /// Parse the collected download buffer and merge the records it
    /// carries. A JSON-level parse failure drops the buffer and keeps all
    /// previous records; a malformed individual backend record is
    /// discarded on its own.
    pub fn parse_stats(&mut self) {
        if self.download.is_empty() {
            return;
        }
        let buffer = std::mem::take(&mut self.download);

        let parsed = match StatsParser::parse(&buffer) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(node = %self.key, error = %e, "monitor stats unparsable, keeping previous records");
                return;
            }
        };

        if (parsed.node.ts_sec, parsed.node.ts_usec) >= (self.stat.ts_sec, self.stat.ts_usec) {
            self.stat = parsed.node;
        }

        for stat in parsed.backends {
            if stat.malformed {
                warn!(
                    node = %self.key,
                    backend_id = stat.backend_id,
                    "discarding malformed backend record"
                );
                continue;
            }
            let rofs_errors = parsed
                .rofs_errors
                .get(&stat.backend_id)
                .copied()
                .unwrap_or(0);
            match self.backends.entry(stat.backend_id) {
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    entry
                        .get_mut()
                        .merge(stat, parsed.node.ts_sec, parsed.node.ts_usec, rofs_errors);
                }
                std::collections::btree_map::Entry::Vacant(entry) => {
                    let mut backend = Backend::new(
                        self.key.clone(),
                        stat,
                        parsed.node.ts_sec,
                        parsed.node.ts_usec,
                    );
                    backend.rofs_errors = rofs_errors;
                    entry.insert(backend);
                }
            }
        }
    }

    /// Recompute backend statuses and rebuild the FS aggregates from the
    /// current backend records.
    pub fn refresh_derived_state(&mut self, now_sec: u64, stale_timeout: Duration, reserved_space: u64) {
        for backend in self.backends.values_mut() {
            backend.recalculate_status(now_sec, stale_timeout);
        }

        self.filesystems.clear();
        for backend in self.backends.values() {
            if backend.stat.fsid == 0 {
                continue;
            }
            let fs = self
                .filesystems
                .entry(backend.stat.fsid)
                .or_insert_with(|| Fs::new(self.key.clone(), backend.stat.fsid));
            fs.backend_ids.insert(backend.backend_id);
            fs.total_space += backend.total_space();
            fs.free_space += backend.free_space();
        }
        for fs in self.filesystems.values_mut() {
            fs.apply_reservation(reserved_space);
        }
    }
}
