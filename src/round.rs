//! Collection round pipeline
//!
//! A Round is a single-use pipeline over a staging copy of the snapshot:
//! parallel stat download, stats parsing, group-structure update, parallel
//! metadata download, final storage merge. Stage boundaries are barriers;
//! a shutdown signal observed at a barrier aborts the round before the
//! merge. Every transition is clocked.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::history::{GroupHistoryEntry, HistoryDb};
use crate::session::MetaSession;
use crate::storage::{Storage, UpdateContext};
use crate::types::{GroupId, NodeKey};

/// Namespace of the cluster metadata keys.
pub const METADATA_NAMESPACE: &str = "metabalancer";
/// Key holding per-group couple metadata.
pub const METADATA_KEY: &str = "symmetric_groups";

/// Cap on concurrent monitor downloads. Correctness does not depend on
/// the bound; it only keeps very large clusters from opening every
/// connection at once.
const MAX_PARALLEL_DOWNLOADS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    Regular,
    ForcedFull,
    ForcedPartial,
}

impl RoundKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::ForcedFull => "forced full",
            Self::ForcedPartial => "forced partial",
        }
    }
}

impl std::fmt::Display for RoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock timings of one round's transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockStat {
    pub total: Duration,
    pub perform_download: Duration,
    pub finish_monitor_stats: Duration,
    pub metadata_download: Duration,
    pub storage_update: Duration,
}

#[derive(Debug, Error)]
pub enum RoundError {
    #[error("round aborted by shutdown")]
    Terminated,
}

/// One collection round over a staging storage.
pub struct Round {
    kind: RoundKind,
    config: Arc<Config>,
    session: Arc<dyn MetaSession>,
    history: Option<Arc<dyn HistoryDb>>,
    shutdown: watch::Receiver<bool>,
    /// Node keys a forced-partial round is restricted to
    node_filter: Option<Vec<String>>,
    storage: Storage,
    clock: ClockStat,
}

impl Round {
    pub fn new(
        kind: RoundKind,
        staging: Storage,
        config: Arc<Config>,
        session: Arc<dyn MetaSession>,
        history: Option<Arc<dyn HistoryDb>>,
        shutdown: watch::Receiver<bool>,
        node_filter: Option<Vec<String>>,
    ) -> Self {
        Self {
            kind,
            config,
            session,
            history,
            shutdown,
            node_filter,
            storage: staging,
            clock: ClockStat::default(),
        }
    }

    fn terminated(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run the round to completion and hand back the staged storage.
    pub async fn perform(mut self) -> Result<(Storage, ClockStat), RoundError> {
        let total = Instant::now();

        info!(
            "Starting {} discovery with {} nodes",
            self.kind,
            self.storage.nodes.len()
        );

        self.perform_download().await;
        if self.terminated() {
            return Err(RoundError::Terminated);
        }

        self.finish_monitor_stats();

        self.perform_metadata_download().await;
        if self.terminated() {
            return Err(RoundError::Terminated);
        }

        if self.kind == RoundKind::ForcedFull {
            self.load_group_histories().await;
        }

        let watch = Instant::now();
        self.storage.update(&UpdateContext::new(&self.config));
        self.clock.storage_update = watch.elapsed();

        self.clock.total = total.elapsed();
        Ok((self.storage, self.clock))
    }

    /// Stage 2: one HTTP GET per node, all in parallel. A failed download
    /// drops the node's buffer; its previous records survive the round.
    async fn perform_download(&mut self) {
        let watch = Instant::now();

        // the HTTP driver lives for one round; failing to build it aborts
        // only the download stage, nodes keep their previous records
        let client = match reqwest::Client::builder().build() {
            Ok(client) => client,
            Err(e) => {
                error!("Cannot create HTTP client for stat download: {}", e);
                self.clock.perform_download = watch.elapsed();
                return;
            }
        };

        let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_DOWNLOADS));
        let mut tasks: JoinSet<(NodeKey, Result<Vec<u8>, reqwest::Error>)> = JoinSet::new();

        for node in self.storage.nodes.values_mut() {
            node.drop_download_data();

            if let Some(filter) = &self.node_filter {
                if !filter.iter().any(|k| k == node.key.as_str()) {
                    continue;
                }
            }

            info!("Scheduling stat download for node {}", node.key);
            let key = node.key.clone();
            let url = format!(
                "http://{}:{}/?categories=80",
                node.host, self.config.monitor_port
            );
            let client = client.clone();
            let timeout = self.config.wait_timeout;
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let result = download_node_stats(&client, &url, timeout).await;
                (key, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (key, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Stat download task failed: {}", e);
                    continue;
                }
            };
            let Some(node) = self.storage.nodes.get_mut(&key) else {
                continue;
            };
            match result {
                Ok(body) => {
                    debug!("Node {} stat download completed, {} bytes", key, body.len());
                    node.add_download_data(&body);
                }
                Err(e) => {
                    error!("Node {} stats download failed: {}", key, e);
                    node.drop_download_data();
                }
            }
        }

        self.clock.perform_download = watch.elapsed();
    }

    /// Parse every node's download buffer into staging records.
    fn finish_monitor_stats(&mut self) {
        let watch = Instant::now();
        for node in self.storage.nodes.values_mut() {
            if node.has_download_data() {
                info!("Node {} stat download completed", node.key);
                node.parse_stats();
            }
        }
        self.clock.finish_monitor_stats = watch.elapsed();
    }

    /// Stage 3: materialise groups from the parsed backends and fetch each
    /// group's metadata through a cloned session. The JoinSet drain is the
    /// stage barrier.
    async fn perform_metadata_download(&mut self) {
        self.storage.update_group_structure();

        if self.kind == RoundKind::ForcedFull {
            for group in self.storage.groups.values_mut() {
                group.mark_dirty();
            }
        }

        let groups: Vec<GroupId> = self.storage.groups.keys().copied().collect();
        info!("Scheduling metadata download for {} groups", groups.len());

        let watch = Instant::now();
        let mut tasks: JoinSet<(GroupId, Result<Vec<u8>, crate::session::MetaError>)> =
            JoinSet::new();

        for id in groups {
            debug!("Scheduling metadata download for group {}", id);
            let session = self.session.clone_session();
            tasks.spawn(async move {
                let result = session
                    .read(METADATA_NAMESPACE, METADATA_KEY, &[id.get()])
                    .await;
                (id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (id, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Metadata download task failed: {}", e);
                    continue;
                }
            };
            match result {
                Ok(data) => self.storage.save_group_metadata(id, &data),
                Err(e) => {
                    self.storage
                        .set_group_download_error(id, format!("Metadata download failed: {}", e));
                }
            }
        }

        info!("Group metadata download completed");
        self.clock.metadata_download = watch.elapsed();
    }

    /// Forced-full rounds also refresh each group's history entry.
    async fn load_group_histories(&mut self) {
        let Some(history) = self.history.clone() else {
            return;
        };

        let ids: Vec<GroupId> = self.storage.groups.keys().copied().collect();
        for id in ids {
            match history.find_group_history(id.get()).await {
                Ok(Some(doc)) => match GroupHistoryEntry::from_document(&doc) {
                    Ok(entry) => {
                        if let Some(group) = self.storage.groups.get_mut(&id) {
                            group.history = Some(entry);
                        }
                    }
                    Err(e) => warn!("Group {} history entry unparsable: {}", id, e),
                },
                Ok(None) => {}
                Err(e) => {
                    warn!("Group {} history lookup failed: {}", id, e);
                }
            }
        }
    }
}

async fn download_node_stats(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, reqwest::Error> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
