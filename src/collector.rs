//! Collector: snapshot owner and round scheduler
//!
//! The Collector owns the live snapshot behind a read-write lock and a
//! scheduler task that serialises rounds: at most one round is in flight,
//! refresh requests attach to it, forced updates queue behind it, and a
//! ticker starts regular rounds on the configured interval. The snapshot
//! swap happens under the write lock only, so readers always observe a
//! complete pre- or post-round state.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::filter::Filter;
use crate::history::HistoryDb;
use crate::round::{ClockStat, Round, RoundError, RoundKind};
use crate::session::MetaSession;
use crate::snapshot;
use crate::storage::{Storage, Summary};

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector is shutting down")]
    ShuttingDown,
}

enum Command {
    Refresh {
        filter: Option<Filter>,
        done: oneshot::Sender<()>,
    },
    ForceUpdate {
        done: oneshot::Sender<()>,
    },
}

struct Shared {
    config: Arc<Config>,
    snapshot: RwLock<Arc<Storage>>,
    session: Arc<dyn MetaSession>,
    history: Option<Arc<dyn HistoryDb>>,
    shutdown: watch::Sender<bool>,
}

/// Process-wide owner of the active snapshot.
#[derive(Clone)]
pub struct Collector {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Collector {
    /// Create the collector and spawn its scheduler task. Must be called
    /// inside a tokio runtime.
    #[must_use]
    pub fn new(
        config: Config,
        session: Arc<dyn MetaSession>,
        history: Option<Arc<dyn HistoryDb>>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            snapshot: RwLock::new(Arc::new(Storage::from_config(&config))),
            config: Arc::new(config),
            session,
            history,
            shutdown,
        });

        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(scheduler(Arc::clone(&shared), rx));

        Self { shared, commands }
    }

    /// Entity counts of the current snapshot. Responds immediately.
    pub async fn summary(&self) -> Summary {
        self.shared.snapshot.read().await.summary()
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<Storage> {
        Arc::clone(&*self.shared.snapshot.read().await)
    }

    /// Project the current snapshot through an optional filter.
    pub async fn get_snapshot(&self, filter: Option<&Filter>) -> serde_json::Value {
        let storage = self.snapshot().await;
        snapshot::project(&storage, filter)
    }

    /// Wait for a fresh snapshot. Attaches to the in-flight round if one
    /// is running, otherwise starts a regular round (or a forced-partial
    /// one when the filter restricts the node set).
    pub async fn refresh(&self, filter: Option<Filter>) -> Result<(), CollectorError> {
        let (done, completed) = oneshot::channel();
        self.commands
            .send(Command::Refresh { filter, done })
            .map_err(|_| CollectorError::ShuttingDown)?;
        completed.await.map_err(|_| CollectorError::ShuttingDown)
    }

    /// Run a forced full round. Queues behind an in-flight round.
    pub async fn force_update(&self) -> Result<(), CollectorError> {
        let (done, completed) = oneshot::channel();
        self.commands
            .send(Command::ForceUpdate { done })
            .map_err(|_| CollectorError::ShuttingDown)?;
        completed.await.map_err(|_| CollectorError::ShuttingDown)
    }

    /// Signal shutdown. An in-flight round aborts at its next barrier.
    pub fn shutdown(&self) {
        let _ = self.shared.shutdown.send(true);
    }
}

struct PendingRound {
    kind: RoundKind,
    node_filter: Option<Vec<String>>,
    waiters: Vec<oneshot::Sender<()>>,
}

async fn spawn_round(
    shared: &Arc<Shared>,
    pending: &mut PendingRound,
) -> JoinHandle<Result<(Storage, ClockStat), RoundError>> {
    // rounds stage on a copy of the live snapshot
    let staging = (**shared.snapshot.read().await).clone();
    let round = Round::new(
        pending.kind,
        staging,
        Arc::clone(&shared.config),
        Arc::clone(&shared.session),
        shared.history.clone(),
        shared.shutdown.subscribe(),
        pending.node_filter.take(),
    );
    tokio::spawn(round.perform())
}

async fn scheduler(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut shutdown = shared.shutdown.subscribe();
    // first regular round fires one full interval after startup
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + shared.config.collect_interval,
        shared.config.collect_interval,
    );
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut in_flight: Option<JoinHandle<Result<(Storage, ClockStat), RoundError>>> = None;
    let mut waiters: Vec<oneshot::Sender<()>> = Vec::new();
    let mut queued: Option<PendingRound> = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                break;
            }

            _ = ticker.tick() => {
                if in_flight.is_none() {
                    let mut pending = PendingRound {
                        kind: RoundKind::Regular,
                        node_filter: None,
                        waiters: Vec::new(),
                    };
                    in_flight = Some(spawn_round(&shared, &mut pending).await);
                    waiters = pending.waiters;
                }
            }

            Some(command) = rx.recv() => {
                match command {
                    Command::Refresh { filter, done } => {
                        if in_flight.is_some() {
                            // at most one round runs at a time; attach
                            waiters.push(done);
                        } else {
                            let node_filter = filter
                                .filter(|f| !f.nodes.is_empty())
                                .map(|f| f.nodes);
                            let kind = if node_filter.is_some() {
                                RoundKind::ForcedPartial
                            } else {
                                RoundKind::Regular
                            };
                            let mut pending = PendingRound {
                                kind,
                                node_filter,
                                waiters: vec![done],
                            };
                            in_flight = Some(spawn_round(&shared, &mut pending).await);
                            waiters = pending.waiters;
                        }
                    }
                    Command::ForceUpdate { done } => {
                        if in_flight.is_some() {
                            let next = queued.get_or_insert(PendingRound {
                                kind: RoundKind::ForcedFull,
                                node_filter: None,
                                waiters: Vec::new(),
                            });
                            next.kind = RoundKind::ForcedFull;
                            next.waiters.push(done);
                        } else {
                            let mut pending = PendingRound {
                                kind: RoundKind::ForcedFull,
                                node_filter: None,
                                waiters: vec![done],
                            };
                            in_flight = Some(spawn_round(&shared, &mut pending).await);
                            waiters = pending.waiters;
                        }
                    }
                }
            }

            result = async { in_flight.as_mut().expect("in-flight round").await },
                if in_flight.is_some() =>
            {
                in_flight = None;
                match result {
                    Ok(Ok((storage, clock))) => {
                        {
                            let mut snapshot = shared.snapshot.write().await;
                            *snapshot = Arc::new(storage);
                        }
                        info!(
                            total_ms = clock.total.as_millis() as u64,
                            download_ms = clock.perform_download.as_millis() as u64,
                            stats_ms = clock.finish_monitor_stats.as_millis() as u64,
                            metadata_ms = clock.metadata_download.as_millis() as u64,
                            update_ms = clock.storage_update.as_millis() as u64,
                            "Round completed, snapshot swapped"
                        );
                    }
                    Ok(Err(RoundError::Terminated)) => {
                        info!("Round aborted by shutdown");
                    }
                    Err(e) => {
                        error!("Round task failed: {}", e);
                    }
                }
                for done in waiters.drain(..) {
                    let _ = done.send(());
                }
                if let Some(mut pending) = queued.take() {
                    in_flight = Some(spawn_round(&shared, &mut pending).await);
                    waiters = pending.waiters;
                }
            }
        }
    }
}
