//! # Mastermind Collector
//!
//! Discovery and state-aggregation core for an Elliptics-like distributed
//! object-storage cluster. The collector periodically polls every storage
//! node's monitor endpoint, fetches per-group metadata from the cluster
//! itself, and folds both into a consistent in-memory snapshot of the
//! fleet (nodes, backends, filesystems, groups, couples, namespaces).
//! Downstream services query snapshots to make placement, repair and
//! migration decisions.
//!
//! ## Architecture
//!
//! - **stats**: streaming parser extracting per-backend/per-node records
//!   from monitor JSON via a path-bitmask tree state machine
//! - **filter**: request filters with sorted id sets per entity kind
//! - **storage**: the cluster state model and its merge rules
//! - **round**: the four-stage collection pipeline run once per round
//! - **collector**: snapshot owner, round scheduler and request surface
//! - **metadata** / **history** / **session**: the wire formats and seams
//!   toward the cluster metadata and the history database
//!
//! A round stages on a copy of the live snapshot and the collector swaps
//! the snapshot pointer under a write lock on commit, so readers always
//! see a complete, immutable cluster state.

pub mod collector;
pub mod config;
pub mod filter;
pub mod history;
pub mod logging;
pub mod metadata;
pub mod round;
pub mod rpc;
pub mod session;
pub mod snapshot;
pub mod stats;
pub mod storage;
pub mod types;

pub use collector::Collector;
pub use config::{Config, create_default_config, load_config};
pub use filter::Filter;
pub use storage::Storage;
