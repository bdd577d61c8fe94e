//! Configuration type definitions

use super::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serde helper for durations specified in whole seconds
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// A storage node to poll, as listed in configuration.
///
/// The triple is immutable for the lifetime of the process and forms the
/// node key `host:port:family`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub host: String,
    pub port: u16,
    /// Protocol family the node speaks (2 = IPv4, 10 = IPv6)
    pub family: u32,
}

/// Metadata cluster access settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MetadataConfig {
    pub url: String,
    pub options: MetadataOptions,
    pub history: MetadataDb,
    pub inventory: MetadataDb,
    pub jobs: MetadataDb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataOptions {
    #[serde(rename = "connectTimeoutMS")]
    pub connect_timeout_ms: u64,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: defaults::metadata_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MetadataDb {
    pub db: String,
}

/// Collector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port used when building node monitor URLs
    pub monitor_port: u16,

    /// Per-request HTTP timeout for stat downloads
    #[serde(with = "duration_serde")]
    pub wait_timeout: Duration,

    /// Mark any group served by more than one backend BROKEN
    pub forbidden_dht_groups: bool,

    /// Policy toggle consumed by a separate evaluator, carried here only
    pub forbidden_unmatched_group_total_space: bool,
    /// Policy toggle consumed by a separate evaluator, carried here only
    pub forbidden_ns_without_settings: bool,
    /// Policy toggle consumed by a separate evaluator, carried here only
    pub forbidden_dc_sharing_among_groups: bool,

    /// Bytes subtracted from free space when computing effective free space
    pub reserved_space: u64,

    /// Age after which a backend stat record is considered stalled
    #[serde(with = "duration_serde")]
    pub node_backend_stat_stale_timeout: Duration,

    /// Seconds between automatically scheduled regular rounds
    #[serde(with = "duration_serde")]
    pub collect_interval: Duration,

    pub net_thread_num: usize,
    pub io_thread_num: usize,
    pub nonblocking_io_thread_num: usize,

    #[serde(with = "duration_serde")]
    pub infrastructure_dc_cache_update_period: Duration,
    #[serde(with = "duration_serde")]
    pub infrastructure_dc_cache_valid_time: Duration,

    pub metadata: MetadataConfig,

    pub app_name: String,
    pub cache_group_path_prefix: String,

    /// Storage nodes to poll every round
    pub nodes: Vec<NodeInfo>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_port: defaults::monitor_port(),
            wait_timeout: defaults::wait_timeout(),
            forbidden_dht_groups: false,
            forbidden_unmatched_group_total_space: false,
            forbidden_ns_without_settings: false,
            forbidden_dc_sharing_among_groups: false,
            reserved_space: defaults::reserved_space(),
            node_backend_stat_stale_timeout: defaults::node_backend_stat_stale_timeout(),
            collect_interval: defaults::collect_interval(),
            net_thread_num: defaults::net_thread_num(),
            io_thread_num: defaults::io_thread_num(),
            nonblocking_io_thread_num: defaults::nonblocking_io_thread_num(),
            infrastructure_dc_cache_update_period: defaults::infrastructure_dc_cache_update_period(
            ),
            infrastructure_dc_cache_valid_time: defaults::infrastructure_dc_cache_valid_time(),
            metadata: MetadataConfig::default(),
            app_name: String::new(),
            cache_group_path_prefix: String::new(),
            nodes: Vec::new(),
        }
    }
}
