//! Default values for configuration options
//!
//! Centralized so serde defaults and `Config::default()` cannot drift
//! apart.

use std::time::Duration;

/// Port of the per-node HTTP monitor endpoint
pub fn monitor_port() -> u16 {
    10025
}

/// Per-request timeout of a monitor stat download
pub fn wait_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Seconds before a backend stat is treated as stalled
pub fn node_backend_stat_stale_timeout() -> Duration {
    Duration::from_secs(120)
}

/// Space reserved when computing effective free space (105 GiB)
pub fn reserved_space() -> u64 {
    105 << 30
}

/// Seconds between regular collection rounds
pub fn collect_interval() -> Duration {
    Duration::from_secs(300)
}

pub fn net_thread_num() -> usize {
    3
}

pub fn io_thread_num() -> usize {
    3
}

pub fn nonblocking_io_thread_num() -> usize {
    3
}

pub fn infrastructure_dc_cache_update_period() -> Duration {
    Duration::from_secs(150)
}

/// One week
pub fn infrastructure_dc_cache_valid_time() -> Duration {
    Duration::from_secs(604_800)
}

/// Metadata database connect timeout, milliseconds
pub fn metadata_connect_timeout_ms() -> u64 {
    5000
}
