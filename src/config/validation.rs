//! Configuration validation

use anyhow::{Result, bail};
use std::collections::HashSet;

use super::types::Config;

impl Config {
    /// Validate a loaded configuration.
    ///
    /// An empty node list is allowed (the collector idles and serves empty
    /// snapshots), but every listed node must be well-formed and unique.
    pub fn validate(&self) -> Result<()> {
        if self.monitor_port == 0 {
            bail!("monitor_port must not be 0");
        }
        if self.wait_timeout.is_zero() {
            bail!("wait_timeout must be at least 1 second");
        }
        if self.collect_interval.is_zero() {
            bail!("collect_interval must be at least 1 second");
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.host.is_empty() {
                bail!("node host must not be empty");
            }
            if node.port == 0 {
                bail!("node '{}' has port 0", node.host);
            }
            if !seen.insert((node.host.as_str(), node.port, node.family)) {
                bail!(
                    "duplicate node entry {}:{}:{}",
                    node.host,
                    node.port,
                    node.family
                );
            }
        }

        Ok(())
    }
}
