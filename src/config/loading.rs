//! Configuration loading from TOML files

use anyhow::Result;

use super::types::{Config, NodeInfo};

/// Load configuration from a TOML file and validate it.
pub fn load_config(config_path: &str) -> Result<Config> {
    let config_content = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", config_path, e))?;

    let config: Config = toml::from_str(&config_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", config_path, e))?;

    config.validate()?;

    Ok(config)
}

/// Create a default configuration for examples/testing
#[must_use]
pub fn create_default_config() -> Config {
    Config {
        nodes: vec![NodeInfo {
            host: "storage01.example.net".to_string(),
            port: 1025,
            family: 2,
        }],
        ..Default::default()
    }
}
