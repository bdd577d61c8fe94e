//! Configuration module
//!
//! Loading, defaults and validation of the collector configuration.

mod defaults;
mod loading;
mod types;
mod validation;

pub use loading::{create_default_config, load_config};
pub use types::{Config, MetadataConfig, MetadataDb, MetadataOptions, NodeInfo, duration_serde};
