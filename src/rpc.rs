//! Request entry points
//!
//! The RPC terminal hands each request's body over as one raw byte chunk.
//! For `get_snapshot` and `refresh` a non-empty chunk must parse as
//! filter JSON before the collector is invoked; a parse failure is
//! surfaced to the caller as `(-1, "Incorrect filter syntax")`.

use thiserror::Error;
use tracing::info;

use crate::collector::{Collector, CollectorError};
use crate::filter::Filter;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    fn incorrect_filter() -> Self {
        Self {
            code: -1,
            message: "Incorrect filter syntax".to_string(),
        }
    }
}

impl From<CollectorError> for RpcError {
    fn from(e: CollectorError) -> Self {
        Self {
            code: -1,
            message: e.to_string(),
        }
    }
}

fn parse_filter(chunk: &[u8]) -> Result<Option<Filter>, RpcError> {
    if chunk.is_empty() {
        return Ok(None);
    }
    Filter::from_json(chunk)
        .map(Some)
        .map_err(|_| RpcError::incorrect_filter())
}

/// Respond with entity counts of the current snapshot.
pub async fn on_summary(collector: &Collector, _chunk: &[u8]) -> Result<String, RpcError> {
    let summary = collector.summary().await;
    Ok(serde_json::to_string(&summary).unwrap_or_default())
}

/// Serve a filtered projection of the current snapshot.
pub async fn on_get_snapshot(collector: &Collector, chunk: &[u8]) -> Result<String, RpcError> {
    info!(
        "Snapshot requested: '{}'",
        String::from_utf8_lossy(chunk)
    );
    let filter = parse_filter(chunk)?;
    let projection = collector.get_snapshot(filter.as_ref()).await;
    Ok(projection.to_string())
}

/// Wait for a fresh round, then serve the filtered projection.
pub async fn on_refresh(collector: &Collector, chunk: &[u8]) -> Result<String, RpcError> {
    info!("Refresh requested: '{}'", String::from_utf8_lossy(chunk));
    let filter = parse_filter(chunk)?;
    collector.refresh(filter.clone()).await?;
    let projection = collector.get_snapshot(filter.as_ref()).await;
    Ok(projection.to_string())
}

/// Run a forced full round.
pub async fn on_force_update(collector: &Collector, _chunk: &[u8]) -> Result<String, RpcError> {
    info!("Request to force update");
    collector.force_update().await?;
    let summary = collector.summary().await;
    Ok(serde_json::to_string(&summary).unwrap_or_default())
}
