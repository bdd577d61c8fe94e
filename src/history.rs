//! Group history database entries
//!
//! The history database keeps one BSON document per group with an audit
//! trail of the backend sets that served it. Only entries written by the
//! job mechanism or by operator request (`type` of "job" or "manual")
//! carry meaning for the collector; a document whose newest entries are
//! all of other types loads as an "empty" history.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history database is unavailable: {0}")]
    Unavailable(String),
    #[error("history document has no '{0}' field")]
    MissingField(&'static str),
    #[error("history document field '{field}' has unexpected type")]
    BadField { field: &'static str },
}

/// Opaque key→document store holding group history.
#[async_trait]
pub trait HistoryDb: Send + Sync {
    /// Fetch the history document of one group, if any.
    async fn find_group_history(&self, group_id: u64) -> Result<Option<Document>, HistoryError>;
}

/// One backend named by a history entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HistoryBackend {
    pub hostname: String,
    pub port: u16,
    pub family: u32,
    pub backend_id: u64,
    pub path: String,
}

/// Parsed history of one group: the newest meaningful backend set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupHistoryEntry {
    pub group_id: u64,
    pub backends: BTreeSet<HistoryBackend>,
    pub timestamp: f64,
    /// The document was valid but held no entries of type "job" or
    /// "manual".
    pub empty: bool,
}

fn get_f64(doc: &Document, field: &'static str) -> Result<f64, HistoryError> {
    match doc.get(field) {
        Some(Bson::Double(v)) => Ok(*v),
        Some(Bson::Int32(v)) => Ok(f64::from(*v)),
        Some(Bson::Int64(v)) => Ok(*v as f64),
        Some(_) => Err(HistoryError::BadField { field }),
        None => Err(HistoryError::MissingField(field)),
    }
}

fn get_u64(doc: &Document, field: &'static str) -> Result<u64, HistoryError> {
    match doc.get(field) {
        Some(Bson::Int32(v)) if *v >= 0 => Ok(*v as u64),
        Some(Bson::Int64(v)) if *v >= 0 => Ok(*v as u64),
        Some(Bson::Double(v)) if *v >= 0.0 => Ok(*v as u64),
        Some(_) => Err(HistoryError::BadField { field }),
        None => Err(HistoryError::MissingField(field)),
    }
}

impl GroupHistoryEntry {
    /// Parse a history document.
    ///
    /// Scans the `nodes` audit array and keeps the backend set of the
    /// newest entry of type "job" or "manual". Entries of other types are
    /// skipped; if none qualify the result is marked `empty`.
    pub fn from_document(doc: &Document) -> Result<Self, HistoryError> {
        let group_id = get_u64(doc, "group_id")?;

        let nodes = match doc.get("nodes") {
            Some(Bson::Array(entries)) => entries,
            Some(_) => return Err(HistoryError::BadField { field: "nodes" }),
            None => return Err(HistoryError::MissingField("nodes")),
        };

        let mut entry = Self {
            group_id,
            backends: BTreeSet::new(),
            timestamp: 0.0,
            empty: true,
        };

        for node in nodes {
            let Bson::Document(node) = node else {
                return Err(HistoryError::BadField { field: "nodes" });
            };

            let entry_type = node.get_str("type").unwrap_or_default();
            if entry_type != "job" && entry_type != "manual" {
                continue;
            }

            let timestamp = get_f64(node, "timestamp")?;
            if entry.empty || timestamp > entry.timestamp {
                entry.timestamp = timestamp;
                entry.backends = parse_backend_set(node)?;
                entry.empty = false;
            }
        }

        Ok(entry)
    }
}

fn parse_backend_set(node: &Document) -> Result<BTreeSet<HistoryBackend>, HistoryError> {
    let set = match node.get("set") {
        Some(Bson::Array(set)) => set,
        Some(_) => return Err(HistoryError::BadField { field: "set" }),
        None => return Err(HistoryError::MissingField("set")),
    };

    let mut backends = BTreeSet::new();
    for item in set {
        let Bson::Document(item) = item else {
            return Err(HistoryError::BadField { field: "set" });
        };
        backends.insert(HistoryBackend {
            hostname: item.get_str("hostname").unwrap_or_default().to_string(),
            port: get_u64(item, "port").unwrap_or(0) as u16,
            family: get_u64(item, "family").unwrap_or(0) as u32,
            backend_id: get_u64(item, "backend_id")?,
            path: item.get_str("path").unwrap_or_default().to_string(),
        });
    }
    Ok(backends)
}
