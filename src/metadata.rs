//! Group metadata decoding
//!
//! The cluster stores one msgpack document per group under the
//! `symmetric_groups` key. Two wire shapes exist: the current map form and
//! the historical bare-array form (version 1, namespace "default").

use serde::Deserialize;
use thiserror::Error;

use crate::types::{CoupleKey, GroupId};

/// Status string that marks a group as being migrated by a job.
const MIGRATING_STATUS: &str = "MIGRATING";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("could not parse group metadata: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MetadataWire {
    Map(MetadataMap),
    /// Version 1: a bare array of couple group ids
    Couple(Vec<u64>),
}

#[derive(Debug, Deserialize)]
struct MetadataMap {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    couple: Vec<u64>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    frozen: bool,
    #[serde(default)]
    service: Option<ServiceWire>,
}

#[derive(Debug, Deserialize)]
struct ServiceWire {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
}

/// Decoded group metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMetadata {
    pub version: u64,
    /// Sorted couple member ids
    pub couple: Vec<GroupId>,
    pub namespace: String,
    pub frozen: bool,
    pub migrating: bool,
    pub job_id: String,
}

impl GroupMetadata {
    /// Decode a msgpack metadata document of either wire shape.
    pub fn parse(data: &[u8]) -> Result<Self, MetadataError> {
        let wire: MetadataWire = rmp_serde::from_slice(data)?;

        let meta = match wire {
            MetadataWire::Map(map) => {
                let (migrating, job_id) = match map.service {
                    Some(service) => (
                        service.status.as_deref() == Some(MIGRATING_STATUS),
                        service.job_id.unwrap_or_default(),
                    ),
                    None => (false, String::new()),
                };
                Self {
                    version: map.version,
                    couple: sorted_ids(map.couple),
                    namespace: map.namespace.unwrap_or_default(),
                    frozen: map.frozen,
                    migrating,
                    job_id,
                }
            }
            MetadataWire::Couple(ids) => Self {
                version: 1,
                couple: sorted_ids(ids),
                namespace: "default".to_string(),
                frozen: false,
                migrating: false,
                job_id: String::new(),
            },
        };

        Ok(meta)
    }

    /// Canonical couple key of the metadata's couple list.
    #[must_use]
    pub fn couple_key(&self) -> CoupleKey {
        CoupleKey::from_group_ids(&self.couple)
    }

    /// Couple ids rendered the way status texts show them: `1 2 3`.
    #[must_use]
    pub fn couple_ids_text(&self) -> String {
        let parts: Vec<String> = self.couple.iter().map(GroupId::to_string).collect();
        parts.join(" ")
    }
}

fn sorted_ids(ids: Vec<u64>) -> Vec<GroupId> {
    let mut ids: Vec<GroupId> = ids.into_iter().map(GroupId::new).collect();
    ids.sort_unstable();
    ids
}
