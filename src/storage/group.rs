//! Replication group state

use serde::Serialize;
use std::collections::BTreeSet;

use crate::history::GroupHistoryEntry;
use crate::types::{BackendKey, CoupleKey, GroupId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupStatus {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "COUPLED")]
    Coupled,
    #[serde(rename = "BAD")]
    Bad,
    #[serde(rename = "BROKEN")]
    Broken,
    #[serde(rename = "RO")]
    Ro,
    #[serde(rename = "MIGRATING")]
    Migrating,
}

impl GroupStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Coupled => "COUPLED",
            Self::Bad => "BAD",
            Self::Broken => "BROKEN",
            Self::Ro => "RO",
            Self::Migrating => "MIGRATING",
        }
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupService {
    pub migrating: bool,
    pub job_id: String,
}

/// A replication group and everything its metadata revealed.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    /// Couple binding, set the first time metadata reveals a couple list
    pub couple: Option<CoupleKey>,
    /// Namespace binding, set the first time metadata is observed
    pub namespace: Option<String>,
    /// Backends currently advertising this group id
    pub backends: BTreeSet<BackendKey>,
    pub(crate) metadata: Vec<u8>,
    /// False when `metadata` changed since the last processing
    pub(crate) clean: bool,
    pub status: GroupStatus,
    pub status_text: String,
    /// Unix microseconds of the newest metadata processing
    pub metadata_process_start: u64,
    pub frozen: bool,
    pub version: u64,
    pub service: GroupService,
    /// A consistency problem that must hold the group in BAD until the
    /// next successful metadata processing clears it
    pub(crate) metadata_anomaly: Option<String>,
    /// History database entry attached during forced-full rounds
    pub history: Option<GroupHistoryEntry>,
}

impl Group {
    #[must_use]
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            couple: None,
            namespace: None,
            backends: BTreeSet::new(),
            metadata: Vec::new(),
            clean: true,
            status: GroupStatus::Init,
            status_text: String::new(),
            metadata_process_start: 0,
            frozen: false,
            version: 0,
            service: GroupService::default(),
            metadata_anomaly: None,
            history: None,
        }
    }

    /// Store a downloaded metadata document. Identical bytes leave the
    /// clean flag alone so unchanged metadata is not reprocessed.
    pub fn save_metadata(&mut self, data: &[u8]) {
        if self.clean && !self.metadata.is_empty() && self.metadata == data {
            return;
        }
        self.metadata = data.to_vec();
        self.clean = false;
    }

    /// Record a metadata download failure. The previous metadata stays;
    /// only the status text reports the problem.
    pub fn set_download_error(&mut self, text: String) {
        self.status_text = text;
    }

    #[must_use]
    pub fn needs_processing(&self) -> bool {
        !self.clean
    }

    /// Force the next update to reprocess metadata even when the bytes
    /// did not change. Used by forced-full rounds.
    pub fn mark_dirty(&mut self) {
        if !self.metadata.is_empty() {
            self.clean = false;
        }
    }
}

/// Derive a group status from its backends' statuses.
///
/// Pure function of the backend status multiset, the DHT policy flag and
/// the service section of the group's metadata.
#[must_use]
pub fn derive_group_status(
    backends: &[super::BackendStatus],
    forbidden_dht_groups: bool,
    service: &GroupService,
) -> (GroupStatus, String) {
    use super::BackendStatus;

    if backends.is_empty() {
        return (GroupStatus::Init, "No node backends".to_string());
    }

    if backends.len() > 1 && forbidden_dht_groups {
        return (
            GroupStatus::Broken,
            format!(
                "DHT groups are forbidden but the group has {} backends",
                backends.len()
            ),
        );
    }

    let have_bad = backends.iter().any(|s| *s == BackendStatus::Bad);
    let have_ro = backends.iter().any(|s| *s == BackendStatus::Ro);
    let have_other = backends
        .iter()
        .any(|s| !matches!(s, BackendStatus::Ok | BackendStatus::Ro | BackendStatus::Bad));

    if have_bad {
        (
            GroupStatus::Broken,
            "Some of backends are in state BROKEN".to_string(),
        )
    } else if have_ro {
        if service.migrating {
            (
                GroupStatus::Migrating,
                format!("Group is migrating, job id is '{}'", service.job_id),
            )
        } else {
            (
                GroupStatus::Ro,
                "Group is read-only because it has read-only backends".to_string(),
            )
        }
    } else if have_other {
        (
            GroupStatus::Bad,
            "Group is in state BAD because some of backends are not in state OK".to_string(),
        )
    } else {
        (GroupStatus::Coupled, "Group is OK".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendStatus;

    #[test]
    fn test_derive_empty_is_init() {
        let (status, text) = derive_group_status(&[], false, &GroupService::default());
        assert_eq!(status, GroupStatus::Init);
        assert_eq!(text, "No node backends");
    }

    #[test]
    fn test_derive_forbidden_dht() {
        let (status, text) = derive_group_status(
            &[BackendStatus::Ok, BackendStatus::Ok],
            true,
            &GroupService::default(),
        );
        assert_eq!(status, GroupStatus::Broken);
        assert!(text.starts_with("DHT groups are forbidden"));
    }

    #[test]
    fn test_derive_bad_backend_breaks_group() {
        let (status, _) = derive_group_status(
            &[BackendStatus::Ok, BackendStatus::Bad],
            false,
            &GroupService::default(),
        );
        assert_eq!(status, GroupStatus::Broken);
    }

    #[test]
    fn test_derive_ro_migrating() {
        let service = GroupService {
            migrating: true,
            job_id: "job-42".to_string(),
        };
        let (status, text) =
            derive_group_status(&[BackendStatus::Ro], false, &service);
        assert_eq!(status, GroupStatus::Migrating);
        assert!(text.contains("job-42"));
    }

    #[test]
    fn test_derive_ro_without_migration() {
        let (status, _) =
            derive_group_status(&[BackendStatus::Ro], false, &GroupService::default());
        assert_eq!(status, GroupStatus::Ro);
    }

    #[test]
    fn test_derive_stalled_backend_is_bad() {
        let (status, _) = derive_group_status(
            &[BackendStatus::Ok, BackendStatus::Stalled],
            false,
            &GroupService::default(),
        );
        assert_eq!(status, GroupStatus::Bad);
    }

    #[test]
    fn test_derive_all_ok() {
        let (status, text) =
            derive_group_status(&[BackendStatus::Ok], false, &GroupService::default());
        assert_eq!(status, GroupStatus::Coupled);
        assert_eq!(text, "Group is OK");
    }

    #[test]
    fn test_new_group_is_init() {
        let g = Group::new(GroupId::new(7));
        assert_eq!(g.status, GroupStatus::Init);
        assert!(g.couple.is_none());
        assert!(g.namespace.is_none());
        assert!(!g.needs_processing());
    }

    #[test]
    fn test_save_metadata_marks_dirty_once() {
        let mut g = Group::new(GroupId::new(7));
        g.save_metadata(b"abc");
        assert!(g.needs_processing());

        g.clean = true;
        g.save_metadata(b"abc");
        assert!(!g.needs_processing());

        g.save_metadata(b"abcd");
        assert!(g.needs_processing());
    }

    #[test]
    fn test_mark_dirty_requires_metadata() {
        let mut g = Group::new(GroupId::new(7));
        g.mark_dirty();
        assert!(!g.needs_processing());

        g.save_metadata(b"abc");
        g.clean = true;
        g.mark_dirty();
        assert!(g.needs_processing());
    }
}
