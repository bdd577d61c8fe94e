//! Couple state

use serde::Serialize;

use super::group::GroupStatus;
use crate::types::{CoupleKey, GroupId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoupleStatus {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "BAD")]
    Bad,
    #[serde(rename = "BROKEN")]
    Broken,
    #[serde(rename = "RO")]
    Ro,
    #[serde(rename = "MIGRATING")]
    Migrating,
}

impl CoupleStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Ok => "OK",
            Self::Bad => "BAD",
            Self::Broken => "BROKEN",
            Self::Ro => "RO",
            Self::Migrating => "MIGRATING",
        }
    }
}

impl std::fmt::Display for CoupleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of groups forming a replica set, keyed by its sorted member ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Couple {
    pub key: CoupleKey,
    /// Sorted member ids
    pub group_ids: Vec<GroupId>,
    pub status: CoupleStatus,
    pub status_text: String,
}

impl Couple {
    #[must_use]
    pub fn new(mut group_ids: Vec<GroupId>) -> Self {
        group_ids.sort_unstable();
        group_ids.dedup();
        Self {
            key: CoupleKey::from_group_ids(&group_ids),
            group_ids,
            status: CoupleStatus::Init,
            status_text: String::new(),
        }
    }

    /// True when `ids` names exactly this couple's members. The input does
    /// not have to be sorted.
    #[must_use]
    pub fn check(&self, ids: &[GroupId]) -> bool {
        CoupleKey::from_group_ids(ids) == self.key
    }

    /// Derive the couple status as the worst of its member group statuses.
    pub fn update_status(&mut self, members: &[(GroupId, GroupStatus)]) {
        let worst = members
            .iter()
            .max_by_key(|(_, status)| severity(*status))
            .copied();

        match worst {
            None => {
                self.status = CoupleStatus::Init;
                self.status_text = "Couple has no live groups".to_string();
            }
            Some((_, GroupStatus::Coupled)) => {
                self.status = CoupleStatus::Ok;
                self.status_text = "Couple is OK".to_string();
            }
            Some((id, status)) => {
                self.status = match status {
                    GroupStatus::Broken => CoupleStatus::Broken,
                    GroupStatus::Bad => CoupleStatus::Bad,
                    GroupStatus::Init => CoupleStatus::Init,
                    GroupStatus::Migrating => CoupleStatus::Migrating,
                    GroupStatus::Ro => CoupleStatus::Ro,
                    GroupStatus::Coupled => CoupleStatus::Ok,
                };
                self.status_text = format!("Group {} is in state {}", id, status);
            }
        }
    }
}

/// Ordering used to pick the worst member status.
fn severity(status: GroupStatus) -> u8 {
    match status {
        GroupStatus::Coupled => 0,
        GroupStatus::Ro => 1,
        GroupStatus::Migrating => 2,
        GroupStatus::Init => 3,
        GroupStatus::Bad => 4,
        GroupStatus::Broken => 5,
    }
}
