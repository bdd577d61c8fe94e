//! Cluster state model
//!
//! `Storage` holds the keyed indexes for every entity kind and implements
//! the two merge-phase operations of a collection round:
//! `update_group_structure` (between stat parsing and metadata download)
//! and `update` (the final merge). All cross-entity references are keys
//! resolved through these indexes.

mod backend;
mod couple;
mod fs;
mod group;
mod namespace;
mod node;

pub use backend::{Backend, BackendStatus};
pub use couple::{Couple, CoupleStatus};
pub use fs::Fs;
pub use group::{Group, GroupService, GroupStatus, derive_group_status};
pub use namespace::Namespace;
pub use node::Node;

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::error;

use crate::config::Config;
use crate::filter::{Filter, ItemTypes};
use crate::metadata::GroupMetadata;
use crate::types::{BackendKey, CoupleKey, GroupId, NodeKey};

/// Entity counts of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub nodes: usize,
    pub backends: usize,
    pub filesystems: usize,
    pub groups: usize,
    pub couples: usize,
    pub namespaces: usize,
}

/// Inputs of the final merge that come from outside the state graph.
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext {
    pub now_sec: u64,
    pub now_usec: u64,
    pub forbidden_dht_groups: bool,
    pub stale_timeout: Duration,
    pub reserved_space: u64,
}

impl UpdateContext {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            now_sec: now.as_secs(),
            now_usec: u64::from(now.subsec_micros()),
            forbidden_dht_groups: config.forbidden_dht_groups,
            stale_timeout: config.node_backend_stat_stale_timeout,
            reserved_space: config.reserved_space,
        }
    }

    fn now_micros(&self) -> u64 {
        self.now_sec * 1_000_000 + self.now_usec
    }
}

/// Top-level aggregate of one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Storage {
    pub nodes: BTreeMap<NodeKey, Node>,
    pub groups: BTreeMap<GroupId, Group>,
    pub couples: BTreeMap<CoupleKey, Couple>,
    pub namespaces: BTreeMap<String, Namespace>,
}

impl Storage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage with one Node per configured endpoint.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut storage = Self::new();
        for info in &config.nodes {
            let node = Node::new(info);
            storage.nodes.insert(node.key.clone(), node);
        }
        storage
    }

    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            nodes: self.nodes.len(),
            backends: self.nodes.values().map(|n| n.backends.len()).sum(),
            filesystems: self.nodes.values().map(|n| n.filesystems.len()).sum(),
            groups: self.groups.len(),
            couples: self.couples.len(),
            namespaces: self.namespaces.len(),
        }
    }

    /// Rebuild group membership from the group ids backends advertise.
    ///
    /// Groups appearing for the first time start in INIT; groups that lost
    /// every backend are retained and will derive INIT ("No node
    /// backends") during the next `update`.
    pub fn update_group_structure(&mut self) {
        for group in self.groups.values_mut() {
            group.backends.clear();
        }

        let mut memberships: Vec<(GroupId, BackendKey)> = Vec::new();
        for node in self.nodes.values() {
            for backend in node.backends.values() {
                if let Some(gid) = backend.group_id() {
                    memberships.push((gid, backend.key.clone()));
                }
            }
        }

        for (gid, key) in memberships {
            self.groups
                .entry(gid)
                .or_insert_with(|| Group::new(gid))
                .backends
                .insert(key);
        }
    }

    /// Store downloaded metadata bytes on a group.
    pub fn save_group_metadata(&mut self, id: GroupId, data: &[u8]) {
        self.groups
            .entry(id)
            .or_insert_with(|| Group::new(id))
            .save_metadata(data);
    }

    /// Record a metadata download failure on a group.
    pub fn set_group_download_error(&mut self, id: GroupId, text: String) {
        if let Some(group) = self.groups.get_mut(&id) {
            group.set_download_error(text);
        }
    }

    /// Final merge of a round: recompute backend statuses and FS
    /// aggregates, process changed group metadata, and re-derive group,
    /// couple and namespace state.
    pub fn update(&mut self, ctx: &UpdateContext) {
        for node in self.nodes.values_mut() {
            node.refresh_derived_state(ctx.now_sec, ctx.stale_timeout, ctx.reserved_space);
        }

        self.update_group_structure();

        let ids: Vec<GroupId> = self.groups.keys().copied().collect();
        for id in &ids {
            if self.groups[id].needs_processing() {
                self.process_group_metadata(*id, ctx);
            }
        }
        // metadata processing may have created couple-member groups
        let ids: Vec<GroupId> = self.groups.keys().copied().collect();
        for id in &ids {
            self.update_group_status(*id, ctx);
        }

        self.update_couple_statuses();
        self.rebuild_namespace_members();
    }

    /// Parse and apply one group's metadata document.
    ///
    /// Namespace and couple moves are not applied: the existing binding is
    /// kept, the anomaly is logged and the group goes BAD until the next
    /// successful processing.
    fn process_group_metadata(&mut self, id: GroupId, ctx: &UpdateContext) {
        let Some(mut group) = self.groups.remove(&id) else {
            return;
        };

        group.clean = true;
        group.metadata_process_start = ctx.now_micros();
        group.metadata_anomaly = None;

        match GroupMetadata::parse(&group.metadata) {
            Ok(meta) => {
                group.version = meta.version;
                group.frozen = meta.frozen;
                group.service = GroupService {
                    migrating: meta.migrating,
                    job_id: meta.job_id.clone(),
                };

                self.bind_namespace(&mut group, &meta);
                if group.metadata_anomaly.is_none() {
                    self.bind_couple(&mut group, &meta);
                }
            }
            Err(e) => {
                group.metadata_anomaly = Some(e.to_string());
            }
        }

        self.groups.insert(id, group);
    }

    fn bind_namespace(&mut self, group: &mut Group, meta: &GroupMetadata) {
        match &group.namespace {
            None => {
                self.namespaces
                    .entry(meta.namespace.clone())
                    .or_insert_with(|| Namespace::new(meta.namespace.clone()));
                group.namespace = Some(meta.namespace.clone());
            }
            Some(current) if *current != meta.namespace => {
                let text = format!(
                    "Group moved to another namespace: '{}' -> '{}'",
                    current, meta.namespace
                );
                error!(group = %group.id, "{}", text);
                group.metadata_anomaly = Some(text);
            }
            Some(_) => {}
        }
    }

    fn bind_couple(&mut self, group: &mut Group, meta: &GroupMetadata) {
        match &group.couple {
            Some(current) => {
                if *current != meta.couple_key() {
                    let existing = self
                        .couples
                        .get(current)
                        .map(|c| {
                            let parts: Vec<String> =
                                c.group_ids.iter().map(GroupId::to_string).collect();
                            parts.join(" ")
                        })
                        .unwrap_or_else(|| current.as_str().replace(':', " "));
                    let text = format!(
                        "Couple in group metadata [ {} ] doesn't match to existing one [ {} ]",
                        meta.couple_ids_text(),
                        existing
                    );
                    error!(group = %group.id, "{}", text);
                    group.metadata_anomaly = Some(text);
                }
            }
            None => {
                if !meta.couple.is_empty() {
                    let key = self.create_couple(&meta.couple, group.id);
                    group.couple = Some(key);
                }
            }
        }
    }

    /// Ensure a couple exists for `ids` and bind its member groups.
    ///
    /// Member groups that do not exist yet are created in INIT. A member
    /// already bound to a different couple is left alone; its own metadata
    /// processing reports the mismatch.
    fn create_couple(&mut self, ids: &[GroupId], origin: GroupId) -> CoupleKey {
        let couple = Couple::new(ids.to_vec());
        let key = couple.key.clone();
        self.couples.entry(key.clone()).or_insert(couple);

        for gid in ids {
            if *gid == origin {
                continue;
            }
            let member = self.groups.entry(*gid).or_insert_with(|| Group::new(*gid));
            if member.couple.is_none() {
                member.couple = Some(key.clone());
            }
        }
        key
    }

    fn update_group_status(&mut self, id: GroupId, ctx: &UpdateContext) {
        // decide with shared borrows only, then apply in one place
        let decision = {
            let Some(group) = self.groups.get(&id) else {
                return;
            };

            if let Some(text) = &group.metadata_anomaly {
                Some((GroupStatus::Bad, Some(text.clone())))
            } else if group.backends.is_empty() {
                Some((GroupStatus::Init, Some("No node backends".to_string())))
            } else if group.metadata_process_start == 0 {
                // metadata never processed; keep INIT and whatever
                // download error text is already there
                Some((GroupStatus::Init, None))
            } else {
                let statuses: Vec<BackendStatus> = group
                    .backends
                    .iter()
                    .filter_map(|key| self.backend_status(key))
                    .collect();
                let (status, text) =
                    derive_group_status(&statuses, ctx.forbidden_dht_groups, &group.service);
                Some((status, Some(text)))
            }
        };

        if let Some((status, text)) = decision {
            let group = self.groups.get_mut(&id).expect("group just looked up");
            group.status = status;
            if let Some(text) = text {
                group.status_text = text;
            }
        }
    }

    fn update_couple_statuses(&mut self) {
        let couple_keys: Vec<CoupleKey> = self.couples.keys().cloned().collect();
        for key in couple_keys {
            let members: Vec<(GroupId, GroupStatus)> = self.couples[&key]
                .group_ids
                .iter()
                .filter_map(|gid| self.groups.get(gid).map(|g| (*gid, g.status)))
                .collect();
            if let Some(couple) = self.couples.get_mut(&key) {
                couple.update_status(&members);
            }
        }
    }

    /// Re-derive namespace membership so that a couple belongs to a
    /// namespace exactly when one of its groups does.
    fn rebuild_namespace_members(&mut self) {
        for ns in self.namespaces.values() {
            ns.clear_couples();
        }
        for group in self.groups.values() {
            let (Some(ns), Some(couple)) = (&group.namespace, &group.couple) else {
                continue;
            };
            self.namespaces
                .entry(ns.clone())
                .or_insert_with(|| Namespace::new(ns.clone()))
                .add_couple(couple.clone());
        }
    }

    /// Status of a backend resolved through the node index.
    #[must_use]
    pub fn backend_status(&self, key: &BackendKey) -> Option<BackendStatus> {
        self.find_backend(key).map(|b| b.status)
    }

    #[must_use]
    pub fn find_backend(&self, key: &BackendKey) -> Option<&Backend> {
        let node = self.nodes.get(key.node_part())?;
        node.backends.values().find(|b| b.key == *key)
    }

    /// Filter matching for one group (see the snapshot projection).
    ///
    /// Group/namespace/couple restrictions apply to the group itself; for
    /// the node/backend/filesystem kinds at least one backend must satisfy
    /// every requested constraint simultaneously.
    #[must_use]
    pub fn group_matches(&self, group: &Group, filter: &Filter, item_types: ItemTypes) -> bool {
        if filter.restricts(item_types, ItemTypes::GROUP) && !filter.has_group(group.id.get()) {
            return false;
        }

        if filter.restricts(item_types, ItemTypes::NAMESPACE) {
            match &group.namespace {
                Some(ns) if filter.has_namespace(ns) => {}
                _ => return false,
            }
        }

        if filter.restricts(item_types, ItemTypes::COUPLE) {
            match &group.couple {
                Some(couple) if filter.has_couple(couple.as_str()) => {}
                _ => return false,
            }
        }

        let check_nodes = filter.restricts(item_types, ItemTypes::NODE);
        let check_backends = filter.restricts(item_types, ItemTypes::BACKEND);
        let check_fs = filter.restricts(item_types, ItemTypes::FS);

        if !(check_nodes || check_backends || check_fs) {
            return true;
        }

        for key in &group.backends {
            let node_ok = !check_nodes || filter.has_node(key.node_part());
            let backend_ok = !check_backends || filter.has_backend(key.as_str());
            let fs_ok = !check_fs
                || self
                    .find_backend(key)
                    .and_then(Backend::fs_key)
                    .is_some_and(|fs| filter.has_filesystem(fs.as_str()));
            if node_ok && backend_ok && fs_ok {
                return true;
            }
        }
        false
    }
}
