//! Snapshot JSON projection
//!
//! Serializes the entities of a committed snapshot selected by an
//! optional filter. Groups go through the full conjunction matching of
//! the storage model; the remaining kinds are selected by their own id
//! lists only.

use serde_json::{Value, json};

use crate::filter::{Filter, ItemTypes};
use crate::storage::{Backend, Couple, Fs, Group, Namespace, Node, Storage};

/// Project `storage` through `filter` (absent filter selects everything).
#[must_use]
pub fn project(storage: &Storage, filter: Option<&Filter>) -> Value {
    let groups: Vec<Value> = storage
        .groups
        .values()
        .filter(|group| match filter {
            Some(f) => storage.group_matches(group, f, f.item_types),
            None => true,
        })
        .map(group_json)
        .collect();

    let couples: Vec<Value> = storage
        .couples
        .values()
        .filter(|couple| selected(filter, ItemTypes::COUPLE, |f| f.has_couple(couple.key.as_str())))
        .map(couple_json)
        .collect();

    let namespaces: Vec<Value> = storage
        .namespaces
        .values()
        .filter(|ns| selected(filter, ItemTypes::NAMESPACE, |f| f.has_namespace(&ns.name)))
        .map(namespace_json)
        .collect();

    let mut nodes = Vec::new();
    let mut backends = Vec::new();
    let mut filesystems = Vec::new();
    for node in storage.nodes.values() {
        if selected(filter, ItemTypes::NODE, |f| f.has_node(node.key.as_str())) {
            nodes.push(node_json(node));
        }
        for backend in node.backends.values() {
            if selected(filter, ItemTypes::BACKEND, |f| {
                f.has_backend(backend.key.as_str())
            }) {
                backends.push(backend_json(backend));
            }
        }
        for fs in node.filesystems.values() {
            if selected(filter, ItemTypes::FS, |f| f.has_filesystem(fs.key.as_str())) {
                filesystems.push(fs_json(fs));
            }
        }
    }

    json!({
        "nodes": nodes,
        "backends": backends,
        "filesystems": filesystems,
        "groups": groups,
        "couples": couples,
        "namespaces": namespaces,
    })
}

fn selected(filter: Option<&Filter>, kind: ItemTypes, contains: impl Fn(&Filter) -> bool) -> bool {
    match filter {
        Some(f) if f.restricts(f.item_types, kind) => contains(f),
        _ => true,
    }
}

fn group_json(group: &Group) -> Value {
    let mut value = json!({
        "id": group.id.get(),
        "backends": group.backends.iter().map(|b| b.as_str()).collect::<Vec<_>>(),
        "status_text": group.status_text,
        "status": group.status.as_str(),
        "frozen": group.frozen,
        "version": group.version,
        "namespace": group.namespace.as_deref().unwrap_or(""),
    });

    if let Some(couple) = &group.couple {
        value["couple"] = json!(couple.as_str());
    }

    if group.service.migrating || !group.service.job_id.is_empty() {
        value["service"] = json!({
            "migrating": group.service.migrating,
            "job_id": group.service.job_id,
        });
    }

    value
}

fn couple_json(couple: &Couple) -> Value {
    json!({
        "id": couple.key.as_str(),
        "groups": couple.group_ids.iter().map(|g| g.get()).collect::<Vec<_>>(),
        "status": couple.status.as_str(),
        "status_text": couple.status_text,
    })
}

fn namespace_json(ns: &Namespace) -> Value {
    json!({
        "name": ns.name,
        "couples": ns.couples().iter().map(|c| c.as_str().to_string()).collect::<Vec<_>>(),
    })
}

fn node_json(node: &Node) -> Value {
    json!({
        "key": node.key.as_str(),
        "host": node.host,
        "port": node.port,
        "family": node.family,
        "stat": node.stat,
    })
}

fn backend_json(backend: &Backend) -> Value {
    json!({
        "key": backend.key.as_str(),
        "node": backend.node_key.as_str(),
        "backend_id": backend.backend_id,
        "group": backend.stat.group,
        "status": backend.status.as_str(),
        "total_space": backend.total_space(),
        "free_space": backend.free_space(),
        "records_total": backend.stat.records_total,
        "records_removed": backend.stat.records_removed,
        "want_defrag": backend.stat.want_defrag,
        "read_only": backend.stat.read_only != 0,
    })
}

fn fs_json(fs: &Fs) -> Value {
    json!({
        "key": fs.key.as_str(),
        "fsid": fs.fsid,
        "node": fs.node_key.as_str(),
        "backends": fs.backend_ids.iter().copied().collect::<Vec<_>>(),
        "total_space": fs.total_space,
        "free_space": fs.free_space,
        "effective_free_space": fs.effective_free_space,
    })
}
