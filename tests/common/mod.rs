//! Shared helpers for the integration suite

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use mastermind_collector::config::{Config, NodeInfo};
use mastermind_collector::session::{MetaError, MetaSession};
use mastermind_collector::storage::{Storage, UpdateContext};
use mastermind_collector::types::GroupId;

pub fn test_config(hosts: &[&str]) -> Config {
    Config {
        nodes: hosts
            .iter()
            .map(|h| NodeInfo {
                host: (*h).to_string(),
                port: 1025,
                family: 2,
            })
            .collect(),
        ..Default::default()
    }
}

pub fn update_context(config: &Config, now_sec: u64) -> UpdateContext {
    UpdateContext {
        now_sec,
        now_usec: 0,
        forbidden_dht_groups: config.forbidden_dht_groups,
        stale_timeout: config.node_backend_stat_stale_timeout,
        reserved_space: config.reserved_space,
    }
}

/// Monitor response with a configurable set of backends.
/// Each entry is (backend_id, group, fsid, read_only).
pub fn monitor_json(ts_sec: u64, backends: &[(u64, u64, u64, bool)]) -> String {
    let mut folder = serde_json::Map::new();
    for (backend_id, group, fsid, read_only) in backends {
        folder.insert(
            format!("backend_{}", backend_id),
            json!({
                "backend_id": backend_id,
                "status": {"state": 1, "read_only": read_only, "defrag_state": 0},
                "backend": {
                    "vfs": {"blocks": 1000, "bavail": 500, "bsize": 4096, "fsid": fsid},
                    "summary_stats": {"records_total": 100, "records_removed": 2},
                    "config": {"group": group}
                }
            }),
        );
    }
    json!({
        "timestamp": {"tv_sec": ts_sec, "tv_usec": 0},
        "backends": folder,
        "procfs": {"vm": {"la": [100]}},
    })
    .to_string()
}

/// Msgpack metadata document in the map shape.
pub fn meta_map(couple: &[u64], namespace: &str, frozen: bool) -> Vec<u8> {
    rmp_serde::to_vec_named(&json!({
        "version": 2,
        "couple": couple,
        "namespace": namespace,
        "frozen": frozen,
    }))
    .unwrap()
}

/// Msgpack metadata with a service section.
pub fn meta_map_with_service(couple: &[u64], namespace: &str, status: &str, job_id: &str) -> Vec<u8> {
    rmp_serde::to_vec_named(&json!({
        "version": 2,
        "couple": couple,
        "namespace": namespace,
        "frozen": false,
        "service": {"status": status, "job_id": job_id},
    }))
    .unwrap()
}

/// Feed one node's monitor response into a staging storage and run the
/// group-structure step, mirroring round stages 2 and 3.
pub fn feed_node(storage: &mut Storage, host: &str, json: &str) {
    let key = storage
        .nodes
        .keys()
        .find(|k| k.as_str().starts_with(host))
        .expect("configured node")
        .clone();
    let node = storage.nodes.get_mut(&key).unwrap();
    node.add_download_data(json.as_bytes());
    node.parse_stats();
    storage.update_group_structure();
}

/// Run a complete storage-level round: stats in, metadata in, update.
pub fn run_round(
    storage: &mut Storage,
    config: &Config,
    now_sec: u64,
    stats: &[(&str, String)],
    metadata: &[(u64, Vec<u8>)],
) {
    for (host, json) in stats {
        feed_node(storage, host, json);
    }
    for (group, bytes) in metadata {
        storage.save_group_metadata(GroupId::new(*group), bytes);
    }
    storage.update(&update_context(config, now_sec));
}

/// Metadata session answering from a fixed map of group id to document.
#[derive(Debug, Clone, Default)]
pub struct MockMetaSession {
    responses: HashMap<u64, Vec<u8>>,
}

impl MockMetaSession {
    pub fn new(responses: HashMap<u64, Vec<u8>>) -> Self {
        Self { responses }
    }

    pub fn single(group: u64, data: Vec<u8>) -> Self {
        Self::new(HashMap::from([(group, data)]))
    }
}

#[async_trait]
impl MetaSession for MockMetaSession {
    fn clone_session(&self) -> Box<dyn MetaSession> {
        Box::new(self.clone())
    }

    async fn read(&self, _namespace: &str, _key: &str, groups: &[u64]) -> Result<Vec<u8>, MetaError> {
        let id = groups.first().copied().unwrap_or(0);
        self.responses
            .get(&id)
            .cloned()
            .ok_or_else(|| MetaError::Read(format!("no metadata for group {}", id)))
    }
}

/// History database answering from a fixed map of group id to document.
#[derive(Debug, Clone, Default)]
pub struct MockHistoryDb {
    documents: HashMap<u64, bson::Document>,
}

impl MockHistoryDb {
    pub fn single(group: u64, doc: bson::Document) -> Self {
        Self {
            documents: HashMap::from([(group, doc)]),
        }
    }
}

#[async_trait]
impl mastermind_collector::history::HistoryDb for MockHistoryDb {
    async fn find_group_history(
        &self,
        group_id: u64,
    ) -> Result<Option<bson::Document>, mastermind_collector::history::HistoryError> {
        Ok(self.documents.get(&group_id).cloned())
    }
}

/// Serve canned monitor JSON over HTTP on an ephemeral local port.
/// Returns the bound port; the accept loop runs until the runtime drops.
pub async fn spawn_monitor_server(body: String) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let body = Arc::clone(&body);
            tokio::spawn(async move {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut buf = [0u8; 4096];
                // read the request head; the GET has no body
                let _ = tokio::time::timeout(Duration::from_secs(1), socket.read(&mut buf)).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    port
}
