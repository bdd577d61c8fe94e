//! End-to-end scenarios over the storage model: one staged round at a
//! time, snapshot state asserted afterwards.

mod common;

use common::*;
use mastermind_collector::filter::Filter;
use mastermind_collector::storage::{CoupleStatus, GroupStatus, Storage};
use mastermind_collector::types::{CoupleKey, FsKey, GroupId, NodeKey};

/// Minimal single-node round: one backend in group 7, metadata couples it
/// into namespace "ns".
#[test]
fn test_minimal_single_node_round() {
    let config = test_config(&["h1"]);
    let mut storage = Storage::from_config(&config);

    run_round(
        &mut storage,
        &config,
        1_000,
        &[("h1", monitor_json(950, &[(1, 7, 42, false)]))],
        &[(7, meta_map(&[7], "ns", false))],
    );

    assert_eq!(storage.nodes.len(), 1);
    let node = &storage.nodes[&NodeKey::new("h1", 1025, 2)];
    assert_eq!(node.backends.len(), 1);

    let fs = &node.filesystems[&42];
    assert_eq!(fs.key, FsKey::new(&NodeKey::new("h1", 1025, 2), 42));
    assert_eq!(fs.total_space, 4_096_000);

    let group = &storage.groups[&GroupId::new(7)];
    assert_eq!(group.status, GroupStatus::Coupled);
    assert_eq!(group.status_text, "Group is OK");
    assert!(!group.frozen);
    assert_eq!(group.version, 2);

    assert_eq!(storage.couples.len(), 1);
    let couple = &storage.couples[&CoupleKey::from_group_ids(&[GroupId::new(7)])];
    assert_eq!(couple.status, CoupleStatus::Ok);

    assert_eq!(storage.namespaces.len(), 1);
    assert!(storage.namespaces.contains_key("ns"));
}

/// A second backend joins group 7 on the same node while DHT groups are
/// forbidden.
#[test]
fn test_dht_groups_forbidden() {
    let config = {
        let mut c = test_config(&["h1"]);
        c.forbidden_dht_groups = true;
        c
    };
    let mut storage = Storage::from_config(&config);

    run_round(
        &mut storage,
        &config,
        1_000,
        &[("h1", monitor_json(950, &[(1, 7, 42, false), (2, 7, 42, false)]))],
        &[(7, meta_map(&[7], "ns", false))],
    );

    let group = &storage.groups[&GroupId::new(7)];
    assert_eq!(group.status, GroupStatus::Broken);
    assert!(group.status_text.starts_with("DHT groups are forbidden"));
}

/// Read-only backend plus a MIGRATING service section.
#[test]
fn test_migrating() {
    let config = test_config(&["h1"]);
    let mut storage = Storage::from_config(&config);

    run_round(
        &mut storage,
        &config,
        1_000,
        &[("h1", monitor_json(950, &[(1, 7, 42, true)]))],
        &[(7, meta_map_with_service(&[7], "ns", "MIGRATING", "job-42"))],
    );

    let group = &storage.groups[&GroupId::new(7)];
    assert_eq!(group.status, GroupStatus::Migrating);
    assert!(group.status_text.contains("job-42"));
    assert!(group.service.migrating);
}

/// Metadata moves group 3 to a different couple; the binding stays, the
/// group goes BAD and the existing couple is untouched.
#[test]
fn test_couple_mismatch() {
    let config = test_config(&["h1"]);
    let mut storage = Storage::from_config(&config);

    run_round(
        &mut storage,
        &config,
        1_000,
        &[("h1", monitor_json(950, &[(1, 3, 42, false)]))],
        &[(3, meta_map(&[3, 4], "ns", false))],
    );
    assert_eq!(
        storage.groups[&GroupId::new(3)].couple.as_ref().unwrap().as_str(),
        "3:4"
    );

    run_round(
        &mut storage,
        &config,
        1_100,
        &[("h1", monitor_json(1_050, &[(1, 3, 42, false)]))],
        &[(3, meta_map(&[3, 5], "ns", false))],
    );

    let group = &storage.groups[&GroupId::new(3)];
    assert_eq!(group.status, GroupStatus::Bad);
    assert_eq!(
        group.status_text,
        "Couple in group metadata [ 3 5 ] doesn't match to existing one [ 3 4 ]"
    );
    assert_eq!(group.couple.as_ref().unwrap().as_str(), "3:4");
    assert!(storage
        .couples
        .contains_key(&CoupleKey::from_group_ids(&[GroupId::new(3), GroupId::new(4)])));
}

/// Groups {1,2,3} in namespaces {A,A,B}; filters select by namespace, by
/// group, and by impossible combinations.
#[test]
fn test_filter_selectivity() {
    let config = test_config(&["h1"]);
    let mut storage = Storage::from_config(&config);

    run_round(
        &mut storage,
        &config,
        1_000,
        &[(
            "h1",
            monitor_json(950, &[(1, 1, 42, false), (2, 2, 42, false), (3, 3, 42, false)]),
        )],
        &[
            (1, meta_map(&[1], "A", false)),
            (2, meta_map(&[2], "A", false)),
            (3, meta_map(&[3], "B", false)),
        ],
    );

    let count = |json: &str| {
        let filter = Filter::from_json(json.as_bytes()).unwrap();
        storage
            .groups
            .values()
            .filter(|g| storage.group_matches(g, &filter, filter.item_types))
            .count()
    };

    assert_eq!(count(r#"{"namespaces": ["A"]}"#), 2);
    assert_eq!(count(r#"{"groups": [2]}"#), 1);
    assert_eq!(count(r#"{"namespaces": ["A"], "groups": [3]}"#), 0);
    assert_eq!(count(r#"{}"#), 3);
}

/// Unknown top-level structure and a string where a number belongs: every
/// other field parses as in the clean response, the malformed record is
/// discarded by the node merge.
#[test]
fn test_stat_parse_tolerates_unknowns() {
    let config = test_config(&["h1"]);
    let mut storage = Storage::from_config(&config);

    let clean = monitor_json(950, &[(1, 7, 42, false)]);
    let with_unknown = format!(
        r#"{{"future_field": {{"x": [1, 2, {{"y": "z"}}]}}, {}"#,
        clean.strip_prefix('{').unwrap()
    );

    run_round(
        &mut storage,
        &config,
        1_000,
        &[("h1", with_unknown)],
        &[(7, meta_map(&[7], "ns", false))],
    );

    let group = &storage.groups[&GroupId::new(7)];
    assert_eq!(group.status, GroupStatus::Coupled);
    let node = storage.nodes.values().next().unwrap();
    assert_eq!(node.backends[&1].stat.vfs_blocks, 1000);

    // a malformed backend record is dropped; the previous record survives
    let broken = clean.replacen("\"blocks\":1000", "\"blocks\":\"1000\"", 1);
    let broken = if broken == clean {
        clean.replacen("\"blocks\": 1000", "\"blocks\": \"1000\"", 1)
    } else {
        broken
    };
    let mut storage2 = Storage::from_config(&config);
    run_round(
        &mut storage2,
        &config,
        1_000,
        &[("h1", clean.clone())],
        &[(7, meta_map(&[7], "ns", false))],
    );
    run_round(
        &mut storage2,
        &config,
        1_100,
        &[("h1", broken)],
        &[(7, meta_map(&[7], "ns", false))],
    );
    let node = storage2.nodes.values().next().unwrap();
    assert_eq!(node.backends[&1].stat.vfs_blocks, 1000);
}

/// A node download failure degrades to the previous data without failing
/// the round.
#[test]
fn test_failed_download_keeps_previous_round() {
    let config = test_config(&["h1"]);
    let mut storage = Storage::from_config(&config);

    run_round(
        &mut storage,
        &config,
        1_000,
        &[("h1", monitor_json(950, &[(1, 7, 42, false)]))],
        &[(7, meta_map(&[7], "ns", false))],
    );

    // next round: no stats arrive at all (download dropped), metadata ok
    run_round(
        &mut storage,
        &config,
        1_050,
        &[],
        &[(7, meta_map(&[7], "ns", false))],
    );

    let group = &storage.groups[&GroupId::new(7)];
    assert_eq!(group.status, GroupStatus::Coupled);
    let node = storage.nodes.values().next().unwrap();
    assert_eq!(node.backends.len(), 1);
}

/// Backends whose stats go stale drive the group BAD through the status
/// table.
#[test]
fn test_stale_backend_degrades_group() {
    let config = test_config(&["h1"]);
    let mut storage = Storage::from_config(&config);

    run_round(
        &mut storage,
        &config,
        1_000,
        &[("h1", monitor_json(950, &[(1, 7, 42, false)]))],
        &[(7, meta_map(&[7], "ns", false))],
    );
    assert_eq!(storage.groups[&GroupId::new(7)].status, GroupStatus::Coupled);

    // two minutes later with no fresh stats the backend stalls
    run_round(
        &mut storage,
        &config,
        1_200,
        &[],
        &[(7, meta_map(&[7], "ns", false))],
    );

    let node = storage.nodes.values().next().unwrap();
    assert_eq!(
        node.backends[&1].status,
        mastermind_collector::storage::BackendStatus::Stalled
    );
    assert_eq!(storage.groups[&GroupId::new(7)].status, GroupStatus::Bad);
}
