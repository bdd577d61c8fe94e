//! Property-based tests for the pure derivation and parsing functions

use proptest::prelude::*;
use serde_json::json;

use mastermind_collector::filter::Filter;
use mastermind_collector::stats::StatsParser;
use mastermind_collector::storage::{BackendStatus, GroupService, GroupStatus, derive_group_status};

fn backend_status_strategy() -> impl Strategy<Value = BackendStatus> {
    prop_oneof![
        Just(BackendStatus::Init),
        Just(BackendStatus::Ok),
        Just(BackendStatus::Ro),
        Just(BackendStatus::Bad),
        Just(BackendStatus::Stalled),
        Just(BackendStatus::Broken),
    ]
}

/// Independent restatement of the status rule table.
fn status_oracle(
    backends: &[BackendStatus],
    forbidden_dht: bool,
    migrating: bool,
) -> GroupStatus {
    if backends.is_empty() {
        GroupStatus::Init
    } else if backends.len() > 1 && forbidden_dht {
        GroupStatus::Broken
    } else if backends.contains(&BackendStatus::Bad) {
        GroupStatus::Broken
    } else if backends.contains(&BackendStatus::Ro) {
        if migrating {
            GroupStatus::Migrating
        } else {
            GroupStatus::Ro
        }
    } else if backends.iter().any(|s| *s != BackendStatus::Ok) {
        GroupStatus::Bad
    } else {
        GroupStatus::Coupled
    }
}

proptest! {
    /// Deriving a group status is a pure function of the rule table.
    #[test]
    fn prop_group_status_matches_table(
        backends in proptest::collection::vec(backend_status_strategy(), 0..6),
        forbidden_dht in any::<bool>(),
        migrating in any::<bool>(),
    ) {
        let service = GroupService {
            migrating,
            job_id: "job-1".to_string(),
        };
        let (status, text) = derive_group_status(&backends, forbidden_dht, &service);
        prop_assert_eq!(status, status_oracle(&backends, forbidden_dht, migrating));
        prop_assert!(!text.is_empty());
    }

    /// Filter parsing sorts every id array and collapses duplicates.
    #[test]
    fn prop_filter_round_trip(
        groups in proptest::collection::vec(0u64..1000, 0..20),
        namespaces in proptest::collection::vec("[a-z]{1,8}", 0..10),
        couples in proptest::collection::vec("[0-9:]{1,12}", 0..10),
    ) {
        let request = json!({
            "groups": groups,
            "namespaces": namespaces,
            "couples": couples,
        });
        let filter = Filter::from_json(request.to_string().as_bytes()).unwrap();

        // sorted and free of duplicates
        prop_assert!(filter.groups.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(filter.namespaces.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(filter.couples.windows(2).all(|w| w[0] < w[1]));

        // set semantics preserved
        for g in &groups {
            prop_assert!(filter.has_group(*g));
        }
        for ns in &namespaces {
            prop_assert!(filter.has_namespace(ns));
        }
        prop_assert!(filter.groups.iter().all(|g| groups.contains(g)));
    }

    /// Parsing the same monitor blob twice produces identical records.
    #[test]
    fn prop_stats_parser_idempotent(
        ts in 0u64..2_000_000_000,
        blocks in 0u64..1_000_000,
        bavail in 0u64..1_000_000,
        bsize in 1u64..65_536,
        group in 1u64..10_000,
        read_only in any::<bool>(),
    ) {
        let blob = json!({
            "timestamp": {"tv_sec": ts, "tv_usec": 0},
            "backends": {
                "backend_1": {
                    "backend_id": 1,
                    "status": {"state": 1, "read_only": read_only},
                    "backend": {
                        "vfs": {"blocks": blocks, "bavail": bavail, "bsize": bsize, "fsid": 42},
                        "config": {"group": group}
                    }
                }
            }
        })
        .to_string();

        let first = StatsParser::parse(blob.as_bytes()).unwrap();
        let second = StatsParser::parse(blob.as_bytes()).unwrap();
        prop_assert_eq!(&first, &second);

        prop_assert_eq!(first.backends.len(), 1);
        prop_assert_eq!(first.backends[0].vfs_blocks, blocks);
        prop_assert_eq!(first.backends[0].group, group);
        prop_assert_eq!(first.node.ts_sec, ts);
    }
}
