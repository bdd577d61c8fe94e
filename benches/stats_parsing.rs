//! Benchmarks for monitor stats parsing
//!
//! The stats parser runs once per node per round over multi-megabyte
//! monitor documents; this tracks the per-backend extraction cost.
//!
//! Run with: cargo bench --bench stats_parsing

use divan::{Bencher, black_box};

use mastermind_collector::stats::StatsParser;

fn main() {
    divan::main();
}

fn monitor_document(backends: usize) -> String {
    let mut folder = String::new();
    for id in 0..backends {
        if id > 0 {
            folder.push(',');
        }
        folder.push_str(&format!(
            r#""backend_{id}": {{
                "backend_id": {id},
                "status": {{"state": 1, "read_only": false, "defrag_state": 0,
                            "last_start": {{"tv_sec": 1599990000, "tv_usec": 0}}}},
                "backend": {{
                    "dstat": {{"read_ios": 10, "write_ios": 20, "read_ticks": 30,
                               "write_ticks": 40, "io_ticks": 50, "read_sectors": 60, "error": 0}},
                    "vfs": {{"blocks": 1000000, "bavail": 500000, "bsize": 4096,
                             "fsid": {id}, "error": 0}},
                    "summary_stats": {{"records_total": 100000, "records_removed": 500,
                                       "records_removed_size": 4096000, "want_defrag": 0,
                                       "base_size": 12345678}},
                    "config": {{"blob_size_limit": 100000000, "blob_size": 50000000,
                                "group": {group}, "data": "/srv/storage/{id}/1/data",
                                "file": "/srv/storage/{id}/1/data-0.0"}},
                    "base_stats": {{"data-0.0": {{"base_size": 300}},
                                    "data-0.1": {{"base_size": 700}}}}
                }},
                "commands": {{
                    "WRITE": {{"cache": {{"internal": {{"size": 10, "time": 1}}}},
                               "disk": {{"outside": {{"size": 30, "time": 3}}}}}},
                    "READ": {{"cache": {{"outside": {{"size": 5, "time": 2}}}},
                              "disk": {{"internal": {{"size": 7, "time": 4}}}}}}
                }},
                "io": {{"blocking": {{"current_size": 11}},
                        "nonblocking": {{"current_size": 13}}}}
            }}"#,
            id = id,
            group = id + 1,
        ));
    }

    format!(
        r#"{{
            "timestamp": {{"tv_sec": 1600000000, "tv_usec": 250}},
            "backends": {{{folder}}},
            "procfs": {{
                "vm": {{"la": [110, 95, 80]}},
                "net": {{"net_interfaces": {{
                    "lo": {{"receive": {{"bytes": 999}}, "transmit": {{"bytes": 999}}}},
                    "eth0": {{"receive": {{"bytes": 1500}}, "transmit": {{"bytes": 2500}}}}
                }}}}
            }},
            "stats": {{
                "eblob.1.disk.stat_commit.errors.30": {{"count": 6}},
                "eblob.2.disk.stat_commit.errors.5": {{"count": 2}}
            }}
        }}"#
    )
}

#[divan::bench(args = [1, 16, 128])]
fn parse_monitor_stats(bencher: Bencher, backends: usize) {
    let document = monitor_document(backends);
    bencher.bench(|| StatsParser::parse(black_box(document.as_bytes())));
}
