//! Tree-state machine over monitor JSON
//!
//! The monitor schema is huge and heterogeneous, but every value of
//! interest lives at a unique path of parent folders. Each recognized key
//! at each depth owns one bit; the current path is the OR of the bits on
//! the way down. Membership of a value in a path is then a single integer
//! compare, regardless of tree depth, and nothing is allocated per field.
//!
//! Three tables declare the whole schema: folder rows (per depth), uint
//! infos and string infos. Unknown keys and extra structure are ignored,
//! so the monitor schema can grow without parser churn.

use std::collections::BTreeMap;
use tracing::warn;

use super::sax::JsonSink;
use super::{BackendStat, NodeStat, ParsedStats, StatCommitStat};

/// Bit always present in the path mask.
const ROOT: u64 = 0x1;

const BACKENDS: u64 = 0x2;
const BACKEND_FOLDER: u64 = 0x4;
const BACKEND: u64 = 0x8;
const DSTAT: u64 = 0x10;
const READ_IOS: u64 = 0x20;
const WRITE_IOS: u64 = 0x40;
const READ_TICKS: u64 = 0x80;
const WRITE_TICKS: u64 = 0x100;
const IO_TICKS: u64 = 0x200;
const READ_SECTORS: u64 = 0x400;
const ERROR: u64 = 0x800;
const VFS: u64 = 0x20;
const BLOCKS: u64 = 0x40;
const BAVAIL: u64 = 0x80;
const BSIZE: u64 = 0x100;
const FSID: u64 = 0x200;
const SUMMARY_STATS: u64 = 0x40;
const RECORDS_TOTAL: u64 = 0x80;
const RECORDS_REMOVED: u64 = 0x100;
const RECORDS_REMOVED_SIZE: u64 = 0x200;
const WANT_DEFRAG: u64 = 0x400;
const BASE_SIZE: u64 = 0x800;
const CONFIG: u64 = 0x80;
const BLOB_SIZE_LIMIT: u64 = 0x100;
const BLOB_SIZE: u64 = 0x200;
const GROUP: u64 = 0x400;
const DATA_PATH: u64 = 0x800;
const FILE_PATH: u64 = 0x1000;
const BASE_STATS: u64 = 0x100;
const BLOB_FILENAME: u64 = 0x200;
const BLOB_BASE_SIZE: u64 = 0x400;
const BACKEND_ID: u64 = 0x10;
const STATUS: u64 = 0x20;
const DEFRAG_STATE: u64 = 0x40;
const STATE: u64 = 0x80;
const READ_ONLY: u64 = 0x100;
const LAST_START: u64 = 0x200;
const LAST_START_TV_SEC: u64 = 0x400;
const LAST_START_TV_USEC: u64 = 0x800;
const COMMANDS: u64 = 0x40;
const WRITE: u64 = 0x80;
const NOT_WRITE: u64 = 0x100;
const CACHE: u64 = 0x200;
const DISK: u64 = 0x400;
const COMMAND_SOURCE: u64 = 0x800;
const SIZE: u64 = 0x1000;
const TIME: u64 = 0x2000;
const IO: u64 = 0x80;
const BLOCKING: u64 = 0x100;
const NONBLOCKING: u64 = 0x200;
const CURRENT_SIZE: u64 = 0x400;

const TIMESTAMP: u64 = 0x4;
const TV_SEC: u64 = 0x8;
const TV_USEC: u64 = 0x10;

const PROCFS: u64 = 0x8;
const VM: u64 = 0x10;
const LA: u64 = 0x20;
const NET: u64 = 0x20;
const NET_INTERFACES: u64 = 0x40;
const NET_INTERFACE_NAME: u64 = 0x80;
const RECEIVE: u64 = 0x100;
const TRANSMIT: u64 = 0x200;
const BYTES: u64 = 0x400;

const STATS: u64 = 0x10;
const STAT_NAME: u64 = 0x20;
const COUNT: u64 = 0x40;

/// errno of a read-only filesystem on Linux
const EROFS: u64 = 30;

#[derive(Debug)]
enum KeyMatch {
    Exact(&'static str),
    Not(&'static str),
    Any,
}

impl KeyMatch {
    fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(s) => key == *s,
            Self::Not(s) => key != *s,
            Self::Any => true,
        }
    }
}

struct FolderRow {
    matcher: KeyMatch,
    parent: u64,
    bit: u64,
}

const fn exact(name: &'static str, parent: u64, bit: u64) -> FolderRow {
    FolderRow {
        matcher: KeyMatch::Exact(name),
        parent,
        bit,
    }
}

const fn not(name: &'static str, parent: u64, bit: u64) -> FolderRow {
    FolderRow {
        matcher: KeyMatch::Not(name),
        parent,
        bit,
    }
}

const fn any(parent: u64, bit: u64) -> FolderRow {
    FolderRow {
        matcher: KeyMatch::Any,
        parent,
        bit,
    }
}

/// Folder rows per key depth. Rows are tried in order; the first whose
/// parent mask is contained in the current path wins.
static FOLDERS: [&[FolderRow]; 7] = [
    &[
        exact("backends", 0, BACKENDS),
        exact("timestamp", 0, TIMESTAMP),
        exact("procfs", 0, PROCFS),
        exact("stats", 0, STATS),
    ],
    &[
        any(BACKENDS, BACKEND_FOLDER),
        exact("tv_sec", TIMESTAMP, TV_SEC),
        exact("tv_usec", TIMESTAMP, TV_USEC),
        exact("vm", PROCFS, VM),
        exact("net", PROCFS, NET),
        any(STATS, STAT_NAME),
    ],
    &[
        exact("backend", BACKENDS | BACKEND_FOLDER, BACKEND),
        exact("backend_id", BACKENDS | BACKEND_FOLDER, BACKEND_ID),
        exact("status", BACKENDS | BACKEND_FOLDER, STATUS),
        exact("commands", BACKENDS | BACKEND_FOLDER, COMMANDS),
        exact("io", BACKENDS | BACKEND_FOLDER, IO),
        exact("la", PROCFS | VM, LA),
        exact("net_interfaces", PROCFS | NET, NET_INTERFACES),
        exact("count", STATS | STAT_NAME, COUNT),
    ],
    &[
        exact("dstat", BACKENDS | BACKEND_FOLDER | BACKEND, DSTAT),
        exact("vfs", BACKENDS | BACKEND_FOLDER | BACKEND, VFS),
        exact("summary_stats", BACKENDS | BACKEND_FOLDER | BACKEND, SUMMARY_STATS),
        exact("config", BACKENDS | BACKEND_FOLDER | BACKEND, CONFIG),
        exact("base_stats", BACKENDS | BACKEND_FOLDER | BACKEND, BASE_STATS),
        exact("defrag_state", BACKENDS | BACKEND_FOLDER | STATUS, DEFRAG_STATE),
        exact("state", BACKENDS | BACKEND_FOLDER | STATUS, STATE),
        exact("read_only", BACKENDS | BACKEND_FOLDER | STATUS, READ_ONLY),
        exact("last_start", BACKENDS | BACKEND_FOLDER | STATUS, LAST_START),
        exact("WRITE", BACKENDS | BACKEND_FOLDER | COMMANDS, WRITE),
        not("WRITE", BACKENDS | BACKEND_FOLDER | COMMANDS, NOT_WRITE),
        exact("blocking", BACKENDS | BACKEND_FOLDER | IO, BLOCKING),
        exact("nonblocking", BACKENDS | BACKEND_FOLDER | IO, NONBLOCKING),
        not("lo", PROCFS | NET | NET_INTERFACES, NET_INTERFACE_NAME),
    ],
    &[
        exact("read_ios", BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT, READ_IOS),
        exact("write_ios", BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT, WRITE_IOS),
        exact("error", BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT, ERROR),
        exact("read_ticks", BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT, READ_TICKS),
        exact("write_ticks", BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT, WRITE_TICKS),
        exact("io_ticks", BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT, IO_TICKS),
        exact("read_sectors", BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT, READ_SECTORS),
        exact("blocks", BACKENDS | BACKEND_FOLDER | BACKEND | VFS, BLOCKS),
        exact("bavail", BACKENDS | BACKEND_FOLDER | BACKEND | VFS, BAVAIL),
        exact("bsize", BACKENDS | BACKEND_FOLDER | BACKEND | VFS, BSIZE),
        exact("fsid", BACKENDS | BACKEND_FOLDER | BACKEND | VFS, FSID),
        exact("error", BACKENDS | BACKEND_FOLDER | BACKEND | VFS, ERROR),
        exact(
            "records_total",
            BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS,
            RECORDS_TOTAL,
        ),
        exact(
            "records_removed",
            BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS,
            RECORDS_REMOVED,
        ),
        exact(
            "records_removed_size",
            BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS,
            RECORDS_REMOVED_SIZE,
        ),
        exact(
            "want_defrag",
            BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS,
            WANT_DEFRAG,
        ),
        exact(
            "base_size",
            BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS,
            BASE_SIZE,
        ),
        exact(
            "blob_size_limit",
            BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG,
            BLOB_SIZE_LIMIT,
        ),
        exact("blob_size", BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG, BLOB_SIZE),
        exact("group", BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG, GROUP),
        exact("data", BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG, DATA_PATH),
        exact("file", BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG, FILE_PATH),
        any(BACKENDS | BACKEND_FOLDER | BACKEND | BASE_STATS, BLOB_FILENAME),
        exact(
            "tv_sec",
            BACKENDS | BACKEND_FOLDER | STATUS | LAST_START,
            LAST_START_TV_SEC,
        ),
        exact(
            "tv_usec",
            BACKENDS | BACKEND_FOLDER | STATUS | LAST_START,
            LAST_START_TV_USEC,
        ),
        exact("cache", BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE, CACHE),
        exact("disk", BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE, DISK),
        exact("cache", BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE, CACHE),
        exact("disk", BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE, DISK),
        exact("current_size", BACKENDS | BACKEND_FOLDER | IO | BLOCKING, CURRENT_SIZE),
        exact(
            "current_size",
            BACKENDS | BACKEND_FOLDER | IO | NONBLOCKING,
            CURRENT_SIZE,
        ),
        exact("receive", PROCFS | NET | NET_INTERFACES | NET_INTERFACE_NAME, RECEIVE),
        exact("transmit", PROCFS | NET | NET_INTERFACES | NET_INTERFACE_NAME, TRANSMIT),
    ],
    &[
        exact(
            "base_size",
            BACKENDS | BACKEND_FOLDER | BACKEND | BASE_STATS | BLOB_FILENAME,
            BLOB_BASE_SIZE,
        ),
        exact("bytes", PROCFS | NET | NET_INTERFACES | NET_INTERFACE_NAME | RECEIVE, BYTES),
        exact(
            "bytes",
            PROCFS | NET | NET_INTERFACES | NET_INTERFACE_NAME | TRANSMIT,
            BYTES,
        ),
        any(BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | CACHE, COMMAND_SOURCE),
        any(BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | DISK, COMMAND_SOURCE),
        any(BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | CACHE, COMMAND_SOURCE),
        any(BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | DISK, COMMAND_SOURCE),
    ],
    &[
        exact(
            "size",
            BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | CACHE | COMMAND_SOURCE,
            SIZE,
        ),
        exact(
            "time",
            BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | CACHE | COMMAND_SOURCE,
            TIME,
        ),
        exact(
            "size",
            BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | DISK | COMMAND_SOURCE,
            SIZE,
        ),
        exact(
            "time",
            BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | DISK | COMMAND_SOURCE,
            TIME,
        ),
        exact(
            "size",
            BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | CACHE | COMMAND_SOURCE,
            SIZE,
        ),
        exact(
            "time",
            BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | CACHE | COMMAND_SOURCE,
            TIME,
        ),
        exact(
            "size",
            BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | DISK | COMMAND_SOURCE,
            SIZE,
        ),
        exact(
            "time",
            BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | DISK | COMMAND_SOURCE,
            TIME,
        ),
    ],
];

#[derive(Debug, Default)]
struct ParserData {
    backend: BackendStat,
    node: NodeStat,
    stat_commit: StatCommitStat,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Set,
    Sum,
    Max,
}

struct UIntRow {
    keys: u64,
    op: Op,
    field: fn(&mut ParserData) -> &mut u64,
}

struct StringRow {
    keys: u64,
    field: fn(&mut ParserData) -> &mut String,
}

macro_rules! backend_field {
    ($name:ident) => {{
        fn get(d: &mut ParserData) -> &mut u64 {
            &mut d.backend.$name
        }
        get
    }};
}

macro_rules! node_field {
    ($name:ident) => {{
        fn get(d: &mut ParserData) -> &mut u64 {
            &mut d.node.$name
        }
        get
    }};
}

macro_rules! uint_row {
    ($keys:expr, $op:ident, $field:expr) => {
        UIntRow {
            keys: $keys,
            op: Op::$op,
            field: $field,
        }
    };
}

static UINT_ROWS: &[UIntRow] = &[
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND_ID, Set, backend_field!(backend_id)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT | READ_IOS, Set, backend_field!(read_ios)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT | WRITE_IOS, Set, backend_field!(write_ios)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT | READ_TICKS, Set, backend_field!(read_ticks)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT | WRITE_TICKS, Set, backend_field!(write_ticks)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT | IO_TICKS, Set, backend_field!(io_ticks)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT | READ_SECTORS, Set, backend_field!(read_sectors)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | DSTAT | ERROR, Set, backend_field!(dstat_error)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | VFS | BLOCKS, Set, backend_field!(vfs_blocks)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | VFS | BAVAIL, Set, backend_field!(vfs_bavail)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | VFS | BSIZE, Set, backend_field!(vfs_bsize)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | VFS | FSID, Set, backend_field!(fsid)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | VFS | ERROR, Set, backend_field!(vfs_error)),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS | RECORDS_TOTAL,
        Set,
        backend_field!(records_total)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS | RECORDS_REMOVED,
        Set,
        backend_field!(records_removed)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS | RECORDS_REMOVED_SIZE,
        Set,
        backend_field!(records_removed_size)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS | WANT_DEFRAG,
        Set,
        backend_field!(want_defrag)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | BACKEND | SUMMARY_STATS | BASE_SIZE,
        Set,
        backend_field!(base_size)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG | BLOB_SIZE_LIMIT,
        Set,
        backend_field!(blob_size_limit)
    ),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG | BLOB_SIZE, Set, backend_field!(blob_size)),
    uint_row!(BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG | GROUP, Set, backend_field!(group)),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | BACKEND | BASE_STATS | BLOB_FILENAME | BLOB_BASE_SIZE,
        Max,
        backend_field!(max_blob_base_size)
    ),
    uint_row!(BACKENDS | BACKEND_FOLDER | STATUS | DEFRAG_STATE, Set, backend_field!(defrag_state)),
    uint_row!(BACKENDS | BACKEND_FOLDER | STATUS | STATE, Set, backend_field!(state)),
    uint_row!(BACKENDS | BACKEND_FOLDER | STATUS | READ_ONLY, Set, backend_field!(read_only)),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | STATUS | LAST_START | LAST_START_TV_SEC,
        Set,
        backend_field!(last_start_ts_sec)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | STATUS | LAST_START | LAST_START_TV_USEC,
        Set,
        backend_field!(last_start_ts_usec)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | CACHE | COMMAND_SOURCE | SIZE,
        Sum,
        backend_field!(ell_cache_write_size)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | CACHE | COMMAND_SOURCE | TIME,
        Sum,
        backend_field!(ell_cache_write_time)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | DISK | COMMAND_SOURCE | SIZE,
        Sum,
        backend_field!(ell_disk_write_size)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | COMMANDS | WRITE | DISK | COMMAND_SOURCE | TIME,
        Sum,
        backend_field!(ell_disk_write_time)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | CACHE | COMMAND_SOURCE | SIZE,
        Sum,
        backend_field!(ell_cache_read_size)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | CACHE | COMMAND_SOURCE | TIME,
        Sum,
        backend_field!(ell_cache_read_time)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | DISK | COMMAND_SOURCE | SIZE,
        Sum,
        backend_field!(ell_disk_read_size)
    ),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | COMMANDS | NOT_WRITE | DISK | COMMAND_SOURCE | TIME,
        Sum,
        backend_field!(ell_disk_read_time)
    ),
    uint_row!(BACKENDS | BACKEND_FOLDER | IO | BLOCKING | CURRENT_SIZE, Set, backend_field!(io_blocking_size)),
    uint_row!(
        BACKENDS | BACKEND_FOLDER | IO | NONBLOCKING | CURRENT_SIZE,
        Set,
        backend_field!(io_nonblocking_size)
    ),
    uint_row!(TIMESTAMP | TV_SEC, Set, node_field!(ts_sec)),
    uint_row!(TIMESTAMP | TV_USEC, Set, node_field!(ts_usec)),
    uint_row!(PROCFS | VM | LA, Set, node_field!(la1)),
    uint_row!(
        PROCFS | NET | NET_INTERFACES | NET_INTERFACE_NAME | RECEIVE | BYTES,
        Sum,
        node_field!(rx_bytes)
    ),
    uint_row!(
        PROCFS | NET | NET_INTERFACES | NET_INTERFACE_NAME | TRANSMIT | BYTES,
        Sum,
        node_field!(tx_bytes)
    ),
    UIntRow {
        keys: STATS | STAT_NAME | COUNT,
        op: Op::Set,
        field: {
            fn get(d: &mut ParserData) -> &mut u64 {
                &mut d.stat_commit.count
            }
            get
        },
    },
];

static STRING_ROWS: &[StringRow] = &[
    StringRow {
        keys: BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG | DATA_PATH,
        field: {
            fn get(d: &mut ParserData) -> &mut String {
                &mut d.backend.data_path
            }
            get
        },
    },
    StringRow {
        keys: BACKENDS | BACKEND_FOLDER | BACKEND | CONFIG | FILE_PATH,
        field: {
            fn get(d: &mut ParserData) -> &mut String {
                &mut d.backend.file_path
            }
            get
        },
    },
];

/// Parse `eblob.<id>.disk.stat_commit.errors.<errno>` stat names.
fn parse_stat_commit_key(key: &str) -> Option<(u64, u64)> {
    let rest = key.strip_prefix("eblob.")?;
    let (id, rest) = rest.split_once('.')?;
    let err = rest.strip_prefix("disk.stat_commit.errors.")?;
    Some((id.parse().ok()?, err.parse().ok()?))
}

/// Streaming extractor for monitor stat JSON.
///
/// Feed it to [`sax::walk`](super::sax::walk) or use [`StatsParser::parse`].
pub struct StatsParser {
    depth: usize,
    keys: u64,
    stack: Vec<u64>,
    data: ParserData,
    backend_stats: Vec<BackendStat>,
    rofs_errors: BTreeMap<u64, u64>,
}

impl Default for StatsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            depth: 0,
            keys: ROOT,
            stack: Vec::with_capacity(16),
            data: ParserData::default(),
            backend_stats: Vec::new(),
            rofs_errors: BTreeMap::new(),
        }
    }

    /// Parse a complete monitor response.
    pub fn parse(data: &[u8]) -> Result<ParsedStats, serde_json::Error> {
        let mut parser = Self::new();
        super::sax::walk(data, &mut parser)?;
        Ok(parser.finish())
    }

    #[must_use]
    pub fn finish(self) -> ParsedStats {
        ParsedStats {
            node: self.data.node,
            backends: self.backend_stats,
            rofs_errors: self.rofs_errors,
        }
    }

    fn base(&self) -> u64 {
        self.stack.last().copied().unwrap_or(ROOT)
    }

    fn record_mismatch(&mut self, got: &str) {
        warn!(
            path_mask = format_args!("{:#x}", self.keys),
            got, "monitor stat value has unexpected type, field left at default"
        );
        if self.keys & (BACKENDS | BACKEND_FOLDER) == BACKENDS | BACKEND_FOLDER {
            self.data.backend.malformed = true;
        }
    }
}

impl JsonSink for StatsParser {
    fn start_object(&mut self) {
        self.stack.push(self.keys);
        self.depth += 1;
    }

    fn end_object(&mut self) {
        self.keys = self.stack.pop().unwrap_or(ROOT);

        if self.keys == BACKENDS | BACKEND_FOLDER | ROOT && self.depth == 3 {
            let stat = std::mem::take(&mut self.data.backend);
            self.backend_stats.push(stat);
        } else if self.keys == STATS | STAT_NAME | ROOT && self.depth == 3 {
            if self.data.stat_commit.err == EROFS {
                self.rofs_errors
                    .insert(self.data.stat_commit.backend, self.data.stat_commit.count);
            }
            self.data.stat_commit = StatCommitStat::default();
        }

        self.depth = self.depth.saturating_sub(1);
    }

    fn start_array(&mut self) {
        self.stack.push(self.keys);
    }

    fn end_array(&mut self) {
        self.keys = self.stack.pop().unwrap_or(ROOT);
    }

    fn key(&mut self, key: &str) {
        let base = self.base();
        let mut next = base;

        if self.depth > 0 {
            if let Some(rows) = FOLDERS.get(self.depth - 1) {
                for row in rows.iter() {
                    if base & row.parent == row.parent && row.matcher.matches(key) {
                        next = base | row.bit;
                        break;
                    }
                }
            }
        }
        self.keys = next;

        // per-backend stat_commit error counters are keyed by a dotted path
        if self.keys == STATS | STAT_NAME | ROOT && self.depth == 2 {
            if let Some((id, err)) = parse_stat_commit_key(key) {
                self.data.stat_commit.backend = id;
                self.data.stat_commit.err = err;
            }
        }
    }

    fn uint(&mut self, value: u64) {
        let keys = self.keys;
        if let Some(row) = UINT_ROWS.iter().find(|r| r.keys | ROOT == keys) {
            let field = (row.field)(&mut self.data);
            match row.op {
                Op::Set => *field = value,
                Op::Sum => *field = field.wrapping_add(value),
                Op::Max => *field = (*field).max(value),
            }
        } else if STRING_ROWS.iter().any(|r| r.keys | ROOT == keys) {
            self.record_mismatch("number");
        }
        self.keys = self.base();
    }

    fn string(&mut self, value: &str) {
        let keys = self.keys;
        if let Some(row) = STRING_ROWS.iter().find(|r| r.keys | ROOT == keys) {
            *(row.field)(&mut self.data) = value.to_string();
        } else if UINT_ROWS.iter().any(|r| r.keys | ROOT == keys) {
            self.record_mismatch("string");
        }
        self.keys = self.base();
    }
}
