//! Snapshot filters
//!
//! A filter is a set of sorted id lists, one per entity kind, parsed from
//! request JSON. Sorting at parse time makes every membership test during
//! snapshot matching a binary search. The `item_types` mask records which
//! keys were present in the request, so an absent array means "no
//! restriction" while an explicitly empty one means "match none".

use serde::Deserialize;
use thiserror::Error;

/// Entity kinds a filter can restrict, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemTypes(u32);

impl ItemTypes {
    pub const GROUP: Self = Self(0x01);
    pub const COUPLE: Self = Self(0x02);
    pub const NAMESPACE: Self = Self(0x04);
    pub const NODE: Self = Self(0x08);
    pub const BACKEND: Self = Self(0x10);
    pub const FS: Self = Self(0x20);

    pub const ALL: Self = Self(0x3F);

    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

#[derive(Debug, Error)]
#[error("Incorrect filter syntax")]
pub struct FilterParseError {
    #[source]
    source: serde_json::Error,
}

#[derive(Debug, Deserialize)]
struct FilterWire {
    groups: Option<Vec<u64>>,
    couples: Option<Vec<String>>,
    namespaces: Option<Vec<String>>,
    nodes: Option<Vec<String>>,
    backends: Option<Vec<String>>,
    filesystems: Option<Vec<String>>,
}

/// Parsed filter with sorted, deduplicated id lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub groups: Vec<u64>,
    pub couples: Vec<String>,
    pub namespaces: Vec<String>,
    pub nodes: Vec<String>,
    pub backends: Vec<String>,
    pub filesystems: Vec<String>,
    /// Kinds whose arrays appeared in the request
    pub item_types: ItemTypes,
}

fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort_unstable();
    items.dedup();
    items
}

impl Filter {
    /// Parse filter JSON. Unknown keys are ignored; any syntax or type
    /// error is reported as one "incorrect syntax" failure.
    pub fn from_json(data: &[u8]) -> Result<Self, FilterParseError> {
        let wire: FilterWire =
            serde_json::from_slice(data).map_err(|source| FilterParseError { source })?;

        let mut item_types = ItemTypes::default();
        let mut mark = |present: bool, kind: ItemTypes| {
            if present {
                item_types = item_types.with(kind);
            }
        };
        mark(wire.groups.is_some(), ItemTypes::GROUP);
        mark(wire.couples.is_some(), ItemTypes::COUPLE);
        mark(wire.namespaces.is_some(), ItemTypes::NAMESPACE);
        mark(wire.nodes.is_some(), ItemTypes::NODE);
        mark(wire.backends.is_some(), ItemTypes::BACKEND);
        mark(wire.filesystems.is_some(), ItemTypes::FS);

        Ok(Self {
            groups: sorted(wire.groups.unwrap_or_default()),
            couples: sorted(wire.couples.unwrap_or_default()),
            namespaces: sorted(wire.namespaces.unwrap_or_default()),
            nodes: sorted(wire.nodes.unwrap_or_default()),
            backends: sorted(wire.backends.unwrap_or_default()),
            filesystems: sorted(wire.filesystems.unwrap_or_default()),
            item_types,
        })
    }

    /// True when matching against `kind` is required: the caller requested
    /// the kind and the filter carries a non-empty list for it.
    #[must_use]
    pub fn restricts(&self, item_types: ItemTypes, kind: ItemTypes) -> bool {
        if !item_types.contains(kind) {
            return false;
        }
        let list_len = match kind {
            k if k == ItemTypes::GROUP => self.groups.len(),
            k if k == ItemTypes::COUPLE => self.couples.len(),
            k if k == ItemTypes::NAMESPACE => self.namespaces.len(),
            k if k == ItemTypes::NODE => self.nodes.len(),
            k if k == ItemTypes::BACKEND => self.backends.len(),
            k if k == ItemTypes::FS => self.filesystems.len(),
            _ => 0,
        };
        list_len > 0
    }

    #[must_use]
    pub fn has_group(&self, id: u64) -> bool {
        self.groups.binary_search(&id).is_ok()
    }

    #[must_use]
    pub fn has_couple(&self, key: &str) -> bool {
        self.couples.binary_search_by(|c| c.as_str().cmp(key)).is_ok()
    }

    #[must_use]
    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespaces
            .binary_search_by(|n| n.as_str().cmp(name))
            .is_ok()
    }

    #[must_use]
    pub fn has_node(&self, key: &str) -> bool {
        self.nodes.binary_search_by(|n| n.as_str().cmp(key)).is_ok()
    }

    #[must_use]
    pub fn has_backend(&self, key: &str) -> bool {
        self.backends
            .binary_search_by(|b| b.as_str().cmp(key))
            .is_ok()
    }

    #[must_use]
    pub fn has_filesystem(&self, key: &str) -> bool {
        self.filesystems
            .binary_search_by(|f| f.as_str().cmp(key))
            .is_ok()
    }
}
