//! Namespaces
//!
//! A namespace is a named bucket of couples. Couples may be added
//! concurrently while a merge is running, so the couple set sits behind
//! its own read-write lock.

use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::types::CoupleKey;

#[derive(Debug)]
pub struct Namespace {
    pub name: String,
    couples: RwLock<BTreeSet<CoupleKey>>,
}

impl Namespace {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            couples: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn add_couple(&self, couple: CoupleKey) {
        self.couples.write().expect("namespace lock").insert(couple);
    }

    #[must_use]
    pub fn couple_count(&self) -> usize {
        self.couples.read().expect("namespace lock").len()
    }

    #[must_use]
    pub fn couples(&self) -> Vec<CoupleKey> {
        self.couples
            .read()
            .expect("namespace lock")
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear_couples(&self) {
        self.couples.write().expect("namespace lock").clear();
    }

    #[must_use]
    pub fn contains_couple(&self, couple: &CoupleKey) -> bool {
        self.couples.read().expect("namespace lock").contains(couple)
    }
}

impl Clone for Namespace {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            couples: RwLock::new(self.couples.read().expect("namespace lock").clone()),
        }
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.couples() == other.couples()
    }
}
