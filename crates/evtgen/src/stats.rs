//! Per-node-kind generation counters.

use std::collections::BTreeMap;

use serde::Serialize;

/// How often a node kind was interpreted, and how often without error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeCounter {
    pub successful: u64,
    pub total: u64,
}

/// Counters keyed by node kind name (`"Conjunction"`, `"Sequence"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NodeStats {
    counters: BTreeMap<&'static str, NodeCounter>,
}

impl NodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: &'static str, ok: bool) {
        let counter = self.counters.entry(kind).or_default();
        counter.total += 1;
        if ok {
            counter.successful += 1;
        }
    }

    /// Counter for `kind`; zero if never seen.
    pub fn get(&self, kind: &str) -> NodeCounter {
        self.counters.get(kind).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, NodeCounter)> + '_ {
        self.counters.iter().map(|(k, v)| (*k, *v))
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }
}
