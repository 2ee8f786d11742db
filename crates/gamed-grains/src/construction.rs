use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::lock;

/// Completed structures per blueprint. Counts only ever grow.
#[derive(Debug, Default)]
pub struct ConstructionStore {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl ConstructionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&self, blueprint: &str) {
        let mut counts = lock(&self.counts);
        *counts.entry(blueprint.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, blueprint: &str) -> u64 {
        lock(&self.counts).get(blueprint).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> BTreeMap<String, u64> {
        lock(&self.counts).clone()
    }

    pub(crate) fn reset(&self, counts: BTreeMap<String, u64>) {
        *lock(&self.counts) = counts;
    }
}
