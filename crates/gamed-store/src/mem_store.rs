use crate::{GrainStore, StoreResult};
use gamed_types::GrainAddress;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

/// In-memory store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemStore {
    entries: Arc<RwLock<HashMap<GrainAddress, Vec<u8>>>>,
}

impl fmt::Debug for MemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, address: &GrainAddress) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(address)
    }
}

impl GrainStore for MemStore {
    fn save_bytes(&self, address: &GrainAddress, bytes: &[u8]) -> StoreResult<()> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(*address, bytes.to_vec());
        Ok(())
    }

    fn load_bytes(&self, address: &GrainAddress) -> StoreResult<Option<Vec<u8>>> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(address).cloned())
    }

    fn remove(&self, address: &GrainAddress) -> StoreResult<()> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GrainStoreExt;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    #[test]
    fn missing_entry_loads_as_none() {
        let store = MemStore::new();
        let addr = GrainAddress::inventory(Uuid::new_v4());
        let loaded: Option<BTreeMap<String, u64>> = store.load(&addr).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn save_overwrites_previous_state() {
        let store = MemStore::new();
        let addr = GrainAddress::inventory(Uuid::new_v4());
        store
            .save(&addr, &BTreeMap::from([("wood".to_string(), 100u64)]))
            .expect("save");
        store
            .save(&addr, &BTreeMap::from([("wood".to_string(), 70u64)]))
            .expect("save");
        let loaded: BTreeMap<String, u64> = store.load(&addr).expect("load").expect("present");
        assert_eq!(loaded.get("wood"), Some(&70));
        assert_eq!(store.len(), 1);

        store.remove(&addr).expect("remove");
        assert!(!store.contains(&addr));
    }

    #[test]
    fn clones_share_entries() {
        let store = MemStore::new();
        let other = store.clone();
        let addr = GrainAddress::scheduler(Uuid::new_v4());
        store.save(&addr, &vec![1u8, 2, 3]).expect("save");
        assert!(other.contains(&addr));
    }
}
