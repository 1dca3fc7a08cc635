use schemport_format::StructureFormat;
use schemport_model::Schematic;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Everything kept per structure: the untouched upload, which format it was,
/// and the canonical model parsed from it.
#[derive(Debug, Clone)]
pub struct CachedStructure {
    pub raw: Vec<u8>,
    pub format: StructureFormat,
    pub model: Schematic,
}

/// Keyed store of parsed structures, injected into the gateway by whoever
/// owns structure lifetimes. Entries are `Arc`'d so readers always observe a
/// fully-committed value; writes are last-write-wins per key.
#[derive(Clone, Default)]
pub struct StructureCache {
    entries: Arc<RwLock<HashMap<String, Arc<CachedStructure>>>>,
}

impl StructureCache {
    pub fn new() -> Self {
        StructureCache::default()
    }

    pub fn insert(&self, structure_id: &str, entry: CachedStructure) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(structure_id.to_string(), Arc::new(entry));
    }

    pub fn get(&self, structure_id: &str) -> Option<Arc<CachedStructure>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(structure_id)
            .cloned()
    }

    /// Eviction hook for the owning record's delete path.
    pub fn remove(&self, structure_id: &str) -> Option<Arc<CachedStructure>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(structure_id)
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemport_common::Dimensions;
    use schemport_model::BlockState;

    fn entry(marker: u8) -> CachedStructure {
        CachedStructure {
            raw: vec![marker],
            format: StructureFormat::Schem,
            model: Schematic::new(
                Dimensions::new(1, 1, 1),
                vec![BlockState::new("minecraft:air")],
            ),
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let cache = StructureCache::new();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());

        cache.insert("a", entry(1));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().raw, vec![1]);

        assert!(cache.remove("a").is_some());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = StructureCache::new();
        cache.insert("a", entry(1));
        cache.insert("a", entry(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().raw, vec![2]);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let cache = StructureCache::new();
        cache.insert("a", entry(1));
        let held = cache.get("a").unwrap();
        cache.insert("a", entry(2));
        assert_eq!(held.raw, vec![1]);
        assert_eq!(cache.get("a").unwrap().raw, vec![2]);
    }
}
