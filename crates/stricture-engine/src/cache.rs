//! Parsed-IR cache keyed by content hash.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use stricture_kernel::ModuleIr;

/// `sha256(front end language, module path, file bytes)` as lowercase hex.
pub fn content_key(language: &str, module_path: &str, source: &str) -> String {
    let mut digest = Sha256::new();
    digest.update(language.as_bytes());
    digest.update([0]);
    digest.update(module_path.as_bytes());
    digest.update([0]);
    digest.update(source.as_bytes());
    format!("{:x}", digest.finalize())
}

/// In-memory, shared across runs of one analyzer. Parse failures are never
/// cached.
#[derive(Debug, Default)]
pub struct IrCache {
    entries: Mutex<HashMap<String, Arc<ModuleIr>>>,
}

impl IrCache {
    pub fn get(&self, key: &str) -> Option<Arc<ModuleIr>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: String, module: Arc<ModuleIr>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, module);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
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

    #[test]
    fn key_changes_with_content_and_path() {
        let a = content_key("ir-json", "src/a.ts", "{}");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_key("ir-json", "src/a.ts", "{}"));
        assert_ne!(a, content_key("ir-json", "src/b.ts", "{}"));
        assert_ne!(a, content_key("ir-json", "src/a.ts", "{ }"));
    }

    #[test]
    fn cache_round_trips_modules() {
        let cache = IrCache::default();
        assert!(cache.is_empty());
        let key = content_key("ir-json", "src/a.ts", "{}");
        cache.insert(key.clone(), Arc::new(ModuleIr::new("src/a.ts", "typescript")));
        assert_eq!(cache.get(&key).map(|m| m.path.clone()), Some("src/a.ts".into()));
        assert!(cache.get("missing").is_none());
    }
}
