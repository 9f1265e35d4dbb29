// ── Device registry ──
//
// Bridge-wide map from device id to the one category that owns it.
// Controllers keep it current as they see Added and Deleted events.

use std::sync::Arc;

use dashmap::DashMap;

use crate::category::CategoryKind;

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    owners: Arc<DashMap<String, CategoryKind>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, device_id: &str, kind: CategoryKind) {
        self.owners.insert(device_id.to_owned(), kind);
    }

    /// Drop the mapping only if `kind` still owns the id.
    pub(crate) fn remove(&self, device_id: &str, kind: CategoryKind) {
        self.owners.remove_if(device_id, |_, owner| *owner == kind);
    }

    pub fn owner(&self, device_id: &str) -> Option<CategoryKind> {
        self.owners.get(device_id).map(|r| *r.value())
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.owners.contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// `(id, owner)` pairs sorted by id.
    pub fn entries(&self) -> Vec<(String, CategoryKind)> {
        let mut entries: Vec<_> = self
            .owners
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_respects_owner() {
        let registry = DeviceRegistry::new();
        registry.add("d1", CategoryKind::Light);
        registry.remove("d1", CategoryKind::Fan);
        assert_eq!(registry.owner("d1"), Some(CategoryKind::Light));

        registry.remove("d1", CategoryKind::Light);
        assert!(!registry.contains("d1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn entries_are_sorted() {
        let registry = DeviceRegistry::new();
        registry.add("b", CategoryKind::Switch);
        registry.add("a", CategoryKind::Valve);
        assert_eq!(
            registry.entries(),
            vec![
                ("a".to_owned(), CategoryKind::Valve),
                ("b".to_owned(), CategoryKind::Switch)
            ]
        );
    }
}
