//! Name-keyed registry shared by the connection manager and schema catalog.

use std::collections::HashMap;

use parking_lot::RwLock;

/// A thread-safe map from connection name to a value.
///
/// Values are cloned out on lookup, so `V` is expected to be cheap to clone
/// (an `Arc` or a handle wrapping one). No lock is held after a call returns.
pub struct Registry<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone> Registry<V> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert(&self, name: impl Into<String>, value: V) -> Option<V> {
        self.entries.write().insert(name.into(), value)
    }

    /// Looks up a value.
    pub fn get(&self, name: &str) -> Option<V> {
        self.entries.read().get(name).cloned()
    }

    /// Removes a value.
    pub fn remove(&self, name: &str) -> Option<V> {
        self.entries.write().remove(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes and returns every entry.
    pub fn drain(&self) -> Vec<(String, V)> {
        self.entries.write().drain().collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for Registry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces() {
        let registry = Registry::new();
        assert_eq!(registry.insert("a", 1), None);
        assert_eq!(registry.insert("a", 2), Some(1));
        assert_eq!(registry.get("a"), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let registry = Registry::new();
        registry.insert("zeta", ());
        registry.insert("alpha", ());
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_remove_and_drain() {
        let registry = Registry::new();
        registry.insert("a", 1);
        registry.insert("b", 2);
        assert_eq!(registry.remove("a"), Some(1));
        assert!(registry.get("a").is_none());

        let drained = registry.drain();
        assert_eq!(drained, vec![("b".to_string(), 2)]);
        assert!(registry.is_empty());
    }
}
