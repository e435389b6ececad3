use foldhash::HashMap;
use parking_lot::RwLock;
use std::{hash::Hash, sync::Arc};

/// A table of shadow states keyed by Vulkan handle.
///
/// Lookups clone the `Arc` out of the table, so a state stays alive for as long as someone holds
/// on to it even after its handle has been removed.
#[derive(Debug)]
pub(crate) struct ObjectMap<K, V> {
    inner: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for ObjectMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ObjectMap<K, V> {
    pub(crate) fn new() -> Self {
        ObjectMap {
            inner: RwLock::new(HashMap::default()),
        }
    }
}

impl<K, V> ObjectMap<K, V>
where
    K: Copy + Eq + Hash,
{
    /// Returns the state for `key`, if it is tracked.
    pub(crate) fn get(&self, key: K) -> Option<Arc<V>> {
        self.inner.read().get(&key).cloned()
    }

    /// Starts tracking `value` under `key`, replacing any previous state.
    pub(crate) fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.inner.write().insert(key, value.clone());

        value
    }

    pub(crate) fn remove(&self, key: K) -> Option<Arc<V>> {
        self.inner.write().remove(&key)
    }

    /// Removes every state for which `f` returns `true`.
    pub(crate) fn remove_if(&self, mut f: impl FnMut(&V) -> bool) {
        self.inner.write().retain(|_, value| !f(value));
    }

    /// Returns the states for which `f` returns `true`.
    pub(crate) fn filter(&self, mut f: impl FnMut(&V) -> bool) -> Vec<Arc<V>> {
        self.inner
            .read()
            .values()
            .filter(|value| f(value))
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_state_outlives_handle() {
        let map = ObjectMap::<u64, &str>::new();
        map.insert(1, "one");
        map.insert(2, "two");

        let held = map.get(1).unwrap();
        assert_eq!(map.remove(1).as_deref(), Some(&"one"));
        assert!(map.get(1).is_none());
        assert_eq!(*held, "one");

        map.remove_if(|value| *value == "two");
        assert_eq!(map.len(), 0);
    }
}
