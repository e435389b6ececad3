use std::fmt;

/// A map backed by a vector, for the handful of entries a command buffer usually tracks per
/// render pass or per event. Iteration follows insertion order.
#[derive(Clone, PartialEq, Eq)]
pub struct LinearMap<K, V> {
    inner: Vec<(K, V)>,
}

impl<K, V> Default for LinearMap<K, V> {
    #[inline]
    fn default() -> Self {
        LinearMap::new()
    }
}

impl<K, V> LinearMap<K, V> {
    #[inline]
    pub const fn new() -> Self {
        LinearMap { inner: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter().map(|(k, v)| (k, v))
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.iter().map(|(k, _)| k)
    }

    #[inline]
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<K: Eq, V> LinearMap<K, V> {
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.iter().find_map(|(k, v)| (k == key).then_some(v))
    }

    #[inline]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner
            .iter_mut()
            .find_map(|(k, v)| (&*k == key).then_some(v))
    }

    /// Inserts `value`, replacing the value of an existing entry with the same key in place.
    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        match self.get_mut(&key) {
            Some(existing) => *existing = value,
            None => self.inner.push((key, value)),
        }
    }

    #[inline]
    pub fn get_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> &mut V {
        let index = match self.inner.iter().position(|(k, _)| k == &key) {
            Some(index) => index,
            None => {
                self.inner.push((key, f()));
                self.inner.len() - 1
            }
        };

        &mut self.inner[index].1
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.keys().any(|k| k == key)
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LinearMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut map = LinearMap::new();
        map.insert(3, "a");
        map.insert(1, "b");
        map.insert(3, "c");

        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().collect::<Vec<_>>(), [(&3, &"c"), (&1, &"b")]);

        *map.get_or_insert_with(1, || "x") = "d";
        *map.get_or_insert_with(5, || "e") = "f";
        assert_eq!(map.get(&1), Some(&"d"));
        assert_eq!(map.get(&5), Some(&"f"));
        assert!(!map.contains_key(&4));
    }
}
