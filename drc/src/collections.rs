//! Enumerable set and map with stable, swap-remove enumeration order.
//!
//! Registry keys and authorized consumers must be listable, so plain hash
//! containers are paired with a dense vector. Removal swaps the last element
//! into the freed slot, the same order an on-chain enumerable set produces.

use std::collections::HashMap;
use std::hash::Hash;

/// Insertion-ordered set with O(1) insert, remove and membership tests.
#[derive(Debug, Clone)]
pub struct EnumerableSet<T> {
    values: Vec<T>,
    positions: HashMap<T, usize>,
}

impl<T> Default for EnumerableSet<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> EnumerableSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value`; returns `false` if it was already present.
    pub fn insert(&mut self, value: T) -> bool {
        if self.positions.contains_key(&value) {
            return false;
        }
        self.positions.insert(value, self.values.len());
        self.values.push(value);
        true
    }

    /// Removes `value`; returns `false` if it was not present.
    pub fn remove(&mut self, value: &T) -> bool {
        let Some(index) = self.positions.remove(value) else {
            return false;
        };
        self.values.swap_remove(index);
        if let Some(moved) = self.values.get(index) {
            self.positions.insert(*moved, index);
        }
        true
    }

    /// Returns `true` if `value` is a member.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.positions.contains_key(value)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Members in enumeration order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

/// Map whose keys enumerate like an [`EnumerableSet`].
#[derive(Debug, Clone)]
pub struct EnumerableMap<K, V> {
    keys: EnumerableSet<K>,
    entries: HashMap<K, V>,
}

impl<K, V> Default for EnumerableMap<K, V> {
    fn default() -> Self {
        Self {
            keys: EnumerableSet::default(),
            entries: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash, V> EnumerableMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value under `key`, returning the previous one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.keys.insert(key);
        self.entries.insert(key, value)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.keys.remove(key);
        Some(value)
    }

    /// Value under `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Mutable value under `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in enumeration order.
    #[must_use]
    pub fn keys(&self) -> &[K] {
        self.keys.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_swap_remove_order() {
        let mut set = EnumerableSet::new();
        assert!(set.insert(1));
        assert!(set.insert(2));
        assert!(set.insert(3));
        assert!(!set.insert(2));
        assert!(set.remove(&1));
        assert_eq!(set.as_slice(), &[3, 2]);
        assert!(!set.remove(&1));
        assert!(set.contains(&3));
        assert!(set.remove(&3));
        assert!(set.remove(&2));
        assert!(set.is_empty());
    }

    #[test]
    fn test_map_keys_follow_set() {
        let mut map = EnumerableMap::new();
        map.insert('a', 1);
        map.insert('b', 2);
        assert_eq!(map.insert('a', 10), Some(1));
        assert_eq!(map.keys(), &['a', 'b']);
        assert_eq!(map.remove(&'a'), Some(10));
        assert_eq!(map.keys(), &['b']);
        assert_eq!(map.remove(&'a'), None);
        assert_eq!(map.get(&'b'), Some(&2));
        assert_eq!(map.len(), 1);
    }
}
