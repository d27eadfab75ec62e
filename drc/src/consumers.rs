//! Per-Spec allow-lists of requesting addresses.
//!
//! An empty list leaves the Spec public; once it holds at least one address
//! only members may request the Spec.

use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;

use crate::collections::EnumerableSet;
use crate::registry::{RegistryError, SpecRegistry, ensure_batch};
use crate::spec::SpecKey;

/// Enumerable consumer sets keyed by Spec key.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationTable {
    consumers: HashMap<SpecKey, EnumerableSet<Address>>,
}

impl AuthorizationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `consumers` to the set of `key`. Existing members are kept as-is.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SpecIsNotInserted`] or
    /// [`RegistryError::EmptyArray`].
    pub fn add(
        &mut self,
        registry: &SpecRegistry,
        key: SpecKey,
        consumers: &[Address],
    ) -> Result<(), RegistryError> {
        Self::ensure_addable(registry, key, consumers)?;
        self.insert_all(key, consumers);
        Ok(())
    }

    /// Batch form of [`AuthorizationTable::add`]; validates every pair first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ArrayLengthsMismatch`] in addition to the
    /// errors of [`AuthorizationTable::add`].
    pub fn add_many(
        &mut self,
        registry: &SpecRegistry,
        keys: &[SpecKey],
        lists: &[Vec<Address>],
    ) -> Result<(), RegistryError> {
        ensure_batch(keys.len(), lists.len())?;
        for (key, consumers) in keys.iter().zip(lists) {
            Self::ensure_addable(registry, *key, consumers)?;
        }
        for (key, consumers) in keys.iter().zip(lists) {
            self.insert_all(*key, consumers);
        }
        Ok(())
    }

    /// Removes `consumers` from the set of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ConsumerIsNotAuthorized`] naming the first
    /// address that is not a member, in addition to the errors of
    /// [`AuthorizationTable::add`].
    pub fn remove(
        &mut self,
        registry: &SpecRegistry,
        key: SpecKey,
        consumers: &[Address],
    ) -> Result<(), RegistryError> {
        self.ensure_removable(registry, key, consumers)?;
        self.remove_all(key, consumers);
        Ok(())
    }

    /// Batch form of [`AuthorizationTable::remove`]; validates every pair first.
    ///
    /// # Errors
    ///
    /// Same as [`AuthorizationTable::add_many`] and
    /// [`AuthorizationTable::remove`].
    pub fn remove_many(
        &mut self,
        registry: &SpecRegistry,
        keys: &[SpecKey],
        lists: &[Vec<Address>],
    ) -> Result<(), RegistryError> {
        ensure_batch(keys.len(), lists.len())?;
        let mut pending: HashMap<SpecKey, Vec<Address>> = HashMap::new();
        for (key, consumers) in keys.iter().zip(lists) {
            let batch = pending.entry(*key).or_default();
            batch.extend_from_slice(consumers);
            self.ensure_removable(registry, *key, batch)?;
        }
        for (key, consumers) in keys.iter().zip(lists) {
            self.remove_all(*key, consumers);
        }
        Ok(())
    }

    /// Drops the whole set of `key`, returning its former members.
    pub fn clear(&mut self, key: SpecKey) -> Vec<Address> {
        self.consumers
            .remove(&key)
            .map(|set| set.as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Members of the set of `key`, in enumeration order.
    #[must_use]
    pub fn list(&self, key: SpecKey) -> &[Address] {
        self.consumers
            .get(&key)
            .map(EnumerableSet::as_slice)
            .unwrap_or_default()
    }

    /// Returns `true` if `address` may request the Spec under `key`.
    #[must_use]
    pub fn is_authorized(&self, key: SpecKey, address: &Address) -> bool {
        self.consumers
            .get(&key)
            .is_none_or(|set| set.is_empty() || set.contains(address))
    }

    fn ensure_addable(
        registry: &SpecRegistry,
        key: SpecKey,
        consumers: &[Address],
    ) -> Result<(), RegistryError> {
        if !registry.contains(key) {
            return Err(RegistryError::SpecIsNotInserted(key));
        }
        if consumers.is_empty() {
            return Err(RegistryError::EmptyArray);
        }
        Ok(())
    }

    fn ensure_removable(
        &self,
        registry: &SpecRegistry,
        key: SpecKey,
        consumers: &[Address],
    ) -> Result<(), RegistryError> {
        Self::ensure_addable(registry, key, consumers)?;
        let mut seen = HashSet::with_capacity(consumers.len());
        for consumer in consumers {
            let member = self
                .consumers
                .get(&key)
                .is_some_and(|set| set.contains(consumer));
            if !member || !seen.insert(*consumer) {
                return Err(RegistryError::ConsumerIsNotAuthorized {
                    key,
                    consumer: *consumer,
                });
            }
        }
        Ok(())
    }

    fn insert_all(&mut self, key: SpecKey, consumers: &[Address]) {
        let set = self.consumers.entry(key).or_default();
        for consumer in consumers {
            set.insert(*consumer);
        }
    }

    fn remove_all(&mut self, key: SpecKey, consumers: &[Address]) {
        if let Some(set) = self.consumers.get_mut(&key) {
            for consumer in consumers {
                set.remove(consumer);
            }
            if set.is_empty() {
                self.consumers.remove(&key);
            }
        }
    }
}
