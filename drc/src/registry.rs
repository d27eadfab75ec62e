//! Enumerable store of [`Spec`] records.

use std::collections::HashSet;

use alloy_primitives::{Address, U256};

use crate::collections::EnumerableMap;
use crate::host::CodeInspector;
use crate::spec::{Spec, SpecError, SpecKey};

/// Environment a Spec is validated against.
#[derive(Debug, Clone, Copy)]
pub struct SpecValidator<'a, I: ?Sized> {
    /// Answers whether the operator is a deployed contract.
    pub inspector: &'a I,
    /// The coordinator, which may not be its own operator.
    pub coordinator: Address,
    /// Payment-token supply bounding flat magnitudes.
    pub total_supply: U256,
}

impl<I: CodeInspector + ?Sized> SpecValidator<'_, I> {
    /// Validates `spec` and checks that `key` is its derived key.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Spec`] carrying the violated invariant.
    pub fn check(&self, key: SpecKey, spec: &Spec) -> Result<(), RegistryError> {
        let expected = spec.key();
        if key != expected {
            return Err(RegistryError::Spec {
                key,
                source: SpecError::KeyMismatch { key, expected },
            });
        }
        spec.validate(self.inspector, self.coordinator, self.total_supply)
            .map_err(|source| RegistryError::Spec { key, source })
    }
}

/// Spec records keyed by `keccak256(operator ‖ spec_id)`.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: EnumerableMap<SpecKey, Spec>,
}

impl SpecRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the Spec under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Spec`] if the Spec is invalid or `key` is not
    /// its derived key.
    pub fn upsert<I>(
        &mut self,
        validator: &SpecValidator<'_, I>,
        key: SpecKey,
        spec: Spec,
    ) -> Result<(), RegistryError>
    where
        I: CodeInspector + ?Sized,
    {
        validator.check(key, &spec)?;
        self.specs.insert(key, spec);
        Ok(())
    }

    /// Inserts or replaces several Specs; nothing is written unless all are valid.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyArray`],
    /// [`RegistryError::ArrayLengthsMismatch`] or the first invalid Spec.
    pub fn upsert_many<I>(
        &mut self,
        validator: &SpecValidator<'_, I>,
        keys: &[SpecKey],
        specs: &[Spec],
    ) -> Result<(), RegistryError>
    where
        I: CodeInspector + ?Sized,
    {
        ensure_batch(keys.len(), specs.len())?;
        for (key, spec) in keys.iter().zip(specs) {
            validator.check(*key, spec)?;
        }
        for (key, spec) in keys.iter().zip(specs) {
            self.specs.insert(*key, *spec);
        }
        Ok(())
    }

    /// Removes and returns the Spec under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SpecIsNotInserted`] if `key` is unknown.
    pub fn remove(&mut self, key: SpecKey) -> Result<Spec, RegistryError> {
        self.specs
            .remove(&key)
            .ok_or(RegistryError::SpecIsNotInserted(key))
    }

    /// Fails unless every key is present exactly once, so that removing all of
    /// them cannot fail halfway.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyArray`] or the first missing key.
    pub fn ensure_removable(&self, keys: &[SpecKey]) -> Result<(), RegistryError> {
        if keys.is_empty() {
            return Err(RegistryError::EmptyArray);
        }
        let mut seen = HashSet::with_capacity(keys.len());
        for key in keys {
            if !self.specs.contains_key(key) || !seen.insert(*key) {
                return Err(RegistryError::SpecIsNotInserted(*key));
            }
        }
        Ok(())
    }

    /// Spec under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SpecIsNotInserted`] if `key` is unknown.
    pub fn get(&self, key: SpecKey) -> Result<&Spec, RegistryError> {
        self.specs
            .get(&key)
            .ok_or(RegistryError::SpecIsNotInserted(key))
    }

    /// Returns `true` if a Spec is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: SpecKey) -> bool {
        self.specs.contains_key(&key)
    }

    /// All keys, in enumeration order.
    #[must_use]
    pub fn keys(&self) -> &[SpecKey] {
        self.specs.keys()
    }

    /// Number of stored Specs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns `true` if no Spec is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

pub(crate) const fn ensure_batch(left: usize, right: usize) -> Result<(), RegistryError> {
    if left == 0 {
        return Err(RegistryError::EmptyArray);
    }
    if left != right {
        return Err(RegistryError::ArrayLengthsMismatch { left, right });
    }
    Ok(())
}

/// Errors of the Spec registry and the authorization table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No Spec is stored under the key.
    #[error("spec {0} is not inserted")]
    SpecIsNotInserted(SpecKey),
    /// A batch operation received no items.
    #[error("empty array")]
    EmptyArray,
    /// Paired batch arguments differ in length.
    #[error("array lengths mismatch: {left} != {right}")]
    ArrayLengthsMismatch {
        /// Length of the first argument.
        left: usize,
        /// Length of the second argument.
        right: usize,
    },
    /// A Spec failed validation.
    #[error("invalid spec {key}: {source}")]
    Spec {
        /// Key the Spec was submitted under.
        key: SpecKey,
        /// Violated invariant.
        source: SpecError,
    },
    /// The address is not in the Spec's consumer set.
    #[error("consumer {consumer} is not authorized for spec {key}")]
    ConsumerIsNotAuthorized {
        /// Spec key.
        key: SpecKey,
        /// Address that was to be removed.
        consumer: Address,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FeeType;
    use alloy_primitives::{B256, address};

    const COORDINATOR: Address = address!("0x00000000000000000000000000000000000000c0");
    const OPERATOR: Address = address!("0x00000000000000000000000000000000000000a1");

    struct AllContracts;

    impl CodeInspector for AllContracts {
        fn is_contract(&self, _address: &Address) -> bool {
            true
        }
    }

    fn validator() -> SpecValidator<'static, AllContracts> {
        SpecValidator {
            inspector: &AllContracts,
            coordinator: COORDINATOR,
            total_supply: U256::MAX,
        }
    }

    fn spec(id: u8) -> Spec {
        Spec {
            spec_id: B256::repeat_byte(id),
            operator: OPERATOR,
            payment: U256::from(1_000u64),
            payment_type: FeeType::Flat,
            fee: U256::from(100u64),
            fee_type: FeeType::Permyriad,
            gas_limit: 500_000,
            min_confirmations: 1,
        }
    }

    #[test]
    fn test_set_get_remove_round_trip() {
        let mut registry = SpecRegistry::new();
        let s = spec(1);
        registry.upsert(&validator(), s.key(), s).unwrap();
        assert_eq!(registry.get(s.key()).unwrap(), &s);
        assert_eq!(registry.keys(), &[s.key()]);

        let updated = Spec {
            gas_limit: 600_000,
            ..s
        };
        registry.upsert(&validator(), s.key(), updated).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(s.key()).unwrap().gas_limit, 600_000);

        assert_eq!(registry.remove(s.key()).unwrap(), updated);
        assert_eq!(
            registry.get(s.key()),
            Err(RegistryError::SpecIsNotInserted(s.key()))
        );
        assert_eq!(
            registry.remove(s.key()),
            Err(RegistryError::SpecIsNotInserted(s.key()))
        );
    }

    #[test]
    fn test_upsert_rejects_foreign_key() {
        let mut registry = SpecRegistry::new();
        let s = spec(1);
        let wrong = spec(2).key();
        assert!(matches!(
            registry.upsert(&validator(), wrong, s),
            Err(RegistryError::Spec {
                source: SpecError::KeyMismatch { .. },
                ..
            })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_many_is_all_or_nothing() {
        let mut registry = SpecRegistry::new();
        let good = spec(1);
        let bad = Spec {
            gas_limit: 1,
            ..spec(2)
        };
        assert_eq!(
            registry.upsert_many(&validator(), &[good.key()], &[good, bad]),
            Err(RegistryError::ArrayLengthsMismatch { left: 1, right: 2 })
        );
        assert_eq!(
            registry.upsert_many(&validator(), &[], &[]),
            Err(RegistryError::EmptyArray)
        );
        assert!(
            registry
                .upsert_many(&validator(), &[good.key(), bad.key()], &[good, bad])
                .is_err()
        );
        assert!(registry.is_empty());

        let other = spec(3);
        registry
            .upsert_many(&validator(), &[good.key(), other.key()], &[good, other])
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ensure_removable_rejects_duplicates() {
        let mut registry = SpecRegistry::new();
        let s = spec(1);
        registry.upsert(&validator(), s.key(), s).unwrap();
        assert_eq!(registry.ensure_removable(&[s.key()]), Ok(()));
        assert_eq!(
            registry.ensure_removable(&[s.key(), s.key()]),
            Err(RegistryError::SpecIsNotInserted(s.key()))
        );
        assert_eq!(registry.ensure_removable(&[]), Err(RegistryError::EmptyArray));
    }
}
