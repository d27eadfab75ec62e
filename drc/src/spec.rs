//! Spec records: the pricing and configuration of one operator job.
//!
//! A [`Spec`] is addressed by a [`SpecKey`], the `keccak256` hash of the
//! operator address packed with the 32-byte job identifier. The derivation is
//! the `abi.encodePacked(operator, specId)` layout so that off-chain tooling can
//! reproduce keys without talking to the coordinator:
//!
//! ```rust
//! use alloy_primitives::{Address, B256, keccak256};
//! use drc::spec::spec_key;
//!
//! let operator = Address::repeat_byte(0x11);
//! let spec_id = B256::repeat_byte(0x22);
//! let mut packed = [0u8; 52];
//! packed[..20].copy_from_slice(operator.as_slice());
//! packed[20..].copy_from_slice(spec_id.as_slice());
//! assert_eq!(spec_key(operator, spec_id), keccak256(packed));
//! ```

use alloy_primitives::{Address, B256, U256, keccak256};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::fmt;

use crate::host::CodeInspector;

/// Key of a [`Spec`] in the registry: `keccak256(operator ‖ spec_id)`.
pub type SpecKey = B256;

/// One "permyriad" unit: proportional amounts are expressed in 1/10000ths.
pub const PERMYRIAD: u64 = 10_000;

/// Smallest callback gas limit a Spec (or a request) may declare.
pub const MIN_REQUEST_GAS_LIMIT: u64 = 400_000;

/// Largest block-confirmation depth a Spec may require.
pub const MAX_REQUEST_CONFIRMATIONS: u8 = 200;

/// Derives the registry key of the Spec served by `operator` under `spec_id`.
#[must_use]
pub fn spec_key(operator: Address, spec_id: B256) -> SpecKey {
    let mut packed = [0u8; 52];
    packed[..20].copy_from_slice(operator.as_slice());
    packed[20..].copy_from_slice(spec_id.as_slice());
    keccak256(packed)
}

/// How a fee (or operator payment) magnitude is interpreted.
///
/// Serialized as `"FLAT"` / `"PERMYRIAD"`. Pricing files written against an
/// older revision spell the proportional mode `"PERMIRYAD"`; that spelling is
/// accepted on input and normalized on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeType {
    /// A fixed amount of payment-token units.
    Flat,
    /// Parts-per-ten-thousand of the base amount.
    #[serde(alias = "PERMIRYAD")]
    Permyriad,
}

/// How the operator's payment is interpreted; same encoding as [`FeeType`].
pub type PaymentType = FeeType;

impl FeeType {
    /// Upper bound for a magnitude of this type.
    ///
    /// Flat amounts are bounded by the payment token's total supply, proportional
    /// amounts by one whole (10 000 permyriad).
    #[must_use]
    pub fn limit(self, total_supply: U256) -> U256 {
        match self {
            Self::Flat => total_supply,
            Self::Permyriad => U256::from(PERMYRIAD),
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => f.write_str("FLAT"),
            Self::Permyriad => f.write_str("PERMYRIAD"),
        }
    }
}

/// Pricing and configuration record for requests to one operator job.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    /// 32-byte job identifier on the operator's node.
    pub spec_id: B256,
    /// Operator contract that receives the forwarded requests.
    pub operator: Address,
    /// Operator payment: flat amount or permyriad of the maximum payment.
    #[serde_as(as = "DisplayFromStr")]
    pub payment: U256,
    /// Interpretation of [`Spec::payment`].
    pub payment_type: PaymentType,
    /// Coordinator fee: flat amount or permyriad of the gas cost.
    #[serde_as(as = "DisplayFromStr")]
    pub fee: U256,
    /// Interpretation of [`Spec::fee`].
    pub fee_type: FeeType,
    /// Upper bound on the consumer callback's gas.
    pub gas_limit: u64,
    /// Minimum block confirmations the operator waits before fulfilling.
    pub min_confirmations: u8,
}

impl Spec {
    /// Returns the registry key of this Spec.
    #[must_use]
    pub fn key(&self) -> SpecKey {
        spec_key(self.operator, self.spec_id)
    }

    /// Checks every field invariant of a storable Spec.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a [`SpecError`].
    pub fn validate<I>(
        &self,
        inspector: &I,
        coordinator: Address,
        total_supply: U256,
    ) -> Result<(), SpecError>
    where
        I: CodeInspector + ?Sized,
    {
        if self.spec_id.is_zero() {
            return Err(SpecError::SpecIdIsZero);
        }
        if self.operator == coordinator {
            return Err(SpecError::OperatorIsCoordinator(self.operator));
        }
        if !inspector.is_contract(&self.operator) {
            return Err(SpecError::OperatorIsNotContract(self.operator));
        }
        if self.gas_limit < MIN_REQUEST_GAS_LIMIT {
            return Err(SpecError::GasLimitIsLtMinimum {
                gas_limit: self.gas_limit,
                minimum: MIN_REQUEST_GAS_LIMIT,
            });
        }
        if self.min_confirmations > MAX_REQUEST_CONFIRMATIONS {
            return Err(SpecError::MinConfirmationsIsGtMaximum {
                min_confirmations: self.min_confirmations,
                maximum: MAX_REQUEST_CONFIRMATIONS,
            });
        }
        let fee_limit = self.fee_type.limit(total_supply);
        if self.fee > fee_limit {
            return Err(SpecError::FeeOutOfRange {
                fee_type: self.fee_type,
                fee: self.fee,
                limit: fee_limit,
            });
        }
        let payment_limit = self.payment_type.limit(total_supply);
        if self.payment > payment_limit {
            return Err(SpecError::PaymentOutOfRange {
                payment_type: self.payment_type,
                payment: self.payment,
                limit: payment_limit,
            });
        }
        Ok(())
    }
}

/// A Spec field violates a registry invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// The job identifier is all zeroes.
    #[error("spec id is zero")]
    SpecIdIsZero,
    /// The operator address has no deployed code.
    #[error("operator {0} is not a contract")]
    OperatorIsNotContract(Address),
    /// The operator address is the coordinator itself.
    #[error("operator {0} is the coordinator")]
    OperatorIsCoordinator(Address),
    /// The callback gas limit is below the protocol minimum.
    #[error("gas limit {gas_limit} is below the minimum {minimum}")]
    GasLimitIsLtMinimum {
        /// Declared gas limit.
        gas_limit: u64,
        /// Protocol minimum.
        minimum: u64,
    },
    /// The confirmation depth exceeds the protocol maximum.
    #[error("min confirmations {min_confirmations} exceed the maximum {maximum}")]
    MinConfirmationsIsGtMaximum {
        /// Declared confirmation depth.
        min_confirmations: u8,
        /// Protocol maximum.
        maximum: u8,
    },
    /// The fee magnitude exceeds the bound of its type.
    #[error("{fee_type} fee {fee} exceeds {limit}")]
    FeeOutOfRange {
        /// Fee interpretation.
        fee_type: FeeType,
        /// Declared fee.
        fee: U256,
        /// Bound for the fee type.
        limit: U256,
    },
    /// The payment magnitude exceeds the bound of its type.
    #[error("{payment_type} payment {payment} exceeds {limit}")]
    PaymentOutOfRange {
        /// Payment interpretation.
        payment_type: PaymentType,
        /// Declared payment.
        payment: U256,
        /// Bound for the payment type.
        limit: U256,
    },
    /// The key a Spec was submitted under is not the key derived from it.
    #[error("key {key} does not match the derived spec key {expected}")]
    KeyMismatch {
        /// Key supplied by the caller.
        key: SpecKey,
        /// `keccak256(operator ‖ spec_id)`.
        expected: SpecKey,
    },
}
