//! Caller-facing error taxonomy of the coordinator.
//!
//! Each layer has its own error enum; [`CoordinatorError`] wraps them and adds
//! the failures only the coordinator can detect. [`CoordinatorError::kind`]
//! groups every variant into an [`ErrorKind`] for callers that only need the
//! category, such as an HTTP front end choosing a status code.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::dispatch::CallError;
use crate::feed::FeedError;
use crate::guard::GuardError;
use crate::host::HostError;
use crate::ledger::LedgerError;
use crate::pricing::PricingError;
use crate::registry::RegistryError;
use crate::spec::SpecKey;
use crate::timestamp::UnixTimestamp;

/// Error returned by every fallible coordinator entry point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// Registry or authorization-table failure.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Balance accounting failure.
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    /// Ownership, pause or reentrancy failure.
    #[error("{0}")]
    Guard(#[from] GuardError),

    /// Price feed failure.
    #[error("{0}")]
    Feed(#[from] FeedError),

    /// Payment arithmetic failure.
    #[error("{0}")]
    Pricing(#[from] PricingError),

    /// Host failure outside the ledger.
    #[error("{0}")]
    Host(#[from] HostError),

    /// The requester is not in the Spec's non-empty consumer set.
    #[error("caller {caller} is not authorized for spec {key} (operator {operator}, spec id {spec_id})")]
    CallerIsNotAuthorizedConsumer {
        /// Requesting account.
        caller: Address,
        /// Spec key.
        key: SpecKey,
        /// Operator of the Spec.
        operator: Address,
        /// Job identifier of the Spec.
        spec_id: B256,
    },

    /// Only the original requester may cancel.
    #[error("caller {caller} is not the requester of {request_id}")]
    CallerIsNotRequester {
        /// Calling account.
        caller: Address,
        /// Affected request.
        request_id: B256,
    },

    /// Only the request's operator may fulfill.
    #[error("caller {caller} is not the operator of {request_id}")]
    CallerIsNotOperator {
        /// Calling account.
        caller: Address,
        /// Affected request.
        request_id: B256,
    },

    /// The caller may not withdraw from the account.
    #[error("caller {caller} cannot withdraw for {from}")]
    CannotWithdrawFor {
        /// Calling account.
        caller: Address,
        /// Account that was to be debited.
        from: Address,
    },

    /// No pending request has the id.
    #[error("request {0} is not pending")]
    RequestIsNotPending(B256),

    /// The request has not expired yet.
    #[error("request {request_id} is cancellable from {expiration}, now is {now}")]
    RequestIsNotCancellable {
        /// Affected request.
        request_id: B256,
        /// Time from which cancellation is allowed.
        expiration: UnixTimestamp,
        /// Current time.
        now: UnixTimestamp,
    },

    /// The requested callback gas limit is outside `[minimum, maximum]`.
    #[error("gas limit {gas_limit} is outside [{minimum}, {maximum}]")]
    GasLimitIsNotValid {
        /// Requested gas limit.
        gas_limit: u64,
        /// Protocol minimum.
        minimum: u64,
        /// Spec maximum.
        maximum: u64,
    },

    /// More confirmations were requested than the Spec allows.
    #[error("min confirmations {requested} exceed the spec's {maximum}")]
    MinConfirmationsIsGtSpec {
        /// Requested confirmations.
        requested: u8,
        /// Spec maximum.
        maximum: u8,
    },

    /// The callback address has no deployed code.
    #[error("callback {0} is not a contract")]
    CallbackIsNotContract(Address),

    /// The callback address is the coordinator itself.
    #[error("callback {0} is the coordinator")]
    CallbackIsCoordinator(Address),

    /// The operator payment exceeds the request's maximum payment.
    #[error("operator payment {payment} exceeds max payment {max_payment}")]
    PaymentIsGtMaxPayment {
        /// Operator payment.
        payment: U256,
        /// Maximum payment.
        max_payment: U256,
    },

    /// The fallback rate may not be zero.
    #[error("fallback rate is zero")]
    FallbackRateIsZero,

    /// The callback could not be delivered. Only surfaced by the dispatcher's
    /// own callers; fulfillment records it as a failed callback instead.
    #[error("{0}")]
    Call(#[from] CallError),
}

/// Coarse category of a [`CoordinatorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    Validation,
    /// The caller lacks the required role.
    Authorization,
    /// A balance, allowance or token holding is short.
    Funds,
    /// The operation conflicts with the current protocol state.
    State,
    /// A referenced record does not exist.
    NotFound,
    /// The price feed could not produce a rate.
    Feed,
    /// An arithmetic bound was exceeded.
    Overflow,
    /// The environment failed.
    Host,
}

impl CoordinatorError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Registry(err) => match err {
                RegistryError::SpecIsNotInserted(_) => ErrorKind::NotFound,
                RegistryError::ConsumerIsNotAuthorized { .. } => ErrorKind::State,
                RegistryError::EmptyArray
                | RegistryError::ArrayLengthsMismatch { .. }
                | RegistryError::Spec { .. } => ErrorKind::Validation,
            },
            Self::Ledger(err) => match err {
                LedgerError::InsufficientAllowance { .. }
                | LedgerError::InsufficientTokenBalance { .. }
                | LedgerError::InsufficientBalance { .. } => ErrorKind::Funds,
                LedgerError::Overflow => ErrorKind::Overflow,
                LedgerError::Host(_) => ErrorKind::Host,
            },
            Self::Guard(err) => match err {
                GuardError::CallerIsNotOwner { .. } | GuardError::CallerIsNotPendingOwner(_) => {
                    ErrorKind::Authorization
                }
                GuardError::CannotTransferToSelf => ErrorKind::Validation,
                GuardError::Paused | GuardError::NotPaused | GuardError::ReentrantCall => {
                    ErrorKind::State
                }
            },
            Self::Feed(FeedError::Overflow) | Self::Pricing(PricingError::Overflow) => {
                ErrorKind::Overflow
            }
            Self::Feed(_) | Self::Pricing(PricingError::ZeroRate) => ErrorKind::Feed,
            Self::Host(_) | Self::Call(_) => ErrorKind::Host,
            Self::CallerIsNotAuthorizedConsumer { .. }
            | Self::CallerIsNotRequester { .. }
            | Self::CallerIsNotOperator { .. }
            | Self::CannotWithdrawFor { .. } => ErrorKind::Authorization,
            Self::RequestIsNotPending(_) => ErrorKind::NotFound,
            Self::RequestIsNotCancellable { .. } => ErrorKind::State,
            Self::GasLimitIsNotValid { .. }
            | Self::MinConfirmationsIsGtSpec { .. }
            | Self::CallbackIsNotContract(_)
            | Self::CallbackIsCoordinator(_)
            | Self::PaymentIsGtMaxPayment { .. }
            | Self::FallbackRateIsZero => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoordinatorError::from(GuardError::ReentrantCall).kind(),
            ErrorKind::State
        );
        assert_eq!(
            CoordinatorError::from(RegistryError::SpecIsNotInserted(B256::ZERO)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoordinatorError::from(LedgerError::InsufficientBalance {
                account: Address::ZERO,
                balance: U256::ZERO,
                required: U256::from(1u64),
            })
            .kind(),
            ErrorKind::Funds
        );
        assert_eq!(
            CoordinatorError::from(PricingError::Overflow).kind(),
            ErrorKind::Overflow
        );
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = CoordinatorError::CallerIsNotAuthorizedConsumer {
            caller: Address::ZERO,
            key: B256::ZERO,
            operator: Address::repeat_byte(0xa1),
            spec_id: B256::repeat_byte(0x01),
        };
        let message = err.to_string();
        assert!(message.contains(&Address::repeat_byte(0xa1).to_string()));
        assert!(message.contains(&B256::repeat_byte(0x01).to_string()));
    }
}
