//! Notifications emitted by the coordinator.
//!
//! Events are appended to a journal in the order their operations commit and
//! handed out by [`Coordinator::drain_events`](crate::coordinator::Coordinator::drain_events).

use alloy_primitives::{Address, B256, I256, Selector, U256};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::spec::{Spec, SpecKey};
use crate::timestamp::UnixTimestamp;

/// Everything observable about a coordinator's state changes.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CoordinatorEvent {
    /// A Spec was inserted or replaced.
    SpecSet {
        /// Registry key.
        key: SpecKey,
        /// Stored record.
        spec: Spec,
    },
    /// A Spec was removed.
    SpecRemoved {
        /// Registry key.
        key: SpecKey,
    },
    /// Consumers were allowed to request a Spec.
    AuthorizedConsumersAdded {
        /// Registry key.
        key: SpecKey,
        /// Added addresses.
        consumers: Vec<Address>,
    },
    /// Consumers lost access to a Spec.
    AuthorizedConsumersRemoved {
        /// Registry key.
        key: SpecKey,
        /// Removed addresses.
        consumers: Vec<Address>,
    },
    /// Funds were deposited.
    FundsAdded {
        /// Token payer.
        from: Address,
        /// Credited account.
        to: Address,
        /// Deposited amount.
        #[serde_as(as = "DisplayFromStr")]
        amount: U256,
    },
    /// Funds were withdrawn.
    FundsWithdrawn {
        /// Debited account.
        from: Address,
        /// Token recipient.
        to: Address,
        /// Withdrawn amount.
        #[serde_as(as = "DisplayFromStr")]
        amount: U256,
    },
    /// A request was escrowed and forwarded.
    RequestCreated {
        /// Request identifier.
        request_id: B256,
        /// Requesting account.
        requester: Address,
        /// Spec the request was priced with.
        key: SpecKey,
        /// Escrowed operator payment.
        #[serde_as(as = "DisplayFromStr")]
        payment: U256,
        /// Time from which the request may be cancelled.
        expiration: UnixTimestamp,
    },
    /// A request was answered and settled.
    RequestFulfilled {
        /// Request identifier.
        request_id: B256,
        /// Whether the callback succeeded.
        success: bool,
        /// Callback contract.
        callback: Address,
        /// Callback selector.
        selector: Selector,
        /// Settled spot payment; negative values were refunded.
        #[serde_as(as = "DisplayFromStr")]
        payment: I256,
    },
    /// An expired request was withdrawn by its requester.
    RequestCancelled {
        /// Request identifier.
        request_id: B256,
    },
    /// A callback to a contract other than the requester failed.
    ExternalCallbackFailed {
        /// Request identifier.
        request_id: B256,
        /// Callback contract.
        callback: Address,
        /// Callback selector.
        selector: Selector,
    },
    /// Request creation and fulfillment were suspended.
    Paused {
        /// Account that paused.
        account: Address,
    },
    /// The pause was lifted.
    Unpaused {
        /// Account that unpaused.
        account: Address,
    },
    /// A new owner was proposed.
    OwnershipTransferRequested {
        /// Current owner.
        from: Address,
        /// Proposed owner.
        to: Address,
    },
    /// Ownership changed hands.
    OwnershipTransferred {
        /// Previous owner.
        from: Address,
        /// New owner.
        to: Address,
    },
    /// The fallback rate changed.
    FallbackRateSet {
        /// New rate.
        #[serde_as(as = "DisplayFromStr")]
        rate: U256,
    },
    /// The staleness window changed.
    StalenessSecondsSet {
        /// New window.
        seconds: u64,
    },
    /// The sequencer grace period changed.
    SequencerGraceSecondsSet {
        /// New grace period.
        seconds: u64,
    },
    /// The post-payment gas overhead changed.
    GasAfterPaymentCalculationSet {
        /// New overhead.
        gas: u64,
    },
}
