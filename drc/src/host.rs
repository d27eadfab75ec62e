//! Seams between the coordinator and the environment it runs in.
//!
//! On a ledger the coordinator would read `block.timestamp`, inspect
//! `extcodesize`, call an ERC-677 token and hand requests to an operator
//! contract. Off-chain those capabilities are supplied by an implementation of
//! [`Host`], which is the union of the small traits below. The in-memory
//! [`MemoryHost`](crate::memory::MemoryHost) implements all of them.

use alloy_primitives::{Address, B256, Bytes, Selector, U256};
use serde::{Deserialize, Serialize};

use crate::timestamp::UnixTimestamp;

/// Source of the current time.
pub trait Clock {
    /// Returns the host's notion of "now".
    fn now(&self) -> UnixTimestamp;
}

/// Distinguishes deployed contracts from externally owned accounts.
pub trait CodeInspector {
    /// Returns `true` if code is deployed at `address`.
    fn is_contract(&self, address: &Address) -> bool;
}

/// The payment token held by the coordinator on behalf of its consumers.
pub trait PaymentToken {
    /// Total token supply, which bounds every flat amount in a Spec.
    fn total_supply(&self) -> U256;

    /// Token balance of `owner`.
    fn balance_of(&self, owner: &Address) -> U256;

    /// Amount `spender` may move on behalf of `owner`.
    fn allowance(&self, owner: &Address, spender: &Address) -> U256;

    /// Moves `amount` from `from` to `to` using `spender`'s allowance.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Transfer`] if the allowance or balance does not cover `amount`.
    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), HostError>;

    /// Moves `amount` of `from`'s own tokens to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Transfer`] if `from` does not hold `amount`.
    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), HostError>;
}

/// A request forwarded to an operator, carrying the escrowed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorRequest {
    /// Identifier the operator must echo back on fulfillment.
    pub request_id: B256,
    /// Operator contract receiving the request.
    pub operator: Address,
    /// Job identifier on the operator's node.
    pub spec_id: B256,
    /// Coordinator that forwards the request and expects the fulfillment.
    pub coordinator: Address,
    /// Payment-token amount escrowed with the operator.
    pub payment: U256,
    /// Gas the consumer callback may use.
    pub gas_limit: u64,
    /// Confirmations the operator waits for before answering.
    pub min_confirmations: u8,
    /// Time after which the requester may cancel.
    pub expiration: UnixTimestamp,
    /// Request nonce the id was derived from.
    pub nonce: u64,
    /// Opaque job parameters.
    pub payload: Bytes,
}

/// Operator side of the request round trip.
pub trait OperatorGateway {
    /// Delivers `request` to its operator and moves the escrowed payment from
    /// the coordinator to the operator.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Operator`] if the operator does not accept the request.
    fn forward(&self, request: &OperatorRequest) -> Result<(), HostError>;

    /// Withdraws an expired request from its operator, returning `payment` to
    /// the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Operator`] if the operator cannot return the escrow.
    fn cancel(
        &self,
        operator: Address,
        request_id: B256,
        payment: U256,
        expiration: UnixTimestamp,
    ) -> Result<(), HostError>;

    /// Releases the operator's commitment to a request that has been settled.
    fn fulfilled(&self, operator: Address, request_id: B256);
}

/// A gas-bounded message call into a consumer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Account performing the call (the coordinator).
    pub caller: Address,
    /// Contract being called.
    pub target: Address,
    /// Function selector of the callback.
    pub selector: Selector,
    /// Operator-provided result data.
    pub payload: Bytes,
    /// Gas available to the callee.
    pub gas_limit: u64,
}

/// Outcome of a completed message call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallReceipt {
    /// `false` if the callee reverted.
    pub success: bool,
    /// Gas consumed by the callee.
    pub gas_used: u64,
}

/// Executes message calls into external code.
pub trait CallTarget {
    /// Calls into `request.target`.
    ///
    /// A revert inside the callee is a receipt with `success == false`; an
    /// error means the call could not be attempted at all.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Call`] if the call could not be performed.
    fn call(&self, request: &CallRequest) -> Result<CallReceipt, HostError>;
}

/// Everything the coordinator needs from its environment.
pub trait Host:
    Clock + CodeInspector + PaymentToken + OperatorGateway + CallTarget + Send + Sync
{
}

impl<T> Host for T where
    T: Clock + CodeInspector + PaymentToken + OperatorGateway + CallTarget + Send + Sync
{
}

/// Failures reported by a [`Host`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// A token movement was rejected.
    #[error("transfer of {amount} from {from} to {to} failed: {reason}")]
    Transfer {
        /// Source account.
        from: Address,
        /// Destination account.
        to: Address,
        /// Amount that was to be moved.
        amount: U256,
        /// Host-provided reason.
        reason: String,
    },
    /// An operator refused a forwarded request or a cancellation.
    #[error("operator {operator} rejected request {request_id}: {reason}")]
    Operator {
        /// Operator contract.
        operator: Address,
        /// Affected request.
        request_id: B256,
        /// Host-provided reason.
        reason: String,
    },
    /// A message call could not be performed.
    #[error("call to {target} failed: {reason}")]
    Call {
        /// Called contract.
        target: Address,
        /// Host-provided reason.
        reason: String,
    },
}
