//! Request-side types: the transaction context, the request parameters and
//! the settlement record kept for every pending request.

use alloy_primitives::{Address, B256, Bytes, I256, Selector, U256, keccak256};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::spec::{FeeType, SpecKey};
use crate::timestamp::UnixTimestamp;

/// Seconds after creation at which a request becomes cancellable.
pub const OPERATOR_REQUEST_EXPIRATION_TIME: u64 = 300;

/// Caller context of an entry point: who sends it and at what gas price.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tx {
    /// Account calling the coordinator.
    pub sender: Address,
    /// Gas price of the transaction, in native wei.
    #[serde_as(as = "DisplayFromStr")]
    pub gas_price: U256,
}

impl Tx {
    /// A call from `sender` at zero gas price, for entry points that do not price gas.
    #[must_use]
    pub const fn new(sender: Address) -> Self {
        Self {
            sender,
            gas_price: U256::ZERO,
        }
    }

    /// Sets the gas price.
    #[must_use]
    pub const fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = gas_price;
        self
    }
}

/// Parameters of a data request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    /// Operator serving the Spec.
    pub operator: Address,
    /// Job identifier on the operator's node.
    pub spec_id: B256,
    /// Contract receiving the answer.
    pub callback_address: Address,
    /// Function selector invoked on `callback_address`.
    pub callback_selector: Selector,
    /// Gas the callback may consume.
    pub callback_gas_limit: u64,
    /// Confirmations the operator should wait for.
    pub min_confirmations: u8,
    /// Opaque job parameters.
    #[serde(default)]
    pub payload: Bytes,
}

/// Settlement context of a pending request.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillConfig {
    /// Account that paid the escrow.
    pub requester: Address,
    /// Only address allowed to fulfill.
    pub operator: Address,
    /// Spec the request was priced with.
    pub spec_key: SpecKey,
    /// Contract receiving the answer.
    pub callback_address: Address,
    /// Function selector invoked on `callback_address`.
    pub callback_selector: Selector,
    /// Amount taken from the requester and forwarded to the operator.
    #[serde_as(as = "DisplayFromStr")]
    pub escrowed_payment: U256,
    /// Coordinator fee captured at creation.
    #[serde_as(as = "DisplayFromStr")]
    pub fee: U256,
    /// Interpretation of `fee`.
    pub fee_type: FeeType,
    /// Gas the callback may consume.
    pub gas_limit: u64,
    /// Confirmations requested.
    pub min_confirmations: u8,
    /// Time from which the requester may cancel.
    pub expiration: UnixTimestamp,
}

/// Identifier of the request created under `nonce` by `coordinator`:
/// `keccak256(coordinator ‖ uint256(nonce))`.
#[must_use]
pub fn request_id(coordinator: Address, nonce: u64) -> B256 {
    let mut packed = [0u8; 52];
    packed[..20].copy_from_slice(coordinator.as_slice());
    packed[44..].copy_from_slice(&nonce.to_be_bytes());
    keccak256(packed)
}

/// Result of a fulfillment.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillOutcome {
    /// Fulfilled request.
    pub request_id: B256,
    /// `false` if the callback failed; settlement happened regardless.
    pub success: bool,
    /// Callback contract.
    pub callback: Address,
    /// Callback selector.
    pub selector: Selector,
    /// Gas charged for the callback.
    pub gas_charged: u64,
    /// Spot payment settled; negative values were refunded to the requester.
    #[serde_as(as = "DisplayFromStr")]
    pub payment: I256,
    /// Part of a refund the coordinator's fee revenue could not cover.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub unpaid_refund: U256,
    /// Why the callback failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}
