//! In-memory implementation of every [`host`](crate::host) seam.
//!
//! [`MemoryHost`] keeps token balances, allowances, deployed contracts,
//! forwarded operator requests and consumer callbacks in concurrent maps. It
//! backs the unit tests and the `drc-node` devnet.
//!
//! No map entry is ever held while another is locked, so concurrent use cannot
//! deadlock; multi-entry updates check first and write second.

use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, PoisonError};

use alloy_primitives::{Address, B256, U256};
use dashmap::{DashMap, DashSet};

use crate::host::{
    CallReceipt, CallRequest, CallTarget, Clock, CodeInspector, HostError, OperatorGateway,
    OperatorRequest, PaymentToken,
};
use crate::timestamp::UnixTimestamp;

/// A consumer callback: receives the call and reports its receipt.
pub type CallbackHandler =
    Arc<dyn Fn(&CallRequest) -> Result<CallReceipt, HostError> + Send + Sync>;

/// Host state held entirely in memory.
#[derive(Default)]
pub struct MemoryHost {
    fixed_time: Mutex<Option<UnixTimestamp>>,
    total_supply: Mutex<U256>,
    balances: DashMap<Address, U256>,
    allowances: DashMap<(Address, Address), U256>,
    contracts: DashSet<Address>,
    offline_operators: DashSet<Address>,
    callbacks: DashMap<Address, CallbackHandler>,
    forwarded: DashMap<B256, OperatorRequest>,
}

impl Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("now", &self.now())
            .field("accounts", &self.balances.len())
            .field("contracts", &self.contracts.len())
            .field("forwarded", &self.forwarded.len())
            .finish_non_exhaustive()
    }
}

impl MemoryHost {
    /// Creates an empty host following the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes the clock at `now`.
    pub fn set_time(&self, now: UnixTimestamp) {
        *self.fixed_time.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
    }

    /// Moves a frozen clock (or freezes the system clock) `secs` seconds forward.
    pub fn advance(&self, secs: u64) {
        let mut fixed = self.fixed_time.lock().unwrap_or_else(PoisonError::into_inner);
        let current = fixed.unwrap_or_else(UnixTimestamp::now);
        *fixed = Some(current.saturating_add(secs));
    }

    /// Creates `amount` new tokens held by `to`.
    pub fn mint(&self, to: Address, amount: U256) {
        let mut supply = self.total_supply.lock().unwrap_or_else(PoisonError::into_inner);
        *supply = supply.saturating_add(amount);
        let mut balance = self.balances.entry(to).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Sets the amount `spender` may move on behalf of `owner`.
    pub fn approve(&self, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((owner, spender), amount);
    }

    /// Marks `address` as a deployed contract.
    pub fn deploy(&self, address: Address) {
        self.contracts.insert(address);
    }

    /// Deploys `address` and routes its callbacks to `handler`.
    pub fn register_callback(&self, address: Address, handler: CallbackHandler) {
        self.deploy(address);
        self.callbacks.insert(address, handler);
    }

    /// Makes `operator` reject (or accept again) forwarded requests.
    pub fn set_operator_offline(&self, operator: Address, offline: bool) {
        if offline {
            self.offline_operators.insert(operator);
        } else {
            self.offline_operators.remove(&operator);
        }
    }

    /// Request forwarded to an operator and neither fulfilled nor cancelled.
    #[must_use]
    pub fn forwarded_request(&self, request_id: &B256) -> Option<OperatorRequest> {
        self.forwarded.get(request_id).map(|entry| entry.value().clone())
    }

    /// Number of requests currently held by operators.
    #[must_use]
    pub fn forwarded_count(&self) -> usize {
        self.forwarded.len()
    }

    fn debit_tokens(&self, from: Address, to: Address, amount: U256) -> Result<(), HostError> {
        if amount.is_zero() {
            return Ok(());
        }
        let Some(mut balance) = self.balances.get_mut(&from) else {
            return Err(insufficient(from, to, amount));
        };
        if *balance < amount {
            return Err(insufficient(from, to, amount));
        }
        *balance -= amount;
        Ok(())
    }

    fn credit_tokens(&self, to: Address, amount: U256) {
        let mut balance = self.balances.entry(to).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn move_tokens(&self, from: Address, to: Address, amount: U256) -> Result<(), HostError> {
        self.debit_tokens(from, to, amount)?;
        self.credit_tokens(to, amount);
        Ok(())
    }
}

fn insufficient(from: Address, to: Address, amount: U256) -> HostError {
    HostError::Transfer {
        from,
        to,
        amount,
        reason: "insufficient balance".to_owned(),
    }
}

impl Clock for MemoryHost {
    fn now(&self) -> UnixTimestamp {
        self.fixed_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_else(UnixTimestamp::now)
    }
}

impl CodeInspector for MemoryHost {
    fn is_contract(&self, address: &Address) -> bool {
        self.contracts.contains(address)
    }
}

impl PaymentToken for MemoryHost {
    fn total_supply(&self) -> U256 {
        *self.total_supply.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn balance_of(&self, owner: &Address) -> U256 {
        self.balances.get(owner).map(|b| *b).unwrap_or_default()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(&(*owner, *spender))
            .map(|a| *a)
            .unwrap_or_default()
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), HostError> {
        if self.allowance(&from, &spender) < amount {
            return Err(HostError::Transfer {
                from,
                to,
                amount,
                reason: "insufficient allowance".to_owned(),
            });
        }
        self.debit_tokens(from, to, amount)?;
        if let Some(mut allowance) = self.allowances.get_mut(&(from, spender)) {
            *allowance = allowance.saturating_sub(amount);
        }
        self.credit_tokens(to, amount);
        Ok(())
    }

    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), HostError> {
        self.move_tokens(from, to, amount)
    }
}

impl OperatorGateway for MemoryHost {
    fn forward(&self, request: &OperatorRequest) -> Result<(), HostError> {
        if self.offline_operators.contains(&request.operator) {
            return Err(HostError::Operator {
                operator: request.operator,
                request_id: request.request_id,
                reason: "operator is offline".to_owned(),
            });
        }
        if self.forwarded.contains_key(&request.request_id) {
            return Err(HostError::Operator {
                operator: request.operator,
                request_id: request.request_id,
                reason: "duplicate request id".to_owned(),
            });
        }
        self.move_tokens(request.coordinator, request.operator, request.payment)?;
        self.forwarded.insert(request.request_id, request.clone());
        Ok(())
    }

    fn cancel(
        &self,
        operator: Address,
        request_id: B256,
        payment: U256,
        expiration: UnixTimestamp,
    ) -> Result<(), HostError> {
        let rejected = |reason: &str| HostError::Operator {
            operator,
            request_id,
            reason: reason.to_owned(),
        };
        let request = self
            .forwarded_request(&request_id)
            .ok_or_else(|| rejected("unknown request"))?;
        if request.operator != operator
            || request.payment != payment
            || request.expiration != expiration
        {
            return Err(rejected("params do not match"));
        }
        self.move_tokens(operator, request.coordinator, payment)?;
        self.forwarded.remove(&request_id);
        Ok(())
    }

    fn fulfilled(&self, operator: Address, request_id: B256) {
        self.forwarded
            .remove_if(&request_id, |_, request| request.operator == operator);
    }
}

impl CallTarget for MemoryHost {
    fn call(&self, request: &CallRequest) -> Result<CallReceipt, HostError> {
        let handler = self
            .callbacks
            .get(&request.target)
            .map(|entry| Arc::clone(entry.value()));
        match handler {
            Some(handler) => handler(request),
            None if self.is_contract(&request.target) => Ok(CallReceipt {
                success: true,
                gas_used: 0,
            }),
            None => Err(HostError::Call {
                target: request.target,
                reason: "no code at target".to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, Selector, address};

    const ALICE: Address = address!("0x000000000000000000000000000000000000a11c");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    #[test]
    fn test_clock_can_be_frozen_and_advanced() {
        let host = MemoryHost::new();
        host.set_time(UnixTimestamp::from_secs(1_000));
        host.advance(300);
        assert_eq!(host.now(), UnixTimestamp::from_secs(1_300));
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let host = MemoryHost::new();
        host.mint(ALICE, U256::from(10u64));
        host.approve(ALICE, BOB, U256::from(6u64));
        host.transfer_from(BOB, ALICE, BOB, U256::from(4u64)).unwrap();
        assert_eq!(host.allowance(&ALICE, &BOB), U256::from(2u64));
        assert_eq!(host.balance_of(&BOB), U256::from(4u64));
        assert!(host.transfer_from(BOB, ALICE, BOB, U256::from(4u64)).is_err());
        assert_eq!(host.balance_of(&ALICE), U256::from(6u64));
        assert_eq!(host.total_supply(), U256::from(10u64));
    }

    #[test]
    fn test_call_routes_to_handler() {
        let host = MemoryHost::new();
        let target = address!("0x00000000000000000000000000000000000000b1");
        let request = CallRequest {
            caller: ALICE,
            target,
            selector: Selector::ZERO,
            payload: Bytes::new(),
            gas_limit: 1,
        };
        assert!(host.call(&request).is_err());
        host.register_callback(
            target,
            Arc::new(|request: &CallRequest| {
                Ok(CallReceipt {
                    success: request.payload.is_empty(),
                    gas_used: 7,
                })
            }),
        );
        assert!(host.is_contract(&target));
        assert_eq!(
            host.call(&request).unwrap(),
            CallReceipt {
                success: true,
                gas_used: 7
            }
        );
    }
}
