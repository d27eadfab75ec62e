//! The coordinator: one state object composing the registry, the
//! authorization table, the price-feed adapter, the payment calculator, the
//! escrow ledger and the pending-request table behind the access guard.
//!
//! # Locking
//!
//! Every mutating entry point first enters the [`ReentrancyGuard`], and other
//! threads queue behind it. While a fulfillment callback runs, any entry, from
//! whatever thread, fails at once with
//! [`GuardError::ReentrantCall`](crate::guard::GuardError::ReentrantCall), so
//! balances cannot move between the pre-callback checks and settlement. The
//! state mutex is held for the whole operation except during the callback,
//! which can still use the read-only views. All checks run before the first
//! host interaction and all state effects after it, so a failed entry point
//! leaves no trace.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::{Address, B256, Bytes, I256, U256};

use crate::config::CoordinatorConfig;
use crate::consumers::AuthorizationTable;
use crate::dispatch::FulfillmentDispatcher;
use crate::error::CoordinatorError;
use crate::events::CoordinatorEvent;
use crate::feed::{FeedSettings, FeedSource, PriceFeed, PriceFeedAdapter, RateQuote};
use crate::guard::{AccessGuard, Entered, ReentrancyGuard};
use crate::host::{CallRequest, Host, OperatorRequest};
use crate::ledger::EscrowLedger;
use crate::pricing::PaymentCalculator;
use crate::registry::{RegistryError, SpecRegistry, SpecValidator};
use crate::request::{
    DataRequest, FulfillConfig, FulfillOutcome, OPERATOR_REQUEST_EXPIRATION_TIME, Tx, request_id,
};
use crate::spec::{FeeType, MIN_REQUEST_GAS_LIMIT, Spec, SpecKey, spec_key};

#[derive(Debug)]
struct State {
    access: AccessGuard,
    registry: SpecRegistry,
    consumers: AuthorizationTable,
    ledger: EscrowLedger,
    feed: PriceFeedAdapter,
    calculator: PaymentCalculator,
    requests: HashMap<B256, FulfillConfig>,
    nonce: u64,
    events: VecDeque<CoordinatorEvent>,
    event_capacity: usize,
}

impl State {
    fn emit(&mut self, event: CoordinatorEvent) {
        if self.event_capacity == 0 {
            return;
        }
        if self.events.len() == self.event_capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn remove_spec(&mut self, key: SpecKey) -> Result<(), RegistryError> {
        self.registry.get(key)?;
        let consumers = self.consumers.clear(key);
        if !consumers.is_empty() {
            self.emit(CoordinatorEvent::AuthorizedConsumersRemoved { key, consumers });
        }
        self.registry.remove(key)?;
        self.emit(CoordinatorEvent::SpecRemoved { key });
        Ok(())
    }
}

/// A direct-request coordinator over a [`Host`].
#[derive(Debug)]
pub struct Coordinator<H> {
    address: Address,
    host: H,
    guard: ReentrancyGuard,
    state: Mutex<State>,
}

impl<H: Host> Coordinator<H> {
    /// Creates a coordinator reading its rate from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::FallbackRateIsZero`] if the configured
    /// fallback rate is zero.
    pub fn new(
        config: CoordinatorConfig,
        host: H,
        source: FeedSource,
    ) -> Result<Self, CoordinatorError> {
        if config.feed.fallback_rate.is_zero() {
            return Err(CoordinatorError::FallbackRateIsZero);
        }
        let mut access = AccessGuard::new(config.owner);
        if config.paused {
            access.pause(config.owner)?;
        }
        Ok(Self {
            address: config.address,
            host,
            guard: ReentrancyGuard::new(),
            state: Mutex::new(State {
                access,
                registry: SpecRegistry::new(),
                consumers: AuthorizationTable::new(),
                ledger: EscrowLedger::new(),
                feed: PriceFeedAdapter::new(source, config.feed),
                calculator: PaymentCalculator::new(config.gas_after_payment_calculation),
                requests: HashMap::new(),
                nonce: 0,
                events: VecDeque::new(),
                event_capacity: config.event_capacity,
            }),
        })
    }

    /// Makes the rate fall back while `sequencer` reports an outage.
    #[must_use]
    pub fn with_sequencer_feed(mut self, sequencer: Arc<dyn PriceFeed>) -> Self {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        state.feed = std::mem::take(&mut state.feed).with_sequencer(sequencer);
        self
    }

    /// Address of the coordinator.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The host the coordinator runs on.
    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self) -> Result<Entered<'_>, CoordinatorError> {
        Ok(self.guard.enter()?)
    }

    fn validator(&self) -> SpecValidator<'_, H> {
        SpecValidator {
            inspector: &self.host,
            coordinator: self.address,
            total_supply: self.host.total_supply(),
        }
    }

    // ---- Spec registry ----

    /// Derives the registry key of a Spec.
    #[must_use]
    pub fn spec_key(operator: Address, spec_id: B256) -> SpecKey {
        spec_key(operator, spec_id)
    }

    /// Inserts or replaces the Spec under `key`.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner or the Spec is invalid.
    pub fn set_spec(&self, tx: Tx, key: SpecKey, spec: Spec) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        state.registry.upsert(&self.validator(), key, spec)?;

        #[cfg(feature = "telemetry")]
        tracing::info!(%key, operator = %spec.operator, "Spec set");
        state.emit(CoordinatorEvent::SpecSet { key, spec });
        Ok(())
    }

    /// Inserts or replaces several Specs at once.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if the caller is not the owner, the
    /// batch is malformed or any Spec is invalid.
    pub fn set_specs(
        &self,
        tx: Tx,
        keys: &[SpecKey],
        specs: &[Spec],
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        state.registry.upsert_many(&self.validator(), keys, specs)?;
        for (key, spec) in keys.iter().zip(specs) {
            state.emit(CoordinatorEvent::SpecSet {
                key: *key,
                spec: *spec,
            });
        }

        #[cfg(feature = "telemetry")]
        tracing::info!(count = keys.len(), "Specs set");
        Ok(())
    }

    /// Removes the Spec under `key` together with its consumer set.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner or the Spec does not exist.
    pub fn remove_spec(&self, tx: Tx, key: SpecKey) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        state.remove_spec(key)?;

        #[cfg(feature = "telemetry")]
        tracing::info!(%key, "Spec removed");
        Ok(())
    }

    /// Removes several Specs; nothing is removed unless all exist.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner, `keys` is empty, or a key is
    /// missing or repeated.
    pub fn remove_specs(&self, tx: Tx, keys: &[SpecKey]) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        state.registry.ensure_removable(keys)?;
        for key in keys {
            state.remove_spec(*key)?;
        }
        Ok(())
    }

    /// Spec stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SpecIsNotInserted`] if there is none.
    pub fn get_spec(&self, key: SpecKey) -> Result<Spec, CoordinatorError> {
        Ok(*self.state().registry.get(key)?)
    }

    /// All Spec keys, in enumeration order.
    #[must_use]
    pub fn get_spec_keys(&self) -> Vec<SpecKey> {
        self.state().registry.keys().to_vec()
    }

    /// Number of stored Specs.
    #[must_use]
    pub fn get_number_of_specs(&self) -> usize {
        self.state().registry.len()
    }

    // ---- Authorization table ----

    /// Restricts the Spec under `key` to, among others, `consumers`.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner, the Spec does not exist or
    /// `consumers` is empty.
    pub fn add_authorized_consumers(
        &self,
        tx: Tx,
        key: SpecKey,
        consumers: &[Address],
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        let State {
            registry,
            consumers: table,
            ..
        } = &mut *state;
        table.add(registry, key, consumers)?;
        state.emit(CoordinatorEvent::AuthorizedConsumersAdded {
            key,
            consumers: consumers.to_vec(),
        });
        Ok(())
    }

    /// Batch form of [`Coordinator::add_authorized_consumers`].
    ///
    /// # Errors
    ///
    /// Fails without writing anything if any pair is invalid.
    pub fn add_authorized_consumers_many(
        &self,
        tx: Tx,
        keys: &[SpecKey],
        lists: &[Vec<Address>],
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        let State {
            registry,
            consumers: table,
            ..
        } = &mut *state;
        table.add_many(registry, keys, lists)?;
        for (key, consumers) in keys.iter().zip(lists) {
            state.emit(CoordinatorEvent::AuthorizedConsumersAdded {
                key: *key,
                consumers: consumers.clone(),
            });
        }
        Ok(())
    }

    /// Removes `consumers` from the Spec's set.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner, the Spec does not exist or an
    /// address is not a member.
    pub fn remove_authorized_consumers(
        &self,
        tx: Tx,
        key: SpecKey,
        consumers: &[Address],
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        let State {
            registry,
            consumers: table,
            ..
        } = &mut *state;
        table.remove(registry, key, consumers)?;
        state.emit(CoordinatorEvent::AuthorizedConsumersRemoved {
            key,
            consumers: consumers.to_vec(),
        });
        Ok(())
    }

    /// Batch form of [`Coordinator::remove_authorized_consumers`].
    ///
    /// # Errors
    ///
    /// Fails without writing anything if any pair is invalid.
    pub fn remove_authorized_consumers_many(
        &self,
        tx: Tx,
        keys: &[SpecKey],
        lists: &[Vec<Address>],
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        let State {
            registry,
            consumers: table,
            ..
        } = &mut *state;
        table.remove_many(registry, keys, lists)?;
        for (key, consumers) in keys.iter().zip(lists) {
            state.emit(CoordinatorEvent::AuthorizedConsumersRemoved {
                key: *key,
                consumers: consumers.clone(),
            });
        }
        Ok(())
    }

    /// Consumer set of the Spec under `key`; empty means public.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SpecIsNotInserted`] if the Spec does not exist.
    pub fn get_authorized_consumers(&self, key: SpecKey) -> Result<Vec<Address>, CoordinatorError> {
        let state = self.state();
        state.registry.get(key)?;
        Ok(state.consumers.list(key).to_vec())
    }

    // ---- Funds ----

    /// Deposits `amount` tokens from the caller, credited to `beneficiary`.
    ///
    /// # Errors
    ///
    /// Fails naming the deficient allowance or token balance.
    pub fn add_funds(
        &self,
        tx: Tx,
        beneficiary: Address,
        amount: U256,
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state
            .ledger
            .deposit(&self.host, self.address, tx.sender, beneficiary, amount)?;

        #[cfg(feature = "telemetry")]
        tracing::info!(from = %tx.sender, to = %beneficiary, %amount, "Funds added");
        state.emit(CoordinatorEvent::FundsAdded {
            from: tx.sender,
            to: beneficiary,
            amount,
        });
        Ok(())
    }

    /// Withdraws `amount` from the available balance of `from` to `to`.
    ///
    /// Accounts withdraw for themselves; the owner withdraws the
    /// coordinator's own fee revenue.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::CannotWithdrawFor`] for any other caller,
    /// or a ledger error if the balance is short.
    pub fn withdraw_funds(
        &self,
        tx: Tx,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        let owner_for_coordinator = from == self.address && tx.sender == state.access.owner();
        if tx.sender != from && !owner_for_coordinator {
            return Err(CoordinatorError::CannotWithdrawFor {
                caller: tx.sender,
                from,
            });
        }
        state
            .ledger
            .withdraw(&self.host, self.address, from, to, amount)?;

        #[cfg(feature = "telemetry")]
        tracing::info!(%from, %to, %amount, "Funds withdrawn");
        state.emit(CoordinatorEvent::FundsWithdrawn { from, to, amount });
        Ok(())
    }

    /// Available balance of `account`.
    #[must_use]
    pub fn available_funds(&self, account: Address) -> U256 {
        self.state().ledger.balance(&account)
    }

    // ---- Requests ----

    /// Escrows the operator payment and forwards a request to the operator.
    ///
    /// The requester must hold the full maximum payment at the transaction's
    /// gas price; only the operator's share is taken now.
    ///
    /// # Errors
    ///
    /// Fails while paused, on reentry, for an unknown Spec, an unauthorized
    /// caller, out-of-range gas or confirmations, an invalid callback, a
    /// short balance, or if the operator rejects the request.
    pub fn request_data(&self, tx: Tx, request: &DataRequest) -> Result<B256, CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.when_not_paused()?;

        let key = spec_key(request.operator, request.spec_id);
        let spec = *state.registry.get(key)?;
        if !state.consumers.is_authorized(key, &tx.sender) {
            return Err(CoordinatorError::CallerIsNotAuthorizedConsumer {
                caller: tx.sender,
                key,
                operator: spec.operator,
                spec_id: spec.spec_id,
            });
        }
        if request.min_confirmations > spec.min_confirmations {
            return Err(CoordinatorError::MinConfirmationsIsGtSpec {
                requested: request.min_confirmations,
                maximum: spec.min_confirmations,
            });
        }
        if request.callback_gas_limit < MIN_REQUEST_GAS_LIMIT
            || request.callback_gas_limit > spec.gas_limit
        {
            return Err(CoordinatorError::GasLimitIsNotValid {
                gas_limit: request.callback_gas_limit,
                minimum: MIN_REQUEST_GAS_LIMIT,
                maximum: spec.gas_limit,
            });
        }
        if request.callback_address == self.address {
            return Err(CoordinatorError::CallbackIsCoordinator(
                request.callback_address,
            ));
        }
        if !self.host.is_contract(&request.callback_address) {
            return Err(CoordinatorError::CallbackIsNotContract(
                request.callback_address,
            ));
        }

        let now = self.host.now();
        let rate = state.feed.rate(now)?;
        let max_payment = state
            .calculator
            .max_payment(
                rate,
                tx.gas_price,
                U256::ZERO,
                request.callback_gas_limit,
                spec.fee_type,
                spec.fee,
            )?
            .into_raw();
        state.ledger.ensure_covers(tx.sender, max_payment)?;
        let payment = PaymentCalculator::operator_payment(max_payment, spec.payment_type, spec.payment)?;
        if payment > max_payment {
            return Err(CoordinatorError::PaymentIsGtMaxPayment {
                payment,
                max_payment,
            });
        }

        let nonce = state.nonce;
        let id = request_id(self.address, nonce);
        let expiration = now.saturating_add(OPERATOR_REQUEST_EXPIRATION_TIME);
        self.host.forward(&OperatorRequest {
            request_id: id,
            operator: spec.operator,
            spec_id: spec.spec_id,
            coordinator: self.address,
            payment,
            gas_limit: request.callback_gas_limit,
            min_confirmations: request.min_confirmations,
            expiration,
            nonce,
            payload: request.payload.clone(),
        })?;

        state.ledger.debit(tx.sender, payment)?;
        state.nonce += 1;
        state.requests.insert(
            id,
            FulfillConfig {
                requester: tx.sender,
                operator: spec.operator,
                spec_key: key,
                callback_address: request.callback_address,
                callback_selector: request.callback_selector,
                escrowed_payment: payment,
                fee: spec.fee,
                fee_type: spec.fee_type,
                gas_limit: request.callback_gas_limit,
                min_confirmations: request.min_confirmations,
                expiration,
            },
        );

        #[cfg(feature = "telemetry")]
        tracing::info!(request_id = %id, requester = %tx.sender, %key, %payment, "Request created");
        state.emit(CoordinatorEvent::RequestCreated {
            request_id: id,
            requester: tx.sender,
            key,
            payment,
            expiration,
        });
        Ok(id)
    }

    /// Delivers `data` to the request's callback and settles the spot price.
    ///
    /// The spot payment is computed from the gas the callback actually used,
    /// at the fulfilling transaction's gas price. A failing callback does not
    /// abort the fulfillment; it is settled at its full gas budget and
    /// reported in the outcome. A refund beyond the coordinator's fee revenue
    /// is paid in part and the remainder reported as
    /// [`FulfillOutcome::unpaid_refund`].
    ///
    /// # Errors
    ///
    /// Fails while paused, on reentry, if the request is not pending, if the
    /// caller is not its operator, or if the requester cannot cover the spot
    /// price at the full callback gas limit.
    pub fn fulfill_data(
        &self,
        tx: Tx,
        request_id: B256,
        data: Bytes,
    ) -> Result<FulfillOutcome, CoordinatorError> {
        let entered = self.enter()?;
        let (record, price) = {
            let mut state = self.state();
            state.access.when_not_paused()?;
            let record = *state
                .requests
                .get(&request_id)
                .ok_or(CoordinatorError::RequestIsNotPending(request_id))?;
            if tx.sender != record.operator {
                return Err(CoordinatorError::CallerIsNotOperator {
                    caller: tx.sender,
                    request_id,
                });
            }
            let price = SpotPrice {
                calculator: state.calculator,
                rate: state.feed.rate(self.host.now())?,
                gas_price: tx.gas_price,
                escrowed: record.escrowed_payment,
                fee_type: record.fee_type,
                fee: record.fee,
            };
            let most = price.at(record.gas_limit)?;
            if most.is_positive() {
                state.ledger.ensure_covers(record.requester, most.into_raw())?;
            }
            state.requests.remove(&request_id);
            (record, price)
        };

        let call = CallRequest {
            caller: self.address,
            target: record.callback_address,
            selector: record.callback_selector,
            payload: data,
            gas_limit: record.gas_limit,
        };
        let dispatched = {
            let _dispatching = entered.dispatch();
            FulfillmentDispatcher::invoke(&self.host, &call)
        };
        let (success, gas_charged, failure) = match dispatched {
            Ok(outcome) if outcome.out_of_gas => {
                (false, outcome.gas_used, Some("out of gas".to_owned()))
            }
            Ok(outcome) if !outcome.success => {
                (false, outcome.gas_used, Some("reverted".to_owned()))
            }
            Ok(outcome) => (true, outcome.gas_used, None),
            Err(err) => (false, record.gas_limit, Some(err.to_string())),
        };

        let mut state = self.state();
        let settled = price.at(gas_charged).and_then(|spot| {
            state
                .ledger
                .settle(record.requester, self.address, spot)
                .map(|unpaid| (spot, unpaid))
                .map_err(CoordinatorError::from)
        });
        let (payment, unpaid_refund) = match settled {
            Ok(settled) => settled,
            Err(err) => {
                state.requests.insert(request_id, record);
                return Err(err);
            }
        };
        self.host.fulfilled(record.operator, request_id);

        #[cfg(feature = "telemetry")]
        if let Some(reason) = &failure {
            tracing::warn!(%request_id, callback = %record.callback_address, %reason, "Callback failed");
        }
        #[cfg(feature = "telemetry")]
        if !unpaid_refund.is_zero() {
            tracing::warn!(%request_id, requester = %record.requester, %unpaid_refund, "Refund exceeds fee revenue");
        }
        #[cfg(feature = "telemetry")]
        tracing::info!(%request_id, success, gas_charged, %payment, "Request fulfilled");

        state.emit(CoordinatorEvent::RequestFulfilled {
            request_id,
            success,
            callback: record.callback_address,
            selector: record.callback_selector,
            payment,
        });
        if !success && record.callback_address != record.requester {
            state.emit(CoordinatorEvent::ExternalCallbackFailed {
                request_id,
                callback: record.callback_address,
                selector: record.callback_selector,
            });
        }
        Ok(FulfillOutcome {
            request_id,
            success,
            callback: record.callback_address,
            selector: record.callback_selector,
            gas_charged,
            payment,
            unpaid_refund,
            failure,
        })
    }

    /// Withdraws an expired request, returning its escrow to the requester.
    ///
    /// # Errors
    ///
    /// Fails on reentry, if the request is not pending, if the caller is not
    /// its requester, before expiration, or if the operator cannot return the
    /// escrow.
    pub fn cancel_request(&self, tx: Tx, request_id: B256) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        let record = *state
            .requests
            .get(&request_id)
            .ok_or(CoordinatorError::RequestIsNotPending(request_id))?;
        if tx.sender != record.requester {
            return Err(CoordinatorError::CallerIsNotRequester {
                caller: tx.sender,
                request_id,
            });
        }
        let now = self.host.now();
        if now < record.expiration {
            return Err(CoordinatorError::RequestIsNotCancellable {
                request_id,
                expiration: record.expiration,
                now,
            });
        }

        self.host.cancel(
            record.operator,
            request_id,
            record.escrowed_payment,
            record.expiration,
        )?;
        state.ledger.credit(record.requester, record.escrowed_payment)?;
        state.requests.remove(&request_id);

        #[cfg(feature = "telemetry")]
        tracing::info!(%request_id, refund = %record.escrowed_payment, "Request cancelled");
        state.emit(CoordinatorEvent::RequestCancelled { request_id });
        Ok(())
    }

    /// Settlement record of a pending request.
    #[must_use]
    pub fn pending_request(&self, request_id: B256) -> Option<FulfillConfig> {
        self.state().requests.get(&request_id).copied()
    }

    // ---- Pricing ----

    /// Maximum payment at the current rate.
    ///
    /// # Errors
    ///
    /// Fails if the rate cannot be read or the arithmetic overflows.
    pub fn calculate_max_payment_amount(
        &self,
        gas_price: U256,
        escrowed: U256,
        gas_limit: u64,
        fee_type: FeeType,
        fee: U256,
    ) -> Result<I256, CoordinatorError> {
        let state = self.state();
        let rate = state.feed.rate(self.host.now())?;
        Ok(state
            .calculator
            .max_payment(rate, gas_price, escrowed, gas_limit, fee_type, fee)?)
    }

    /// Spot payment at the current rate.
    ///
    /// # Errors
    ///
    /// Fails if the rate cannot be read or the arithmetic overflows.
    pub fn calculate_spot_payment_amount(
        &self,
        gas_consumed: u64,
        gas_price: U256,
        escrowed: U256,
        fee_type: FeeType,
        fee: U256,
    ) -> Result<I256, CoordinatorError> {
        let state = self.state();
        let rate = state.feed.rate(self.host.now())?;
        Ok(state
            .calculator
            .spot_payment(rate, gas_consumed, gas_price, escrowed, fee_type, fee)?)
    }

    /// Current rate, native wei per whole payment token.
    ///
    /// # Errors
    ///
    /// Fails if a feed reports a non-positive price or cannot be read.
    pub fn get_feed_rate(&self) -> Result<U256, CoordinatorError> {
        Ok(self.state().feed.rate(self.host.now())?)
    }

    /// Current rate and whether it is the fallback.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::get_feed_rate`].
    pub fn get_feed_quote(&self) -> Result<RateQuote, CoordinatorError> {
        Ok(self.state().feed.quote(self.host.now())?)
    }

    /// Current price-feed settings.
    #[must_use]
    pub fn get_feed_settings(&self) -> FeedSettings {
        *self.state().feed.settings()
    }

    /// Returns `true` if rates depend on a sequencer uptime feed.
    #[must_use]
    pub fn is_sequencer_dependant(&self) -> bool {
        self.state().feed.is_sequencer_dependant()
    }

    // ---- Administration ----

    /// Suspends request creation and fulfillment.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner or already paused.
    pub fn pause(&self, tx: Tx) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.pause(tx.sender)?;

        #[cfg(feature = "telemetry")]
        tracing::warn!(account = %tx.sender, "Coordinator paused");
        state.emit(CoordinatorEvent::Paused { account: tx.sender });
        Ok(())
    }

    /// Lifts the pause.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner or not paused.
    pub fn unpause(&self, tx: Tx) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.unpause(tx.sender)?;

        #[cfg(feature = "telemetry")]
        tracing::info!(account = %tx.sender, "Coordinator unpaused");
        state.emit(CoordinatorEvent::Unpaused { account: tx.sender });
        Ok(())
    }

    /// Proposes `to` as the next owner.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner or proposes itself.
    pub fn transfer_ownership(&self, tx: Tx, to: Address) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.transfer_ownership(tx.sender, to)?;
        state.emit(CoordinatorEvent::OwnershipTransferRequested {
            from: tx.sender,
            to,
        });
        Ok(())
    }

    /// Accepts a pending ownership transfer.
    ///
    /// # Errors
    ///
    /// Fails unless the caller is the proposed owner.
    pub fn accept_ownership(&self, tx: Tx) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        let previous = state.access.accept_ownership(tx.sender)?;

        #[cfg(feature = "telemetry")]
        tracing::info!(from = %previous, to = %tx.sender, "Ownership transferred");
        state.emit(CoordinatorEvent::OwnershipTransferred {
            from: previous,
            to: tx.sender,
        });
        Ok(())
    }

    /// Sets the rate used when the feeds cannot be trusted.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner or `rate` is zero.
    pub fn set_fallback_rate(&self, tx: Tx, rate: U256) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        if rate.is_zero() {
            return Err(CoordinatorError::FallbackRateIsZero);
        }
        state.feed.settings_mut().fallback_rate = rate;
        state.emit(CoordinatorEvent::FallbackRateSet { rate });
        Ok(())
    }

    /// Sets the maximum feed answer age.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner.
    pub fn set_staleness_seconds(&self, tx: Tx, seconds: u64) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        state.feed.settings_mut().staleness_seconds = seconds;
        state.emit(CoordinatorEvent::StalenessSecondsSet { seconds });
        Ok(())
    }

    /// Sets the time after a sequencer restart during which feeds are distrusted.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner.
    pub fn set_sequencer_grace_seconds(
        &self,
        tx: Tx,
        seconds: u64,
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        state.feed.settings_mut().sequencer_grace_seconds = seconds;
        state.emit(CoordinatorEvent::SequencerGraceSecondsSet { seconds });
        Ok(())
    }

    /// Sets the gas added to every payment computation.
    ///
    /// # Errors
    ///
    /// Fails if the caller is not the owner.
    pub fn set_gas_after_payment_calculation(
        &self,
        tx: Tx,
        gas: u64,
    ) -> Result<(), CoordinatorError> {
        let _entered = self.enter()?;
        let mut state = self.state();
        state.access.only_owner(tx.sender)?;
        state.calculator = PaymentCalculator::new(gas);
        state.emit(CoordinatorEvent::GasAfterPaymentCalculationSet { gas });
        Ok(())
    }

    /// Current owner.
    #[must_use]
    pub fn owner(&self) -> Address {
        self.state().access.owner()
    }

    /// Returns `true` while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state().access.is_paused()
    }

    /// Returns and clears the event journal.
    ///
    /// Only the latest [`CoordinatorConfig::event_capacity`] events are kept
    /// between drains.
    pub fn drain_events(&self) -> Vec<CoordinatorEvent> {
        self.state().events.drain(..).collect()
    }
}

/// Spot-price inputs frozen at the start of a fulfillment.
#[derive(Debug, Clone, Copy)]
struct SpotPrice {
    calculator: PaymentCalculator,
    rate: U256,
    gas_price: U256,
    escrowed: U256,
    fee_type: FeeType,
    fee: U256,
}

impl SpotPrice {
    fn at(&self, gas_consumed: u64) -> Result<I256, CoordinatorError> {
        Ok(self.calculator.spot_payment(
            self.rate,
            gas_consumed,
            self.gas_price,
            self.escrowed,
            self.fee_type,
            self.fee,
        )?)
    }
}
