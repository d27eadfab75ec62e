//! Available-balance accounting of payment-token funds held by the coordinator.
//!
//! The ledger only tracks who owns which part of the coordinator's token
//! balance; moving tokens is delegated to a [`PaymentToken`]. Every mutation is
//! checked first and applied second, so a failed operation leaves both the
//! ledger and the token untouched.

use std::collections::HashMap;

use alloy_primitives::{Address, I256, U256};

use crate::host::{HostError, PaymentToken};

/// Per-address balances of funds available for requests.
#[derive(Debug, Clone, Default)]
pub struct EscrowLedger {
    balances: HashMap<Address, U256>,
}

impl EscrowLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Available balance of `account`.
    #[must_use]
    pub fn balance(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    #[cfg(test)]
    fn total(&self) -> U256 {
        self.balances
            .values()
            .fold(U256::ZERO, |sum, balance| sum.saturating_add(*balance))
    }

    /// Fails unless `account` holds at least `required`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] naming the shortfall.
    pub fn ensure_covers(&self, account: Address, required: U256) -> Result<(), LedgerError> {
        let balance = self.balance(&account);
        if balance < required {
            return Err(LedgerError::InsufficientBalance {
                account,
                balance,
                required,
            });
        }
        Ok(())
    }

    /// Adds `amount` to `account`, returning the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the balance would exceed 256 bits.
    pub fn credit(&mut self, account: Address, amount: U256) -> Result<U256, LedgerError> {
        let updated = self
            .balance(&account)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.set(account, updated);
        Ok(updated)
    }

    /// Subtracts `amount` from `account`, returning the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if the balance is short.
    pub fn debit(&mut self, account: Address, amount: U256) -> Result<U256, LedgerError> {
        self.ensure_covers(account, amount)?;
        let updated = self.balance(&account) - amount;
        self.set(account, updated);
        Ok(updated)
    }

    /// Pulls `amount` tokens from `payer` into the coordinator and credits
    /// them to `beneficiary`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientAllowance`] or
    /// [`LedgerError::InsufficientTokenBalance`] naming the deficient quantity,
    /// or the token's own error if the transfer is rejected.
    pub fn deposit<T>(
        &mut self,
        token: &T,
        coordinator: Address,
        payer: Address,
        beneficiary: Address,
        amount: U256,
    ) -> Result<U256, LedgerError>
    where
        T: PaymentToken + ?Sized,
    {
        let allowance = token.allowance(&payer, &coordinator);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: payer,
                allowance,
                required: amount,
            });
        }
        let held = token.balance_of(&payer);
        if held < amount {
            return Err(LedgerError::InsufficientTokenBalance {
                owner: payer,
                balance: held,
                required: amount,
            });
        }
        let updated = self
            .balance(&beneficiary)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        token.transfer_from(coordinator, payer, coordinator, amount)?;
        self.set(beneficiary, updated);
        Ok(updated)
    }

    /// Debits `amount` from `from` and sends the tokens to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if `from` is short, or the
    /// token's error if the transfer is rejected.
    pub fn withdraw<T>(
        &mut self,
        token: &T,
        coordinator: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<U256, LedgerError>
    where
        T: PaymentToken + ?Sized,
    {
        self.ensure_covers(from, amount)?;
        token.transfer(coordinator, to, amount)?;
        self.debit(from, amount)
    }

    /// Settles a fulfilled request: a positive `spot` moves funds from the
    /// requester to the coordinator, a negative one refunds the requester out
    /// of the coordinator's balance.
    ///
    /// A refund larger than that balance is paid as far as it goes; the
    /// unpaid remainder is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if the requester cannot
    /// pay a positive `spot` and [`LedgerError::Overflow`] if the receiving
    /// side would overflow.
    pub fn settle(
        &mut self,
        requester: Address,
        coordinator: Address,
        spot: I256,
    ) -> Result<U256, LedgerError> {
        let (payer, payee, owed) = Self::settlement_legs(requester, coordinator, spot);
        let amount = if spot.is_negative() {
            owed.min(self.balance(&payer))
        } else {
            owed
        };
        self.ensure_covers(payer, amount)?;
        if payer != payee && self.balance(&payee).checked_add(amount).is_none() {
            return Err(LedgerError::Overflow);
        }
        self.debit(payer, amount)?;
        self.credit(payee, amount)?;
        Ok(owed - amount)
    }

    fn settlement_legs(
        requester: Address,
        coordinator: Address,
        spot: I256,
    ) -> (Address, Address, U256) {
        if spot.is_negative() {
            (coordinator, requester, spot.unsigned_abs())
        } else {
            (requester, coordinator, spot.into_raw())
        }
    }

    fn set(&mut self, account: Address, balance: U256) {
        if balance.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }
}

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The payer did not approve the coordinator for enough tokens.
    #[error("allowance {allowance} of {owner} is below {required}")]
    InsufficientAllowance {
        /// Token owner.
        owner: Address,
        /// Approved amount.
        allowance: U256,
        /// Amount that was to be deposited.
        required: U256,
    },
    /// The payer does not hold enough tokens.
    #[error("token balance {balance} of {owner} is below {required}")]
    InsufficientTokenBalance {
        /// Token owner.
        owner: Address,
        /// Tokens held.
        balance: U256,
        /// Amount that was to be deposited.
        required: U256,
    },
    /// An available balance does not cover the amount.
    #[error("available balance {balance} of {account} is below {required}")]
    InsufficientBalance {
        /// Account being charged.
        account: Address,
        /// Its available balance.
        balance: U256,
        /// Amount required.
        required: U256,
    },
    /// A balance would exceed 256 bits.
    #[error("balance overflow")]
    Overflow,
    /// The payment token rejected a transfer.
    #[error("{0}")]
    Host(#[from] HostError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;
    use alloy_primitives::address;

    const COORDINATOR: Address = address!("0x00000000000000000000000000000000000000c0");
    const ALICE: Address = address!("0x000000000000000000000000000000000000a11c");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    fn amount(value: u64) -> U256 {
        U256::from(value)
    }

    #[test]
    fn test_deposit_checks_allowance_then_balance() {
        let host = MemoryHost::new();
        host.mint(ALICE, amount(100));
        let mut ledger = EscrowLedger::new();

        let err = ledger
            .deposit(&host, COORDINATOR, ALICE, ALICE, amount(50))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientAllowance {
                owner: ALICE,
                allowance: U256::ZERO,
                required: amount(50),
            }
        );

        host.approve(ALICE, COORDINATOR, amount(500));
        let err = ledger
            .deposit(&host, COORDINATOR, ALICE, ALICE, amount(200))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientTokenBalance { balance, .. } if balance == amount(100)));

        assert_eq!(
            ledger.deposit(&host, COORDINATOR, ALICE, BOB, amount(60)).unwrap(),
            amount(60)
        );
        assert_eq!(ledger.balance(&BOB), amount(60));
        assert_eq!(host.balance_of(&COORDINATOR), amount(60));
        assert_eq!(host.balance_of(&ALICE), amount(40));
    }

    #[test]
    fn test_withdraw_moves_tokens_out() {
        let host = MemoryHost::new();
        host.mint(ALICE, amount(100));
        host.approve(ALICE, COORDINATOR, amount(100));
        let mut ledger = EscrowLedger::new();
        ledger
            .deposit(&host, COORDINATOR, ALICE, ALICE, amount(100))
            .unwrap();

        let err = ledger
            .withdraw(&host, COORDINATOR, ALICE, BOB, amount(101))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(host.balance_of(&BOB), U256::ZERO);

        ledger
            .withdraw(&host, COORDINATOR, ALICE, BOB, amount(30))
            .unwrap();
        assert_eq!(ledger.balance(&ALICE), amount(70));
        assert_eq!(host.balance_of(&BOB), amount(30));
        assert_eq!(ledger.total(), host.balance_of(&COORDINATOR));
    }

    #[test]
    fn test_settle_both_directions() {
        let mut ledger = EscrowLedger::new();
        ledger.credit(ALICE, amount(10)).unwrap();
        ledger.credit(COORDINATOR, amount(5)).unwrap();

        let unpaid = ledger
            .settle(ALICE, COORDINATOR, I256::try_from(4).unwrap())
            .unwrap();
        assert_eq!(unpaid, U256::ZERO);
        assert_eq!(ledger.balance(&ALICE), amount(6));
        assert_eq!(ledger.balance(&COORDINATOR), amount(9));

        let unpaid = ledger
            .settle(ALICE, COORDINATOR, I256::try_from(-3).unwrap())
            .unwrap();
        assert_eq!(unpaid, U256::ZERO);
        assert_eq!(ledger.balance(&ALICE), amount(9));
        assert_eq!(ledger.balance(&COORDINATOR), amount(6));
        assert_eq!(ledger.total(), amount(15));
    }

    #[test]
    fn test_settle_never_goes_negative() {
        let mut ledger = EscrowLedger::new();
        ledger.credit(ALICE, amount(1)).unwrap();
        let err = ledger
            .settle(ALICE, COORDINATOR, I256::try_from(2).unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                account: ALICE,
                balance: amount(1),
                required: amount(2),
            }
        );
        assert_eq!(ledger.balance(&ALICE), amount(1));
        assert!(ledger.debit(ALICE, amount(2)).is_err());
    }

    #[test]
    fn test_refund_is_capped_at_coordinator_balance() {
        let mut ledger = EscrowLedger::new();
        ledger.credit(ALICE, amount(1)).unwrap();
        ledger.credit(COORDINATOR, amount(2)).unwrap();
        let unpaid = ledger
            .settle(ALICE, COORDINATOR, I256::try_from(-5).unwrap())
            .unwrap();
        assert_eq!(unpaid, amount(3));
        assert_eq!(ledger.balance(&ALICE), amount(3));
        assert_eq!(ledger.balance(&COORDINATOR), U256::ZERO);
        assert_eq!(ledger.total(), amount(3));
    }
}
