//! Payment calculation: the pre-paid maximum and the post-paid spot price.
//!
//! Both algorithms convert a native-currency gas cost into payment-token units
//! using the rate of the [`PriceFeedAdapter`](crate::feed::PriceFeedAdapter),
//! apply the Spec's fee and subtract what the requester has already escrowed:
//!
//! ```text
//! no_fee   = gas_price × (gas + overhead) × 10^18 / rate
//! with_fee = no_fee + fee                          (FLAT)
//!          = no_fee × (10_000 + fee) / 10_000      (PERMYRIAD)
//! amount   = with_fee − escrowed                   (may be negative: a refund)
//! ```
//!
//! `gas` is the declared callback gas limit for the maximum payment and the gas
//! actually consumed for the spot payment. The fee is applied before the
//! escrow is subtracted, so a proportional fee never discounts the escrow.

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};

use crate::spec::{FeeType, PERMYRIAD, PaymentType};

/// Gas spent by the coordinator after the spot payment is computed.
pub const GAS_AFTER_PAYMENT_CALCULATION: u64 = 50_000;

/// One whole payment token (18 decimals).
pub const TOKEN_UNIT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Pure payment arithmetic, parameterized by the post-payment gas overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCalculator {
    /// Gas added to every computation for work done after the calculation.
    pub gas_after_payment_calculation: u64,
}

impl Default for PaymentCalculator {
    fn default() -> Self {
        Self::new(GAS_AFTER_PAYMENT_CALCULATION)
    }
}

impl PaymentCalculator {
    /// Creates a calculator with the given post-payment gas overhead.
    #[must_use]
    pub const fn new(gas_after_payment_calculation: u64) -> Self {
        Self {
            gas_after_payment_calculation,
        }
    }

    /// Maximum payment for a request declaring `gas_limit` callback gas.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::ZeroRate`] for a zero rate and
    /// [`PricingError::Overflow`] if any intermediate overflows.
    pub fn max_payment(
        &self,
        rate: U256,
        gas_price: U256,
        escrowed: U256,
        gas_limit: u64,
        fee_type: FeeType,
        fee: U256,
    ) -> Result<I256, PricingError> {
        let amount = self.amount_with_fee(rate, gas_price, gas_limit, fee_type, fee)?;
        signed_difference(amount, escrowed)
    }

    /// Spot payment once `gas_consumed` gas has actually been spent.
    ///
    /// # Errors
    ///
    /// Same as [`PaymentCalculator::max_payment`].
    pub fn spot_payment(
        &self,
        rate: U256,
        gas_consumed: u64,
        gas_price: U256,
        escrowed: U256,
        fee_type: FeeType,
        fee: U256,
    ) -> Result<I256, PricingError> {
        let amount = self.amount_with_fee(rate, gas_price, gas_consumed, fee_type, fee)?;
        signed_difference(amount, escrowed)
    }

    fn amount_with_fee(
        &self,
        rate: U256,
        gas_price: U256,
        gas: u64,
        fee_type: FeeType,
        fee: U256,
    ) -> Result<U256, PricingError> {
        if rate.is_zero() {
            return Err(PricingError::ZeroRate);
        }
        let gas = gas
            .checked_add(self.gas_after_payment_calculation)
            .ok_or(PricingError::Overflow)?;
        let no_fee = gas_price
            .checked_mul(U256::from(gas))
            .and_then(|wei| wei.checked_mul(TOKEN_UNIT))
            .ok_or(PricingError::Overflow)?
            / rate;
        match fee_type {
            FeeType::Flat => no_fee.checked_add(fee),
            FeeType::Permyriad => U256::from(PERMYRIAD)
                .checked_add(fee)
                .and_then(|factor| no_fee.checked_mul(factor))
                .map(|scaled| scaled / U256::from(PERMYRIAD)),
        }
        .ok_or(PricingError::Overflow)
    }

    /// The operator's share of a request whose maximum payment is `max_payment`.
    ///
    /// A flat payment is taken as-is; a proportional payment is a permyriad of
    /// the maximum payment.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the product overflows.
    pub fn operator_payment(
        max_payment: U256,
        payment_type: PaymentType,
        payment: U256,
    ) -> Result<U256, PricingError> {
        match payment_type {
            FeeType::Flat => Ok(payment),
            FeeType::Permyriad => max_payment
                .checked_mul(payment)
                .map(|scaled| scaled / U256::from(PERMYRIAD))
                .ok_or(PricingError::Overflow),
        }
    }
}

fn signed_difference(amount: U256, escrowed: U256) -> Result<I256, PricingError> {
    let amount = I256::try_from(amount).map_err(|_| PricingError::Overflow)?;
    let escrowed = I256::try_from(escrowed).map_err(|_| PricingError::Overflow)?;
    amount.checked_sub(escrowed).ok_or(PricingError::Overflow)
}

/// Errors of the payment arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// The rate was zero, which would divide by zero.
    #[error("rate is zero")]
    ZeroRate,
    /// An intermediate value exceeded 256 bits.
    #[error("payment calculation overflowed")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u64 = 3_490_053_626_306_509;
    const GWEI_30: u64 = 30_000_000_000;

    fn token(units: u64) -> U256 {
        U256::from(units) * TOKEN_UNIT
    }

    #[test]
    fn test_max_payment_fixture() {
        let calculator = PaymentCalculator::new(0);
        let amount = calculator
            .max_payment(
                U256::from(RATE),
                U256::from(GWEI_30),
                U256::ZERO,
                2_000_000,
                FeeType::Flat,
                token(1),
            )
            .unwrap();
        assert_eq!(
            amount,
            I256::try_from(18_191_712_914_594_219_838u128).unwrap()
        );
    }

    #[test]
    fn test_max_payment_closed_form_with_overhead() {
        let calculator = PaymentCalculator::default();
        let gas_limit = 500_000u64;
        let fee = U256::from(1_000u64);
        let escrowed = token(2);
        let amount = calculator
            .max_payment(U256::from(RATE), U256::from(GWEI_30), escrowed, gas_limit, FeeType::Flat, fee)
            .unwrap();
        let expected = U256::from(GWEI_30) * U256::from(gas_limit + GAS_AFTER_PAYMENT_CALCULATION)
            * TOKEN_UNIT
            / U256::from(RATE)
            + fee;
        assert_eq!(
            amount,
            I256::try_from(expected).unwrap() - I256::try_from(escrowed).unwrap()
        );
    }

    #[test]
    fn test_permyriad_fee_scales_base_amount() {
        let calculator = PaymentCalculator::new(0);
        // 1 gwei × 1e6 gas at a 1:1 rate costs 1e15 units; a 2.5% fee adds 2.5e13.
        let amount = calculator
            .max_payment(
                TOKEN_UNIT,
                U256::from(1_000_000_000u64),
                U256::ZERO,
                1_000_000,
                FeeType::Permyriad,
                U256::from(250u64),
            )
            .unwrap();
        assert_eq!(amount, I256::try_from(1_025_000_000_000_000u64).unwrap());
    }

    #[test]
    fn test_spot_payment_can_be_negative() {
        let calculator = PaymentCalculator::new(0);
        let escrowed = token(1);
        let spot = calculator
            .spot_payment(
                TOKEN_UNIT,
                100_000,
                U256::from(1_000_000_000u64),
                escrowed,
                FeeType::Flat,
                U256::ZERO,
            )
            .unwrap();
        assert!(spot.is_negative());
        assert_eq!(
            spot,
            I256::try_from(100_000_000_000_000u64).unwrap() - I256::try_from(escrowed).unwrap()
        );
    }

    #[test]
    fn test_spot_is_monotonic_in_gas() {
        let calculator = PaymentCalculator::default();
        let spot = |gas| {
            calculator
                .spot_payment(U256::from(RATE), gas, U256::from(GWEI_30), token(1), FeeType::Permyriad, U256::from(500u64))
                .unwrap()
        };
        assert!(spot(0) <= spot(1));
        assert!(spot(100_000) <= spot(400_000));
    }

    #[test]
    fn test_zero_rate_and_overflow_are_errors() {
        let calculator = PaymentCalculator::default();
        assert_eq!(
            calculator.max_payment(U256::ZERO, U256::from(1u64), U256::ZERO, 1, FeeType::Flat, U256::ZERO),
            Err(PricingError::ZeroRate)
        );
        assert_eq!(
            calculator.max_payment(U256::from(1u64), U256::MAX, U256::ZERO, 1, FeeType::Flat, U256::ZERO),
            Err(PricingError::Overflow)
        );
    }

    #[test]
    fn test_operator_payment_by_type() {
        let max = token(10);
        assert_eq!(
            PaymentCalculator::operator_payment(max, FeeType::Flat, token(1)).unwrap(),
            token(1)
        );
        assert_eq!(
            PaymentCalculator::operator_payment(max, FeeType::Permyriad, U256::from(PERMYRIAD)).unwrap(),
            max
        );
        assert_eq!(
            PaymentCalculator::operator_payment(max, FeeType::Permyriad, U256::from(2_500u64)).unwrap(),
            token(10) / U256::from(4u64)
        );
    }
}
