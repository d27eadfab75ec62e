//! Gas-bounded, failure-isolated delivery of answers to consumer callbacks.
//!
//! A callback is untrusted code: it may revert, burn more gas than it was
//! given, fail to be reachable or panic outright. None of that may abort the
//! fulfillment that invoked it, so [`FulfillmentDispatcher::invoke`] turns
//! every such failure into a value the coordinator can settle against.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use alloy_primitives::Address;

use crate::host::{CallRequest, CallTarget, HostError};

/// Result of a callback that was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
    /// `false` if the callee reverted or ran out of gas.
    pub success: bool,
    /// Gas to charge for the call, never more than the budget.
    pub gas_used: u64,
    /// Set when the callee exceeded its budget.
    pub out_of_gas: bool,
}

/// A callback that could not be completed at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The callee panicked.
    #[error("callback {target} panicked: {message}")]
    Panicked {
        /// Called contract.
        target: Address,
        /// Panic payload, if it was a string.
        message: String,
    },
    /// The host could not perform the call.
    #[error("{0}")]
    Host(#[from] HostError),
}

/// Invokes consumer callbacks through a [`CallTarget`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FulfillmentDispatcher;

impl FulfillmentDispatcher {
    /// Calls `request.target` with `request.gas_limit` as the gas budget.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Panicked`] if the callee panicked and
    /// [`CallError::Host`] if the host could not perform the call. Both are
    /// charged as a failed call consuming the whole budget.
    pub fn invoke<T>(target: &T, request: &CallRequest) -> Result<CallOutcome, CallError>
    where
        T: CallTarget + ?Sized,
    {
        let receipt = catch_unwind(AssertUnwindSafe(|| target.call(request))).map_err(|payload| {
            CallError::Panicked {
                target: request.target,
                message: panic_message(payload.as_ref()),
            }
        })??;

        if receipt.gas_used > request.gas_limit {
            return Ok(CallOutcome {
                success: false,
                gas_used: request.gas_limit,
                out_of_gas: true,
            });
        }
        Ok(CallOutcome {
            success: receipt.success,
            gas_used: receipt.gas_used,
            out_of_gas: false,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CallReceipt;
    use alloy_primitives::{Bytes, Selector};

    struct Scripted(fn(&CallRequest) -> Result<CallReceipt, HostError>);

    impl CallTarget for Scripted {
        fn call(&self, request: &CallRequest) -> Result<CallReceipt, HostError> {
            (self.0)(request)
        }
    }

    fn request() -> CallRequest {
        CallRequest {
            caller: Address::ZERO,
            target: Address::repeat_byte(0xb1),
            selector: Selector::ZERO,
            payload: Bytes::new(),
            gas_limit: 100_000,
        }
    }

    #[test]
    fn test_successful_call() {
        let target = Scripted(|_| {
            Ok(CallReceipt {
                success: true,
                gas_used: 42_000,
            })
        });
        let outcome = FulfillmentDispatcher::invoke(&target, &request()).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.gas_used, 42_000);
    }

    #[test]
    fn test_out_of_gas_charged_at_budget() {
        let target = Scripted(|_| {
            Ok(CallReceipt {
                success: true,
                gas_used: 250_000,
            })
        });
        let outcome = FulfillmentDispatcher::invoke(&target, &request()).unwrap();
        assert!(!outcome.success);
        assert!(outcome.out_of_gas);
        assert_eq!(outcome.gas_used, 100_000);
    }

    #[test]
    fn test_panic_is_contained() {
        let target = Scripted(|_| panic!("boom"));
        let err = FulfillmentDispatcher::invoke(&target, &request()).unwrap_err();
        assert_eq!(
            err,
            CallError::Panicked {
                target: Address::repeat_byte(0xb1),
                message: "boom".to_owned(),
            }
        );
    }

    #[test]
    fn test_host_failure_is_an_error() {
        let target = Scripted(|request| {
            Err(HostError::Call {
                target: request.target,
                reason: "unreachable".to_owned(),
            })
        });
        assert!(matches!(
            FulfillmentDispatcher::invoke(&target, &request()),
            Err(CallError::Host(HostError::Call { .. }))
        ));
    }
}
