#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core of a direct-request oracle coordinator.
//!
//! A consumer asks an operator for off-chain data under a registered Spec.
//! The coordinator escrows the operator's payment from the consumer's
//! deposited balance, forwards the request, and on fulfillment delivers the
//! answer to the consumer's callback and charges the spot price of the gas
//! the callback used, converted into the payment token through a price feed.
//!
//! # Overview
//!
//! The [`Coordinator`] composes every piece behind one lock:
//!
//! - [`registry`] - Specs keyed by `keccak256(operator ‖ spec id)`
//! - [`consumers`] - Per-Spec sets of authorized requesters
//! - [`feed`] - Price-feed adapter with staleness and sequencer fallback
//! - [`pricing`] - Maximum and spot payment arithmetic
//! - [`ledger`] - Escrowed balances backed by the payment token
//! - [`dispatch`] - Failure-isolated callback invocation
//! - [`guard`] - Ownership, pause and reentrancy protection
//!
//! Everything outside the coordinator (the clock, the payment token, the
//! operators and the consumer contracts) sits behind the traits in [`host`].
//! [`memory::MemoryHost`] implements them in memory.
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod collections;
pub mod config;
pub mod consumers;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod feed;
pub mod guard;
pub mod host;
pub mod ledger;
pub mod memory;
pub mod pricing;
pub mod registry;
pub mod request;
pub mod spec;
pub mod timestamp;

pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use error::{CoordinatorError, ErrorKind};
pub use events::CoordinatorEvent;
pub use request::{DataRequest, FulfillOutcome, Tx};
pub use spec::{FeeType, Spec, SpecKey};
