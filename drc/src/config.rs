//! Construction-time configuration of a coordinator.
//!
//! # Example
//!
//! ```rust
//! use drc::config::CoordinatorConfig;
//!
//! let config: CoordinatorConfig = serde_json::from_value(serde_json::json!({
//!     "address": "0x00000000000000000000000000000000000000c0",
//!     "owner": "0x0000000000000000000000000000000000000001",
//!     "feed": { "stalenessSeconds": 3600 }
//! }))
//! .unwrap();
//! assert_eq!(config.feed.staleness_seconds, 3600);
//! assert_eq!(config.gas_after_payment_calculation, 50_000);
//! assert_eq!(config.event_capacity, 1_024);
//! ```

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::feed::FeedSettings;
use crate::pricing::GAS_AFTER_PAYMENT_CALCULATION;

/// Identity and tunables of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    /// Address the coordinator holds tokens under and calls callbacks from.
    pub address: Address,

    /// Initial owner.
    pub owner: Address,

    /// Price-feed adapter settings.
    #[serde(default)]
    pub feed: FeedSettings,

    /// Gas added to every payment computation for post-calculation work.
    #[serde(default = "default_gas_after_payment_calculation")]
    pub gas_after_payment_calculation: u64,

    /// Start in the paused state.
    #[serde(default)]
    pub paused: bool,

    /// Events kept for [`drain_events`](crate::Coordinator::drain_events);
    /// the oldest are dropped first.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Default size of the event journal.
pub const EVENT_CAPACITY: usize = 1_024;

const fn default_gas_after_payment_calculation() -> u64 {
    GAS_AFTER_PAYMENT_CALCULATION
}

const fn default_event_capacity() -> usize {
    EVENT_CAPACITY
}

impl CoordinatorConfig {
    /// Configuration with default tunables.
    #[must_use]
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            feed: FeedSettings::default(),
            gas_after_payment_calculation: GAS_AFTER_PAYMENT_CALCULATION,
            paused: false,
            event_capacity: EVENT_CAPACITY,
        }
    }
}
