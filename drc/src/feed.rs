//! Price-feed adapter producing the native-per-payment-token rate.
//!
//! The payment calculator divides a native-currency gas cost by a rate
//! expressed as native wei per whole payment token (18 decimals). The rate is
//! read from Chainlink-style aggregators:
//!
//! - [`FeedSource::Single`]: one feed quoting the rate directly (e.g. `LINK / ETH`)
//! - [`FeedSource::Pair`]: two USD feeds (`LINK / USD`, `ETH / USD`) combined by ratio
//! - [`FeedSource::None`]: no live feed; the fallback rate is always used
//!
//! # Policy
//!
//! 1. If a sequencer uptime feed is configured and reports the sequencer down,
//!    or it came back up less than `sequencer_grace_seconds` ago, the fallback
//!    rate is returned.
//! 2. Any non-positive answer is a hard [`FeedError::NonPositiveAnswer`]; the
//!    fallback never masks a logically impossible price.
//! 3. An answer older than `staleness_seconds` yields the fallback rate.

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, PoisonError};

use crate::timestamp::UnixTimestamp;

/// Decimals of the rate consumed by the payment calculator.
pub const RATE_DECIMALS: u8 = 18;

/// Largest feed precision the adapter normalizes.
pub const MAX_FEED_DECIMALS: u8 = 36;

/// One answer of an aggregator, as returned by `latestRoundData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundData {
    /// Aggregator round identifier.
    pub round_id: u64,
    /// Reported value, scaled by the feed's decimals.
    pub answer: I256,
    /// Time the round started. For uptime feeds, the time the status last changed.
    pub started_at: UnixTimestamp,
    /// Time the answer was last updated.
    pub updated_at: UnixTimestamp,
    /// Round in which the answer was computed.
    pub answered_in_round: u64,
}

/// A Chainlink-style aggregator.
pub trait PriceFeed: Send + Sync {
    /// Latest round reported by the feed.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Unavailable`] if the feed cannot be read.
    fn latest_round_data(&self) -> Result<RoundData, FeedError>;

    /// Number of decimals in [`RoundData::answer`].
    fn decimals(&self) -> u8;

    /// Human-readable pair name, used in diagnostics.
    fn description(&self) -> String;
}

/// Where the primary rate comes from.
#[derive(Clone, Default)]
pub enum FeedSource {
    /// No live feed: every read returns the fallback rate.
    #[default]
    None,
    /// A single feed quoting native per payment token.
    Single(Arc<dyn PriceFeed>),
    /// Two USD-denominated feeds combined as `payment_usd / native_usd`.
    Pair {
        /// Payment token priced in USD.
        payment_usd: Arc<dyn PriceFeed>,
        /// Native currency priced in USD.
        native_usd: Arc<dyn PriceFeed>,
    },
}

impl Debug for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Single(feed) => f.debug_tuple("Single").field(&feed.description()).finish(),
            Self::Pair {
                payment_usd,
                native_usd,
            } => f
                .debug_struct("Pair")
                .field("payment_usd", &payment_usd.description())
                .field("native_usd", &native_usd.description())
                .finish(),
        }
    }
}

/// Owner-tunable parameters of the adapter.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedSettings {
    /// Rate used whenever the live signal cannot be trusted (18 decimals).
    #[serde_as(as = "DisplayFromStr")]
    pub fallback_rate: U256,
    /// Maximum answer age before the fallback rate is used.
    pub staleness_seconds: u64,
    /// Time after a sequencer restart during which feeds are distrusted.
    pub sequencer_grace_seconds: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            fallback_rate: U256::from(3_490_053_626_306_509u64),
            staleness_seconds: 86_400,
            sequencer_grace_seconds: 3_600,
        }
    }
}

/// Why a quote used the fallback rate instead of a live answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FallbackReason {
    /// No live feed is configured.
    NoFeed,
    /// The sequencer uptime feed reports an outage.
    SequencerDown,
    /// The sequencer restarted within the grace period.
    SequencerGracePeriod,
    /// The price answer is older than the staleness window.
    StaleAnswer,
}

/// A rate together with its provenance.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    /// Native wei per whole payment token.
    #[serde_as(as = "DisplayFromStr")]
    pub rate: U256,
    /// Set when the fallback rate was used.
    pub fallback: Option<FallbackReason>,
}

/// Reads the configured feeds and applies the staleness / liveness policy.
#[derive(Debug, Clone, Default)]
pub struct PriceFeedAdapter {
    source: FeedSource,
    sequencer: Option<Arc<dyn PriceFeed>>,
    settings: FeedSettings,
}

impl Debug for dyn PriceFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PriceFeed").field(&self.description()).finish()
    }
}

impl PriceFeedAdapter {
    /// Creates an adapter over `source` with the given settings.
    #[must_use]
    pub const fn new(source: FeedSource, settings: FeedSettings) -> Self {
        Self {
            source,
            sequencer: None,
            settings,
        }
    }

    /// Makes the adapter distrust its feeds while `sequencer` reports an outage.
    #[must_use]
    pub fn with_sequencer(mut self, sequencer: Arc<dyn PriceFeed>) -> Self {
        self.sequencer = Some(sequencer);
        self
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    /// Mutable settings, for the owner-gated setters.
    pub const fn settings_mut(&mut self) -> &mut FeedSettings {
        &mut self.settings
    }

    /// Returns `true` if a sequencer uptime feed is configured.
    #[must_use]
    pub const fn is_sequencer_dependant(&self) -> bool {
        self.sequencer.is_some()
    }

    /// Current rate, native wei per whole payment token.
    ///
    /// # Errors
    ///
    /// See [`PriceFeedAdapter::quote`].
    pub fn rate(&self, now: UnixTimestamp) -> Result<U256, FeedError> {
        self.quote(now).map(|quote| quote.rate)
    }

    /// Current rate together with whether the fallback was used.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::NonPositiveAnswer`] for a non-positive price,
    /// [`FeedError::Unavailable`] if a feed cannot be read and
    /// [`FeedError::Overflow`] if normalization overflows.
    pub fn quote(&self, now: UnixTimestamp) -> Result<RateQuote, FeedError> {
        if let Some(sequencer) = &self.sequencer {
            let status = sequencer.latest_round_data()?;
            if status.answer != I256::ZERO {
                return Ok(self.fallback(FallbackReason::SequencerDown));
            }
            if now.seconds_since(status.started_at) <= self.settings.sequencer_grace_seconds {
                return Ok(self.fallback(FallbackReason::SequencerGracePeriod));
            }
        }

        match &self.source {
            FeedSource::None => Ok(self.fallback(FallbackReason::NoFeed)),
            FeedSource::Single(feed) => {
                let round = read_positive(feed.as_ref())?;
                if self.is_stale(&round, now) {
                    return Ok(self.fallback(FallbackReason::StaleAnswer));
                }
                let rate = rescale(round.answer.unsigned_abs(), feed.decimals(), RATE_DECIMALS)?;
                if rate.is_zero() {
                    return Err(FeedError::Overflow);
                }
                Ok(RateQuote {
                    rate,
                    fallback: None,
                })
            }
            FeedSource::Pair {
                payment_usd,
                native_usd,
            } => {
                let payment = read_positive(payment_usd.as_ref())?;
                let native = read_positive(native_usd.as_ref())?;
                if self.is_stale(&payment, now) || self.is_stale(&native, now) {
                    return Ok(self.fallback(FallbackReason::StaleAnswer));
                }
                let numerator = scale_up(
                    payment.answer.unsigned_abs(),
                    RATE_DECIMALS + native_usd.decimals(),
                )?;
                let denominator = scale_up(native.answer.unsigned_abs(), payment_usd.decimals())?;
                let rate = numerator
                    .checked_div(denominator)
                    .filter(|rate| !rate.is_zero())
                    .ok_or(FeedError::Overflow)?;
                Ok(RateQuote {
                    rate,
                    fallback: None,
                })
            }
        }
    }

    fn is_stale(&self, round: &RoundData, now: UnixTimestamp) -> bool {
        now.seconds_since(round.updated_at) > self.settings.staleness_seconds
    }

    fn fallback(&self, reason: FallbackReason) -> RateQuote {
        #[cfg(feature = "telemetry")]
        tracing::warn!(?reason, rate = %self.settings.fallback_rate, "Using fallback rate");
        RateQuote {
            rate: self.settings.fallback_rate,
            fallback: Some(reason),
        }
    }
}

fn read_positive(feed: &dyn PriceFeed) -> Result<RoundData, FeedError> {
    let round = feed.latest_round_data()?;
    if round.answer <= I256::ZERO {
        return Err(FeedError::NonPositiveAnswer {
            feed: feed.description(),
            answer: round.answer,
        });
    }
    if feed.decimals() > MAX_FEED_DECIMALS {
        return Err(FeedError::UnsupportedDecimals {
            feed: feed.description(),
            decimals: feed.decimals(),
        });
    }
    Ok(round)
}

/// Moves `value` from `from` decimals to `to` decimals, truncating.
fn rescale(value: U256, from: u8, to: u8) -> Result<U256, FeedError> {
    if to >= from {
        scale_up(value, to - from)
    } else {
        let factor = U256::from(10u64)
            .checked_pow(U256::from(from - to))
            .ok_or(FeedError::Overflow)?;
        Ok(value / factor)
    }
}

/// `value × 10^decimals`, checked.
fn scale_up(value: U256, decimals: u8) -> Result<U256, FeedError> {
    U256::from(10u64)
        .checked_pow(U256::from(decimals))
        .and_then(|factor| value.checked_mul(factor))
        .ok_or(FeedError::Overflow)
}

/// Errors surfaced by the price-feed adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// A feed reported a zero or negative price.
    #[error("feed {feed} answered a non-positive price {answer}")]
    NonPositiveAnswer {
        /// Feed description.
        feed: String,
        /// Offending answer.
        answer: I256,
    },
    /// A feed's precision is outside what the adapter normalizes.
    #[error("feed {feed} has unsupported decimals {decimals}")]
    UnsupportedDecimals {
        /// Feed description.
        feed: String,
        /// Reported decimals.
        decimals: u8,
    },
    /// A feed could not be read.
    #[error("feed {feed} is unavailable: {reason}")]
    Unavailable {
        /// Feed description.
        feed: String,
        /// Reason reported by the feed.
        reason: String,
    },
    /// Normalizing the answers overflowed or truncated to zero.
    #[error("rate normalization overflowed")]
    Overflow,
}

/// A feed whose answer is set explicitly.
///
/// Serves as the test double for aggregators and as the devnet feed of
/// `drc-node`, where prices are configured rather than observed.
pub struct StaticFeed {
    description: String,
    decimals: u8,
    round: Mutex<RoundData>,
}

impl Debug for StaticFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticFeed")
            .field("description", &self.description)
            .field("decimals", &self.decimals)
            .finish_non_exhaustive()
    }
}

impl StaticFeed {
    /// Creates a feed answering `answer`, last updated at `updated_at`.
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        decimals: u8,
        answer: I256,
        updated_at: UnixTimestamp,
    ) -> Self {
        Self {
            description: description.into(),
            decimals,
            round: Mutex::new(RoundData {
                round_id: 1,
                answer,
                started_at: updated_at,
                updated_at,
                answered_in_round: 1,
            }),
        }
    }

    /// Creates a sequencer uptime feed; `up == false` reports an outage.
    #[must_use]
    pub fn sequencer(up: bool, since: UnixTimestamp) -> Self {
        Self::new("Sequencer Uptime", 0, I256::from_raw(U256::from(u8::from(!up))), since)
    }

    /// Publishes a new round.
    pub fn set_answer(&self, answer: I256, updated_at: UnixTimestamp) {
        let mut round = self.round.lock().unwrap_or_else(PoisonError::into_inner);
        round.round_id += 1;
        round.answered_in_round = round.round_id;
        round.answer = answer;
        round.started_at = updated_at;
        round.updated_at = updated_at;
    }
}

impl PriceFeed for StaticFeed {
    fn latest_round_data(&self) -> Result<RoundData, FeedError> {
        Ok(*self.round.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: u64) -> UnixTimestamp {
        UnixTimestamp::from_secs(secs)
    }

    fn int(value: i64) -> I256 {
        I256::try_from(value).unwrap()
    }

    fn settings() -> FeedSettings {
        FeedSettings {
            fallback_rate: U256::from(4_000_000_000_000_000u64),
            staleness_seconds: 3_600,
            sequencer_grace_seconds: 600,
        }
    }

    #[test]
    fn test_no_feed_uses_fallback() {
        let adapter = PriceFeedAdapter::new(FeedSource::None, settings());
        let quote = adapter.quote(ts(1_000)).unwrap();
        assert_eq!(quote.rate, settings().fallback_rate);
        assert_eq!(quote.fallback, Some(FallbackReason::NoFeed));
    }

    #[test]
    fn test_single_feed_fresh_answer() {
        let feed = Arc::new(StaticFeed::new("LINK / ETH", 18, int(3_490_053_626_306_509), ts(1_000)));
        let adapter = PriceFeedAdapter::new(FeedSource::Single(feed), settings());
        let quote = adapter.quote(ts(1_500)).unwrap();
        assert_eq!(quote.rate, U256::from(3_490_053_626_306_509u64));
        assert_eq!(quote.fallback, None);
    }

    #[test]
    fn test_single_feed_normalizes_decimals() {
        let feed = Arc::new(StaticFeed::new("LINK / ETH", 8, int(349_005), ts(1_000)));
        let adapter = PriceFeedAdapter::new(FeedSource::Single(feed), settings());
        assert_eq!(
            adapter.rate(ts(1_000)).unwrap(),
            U256::from(3_490_050_000_000_000u64)
        );
    }

    #[test]
    fn test_stale_answer_falls_back() {
        let feed = Arc::new(StaticFeed::new("LINK / ETH", 18, int(1_000), ts(1_000)));
        let adapter = PriceFeedAdapter::new(FeedSource::Single(feed.clone()), settings());
        let quote = adapter.quote(ts(1_000 + 3_601)).unwrap();
        assert_eq!(quote.fallback, Some(FallbackReason::StaleAnswer));

        feed.set_answer(int(1_000), ts(4_000));
        assert_eq!(adapter.quote(ts(4_601)).unwrap().fallback, None);
    }

    #[test]
    fn test_non_positive_answer_is_hard_error() {
        let feed = Arc::new(StaticFeed::new("LINK / ETH", 18, int(0), ts(1_000)));
        let adapter = PriceFeedAdapter::new(FeedSource::Single(feed.clone()), settings());
        assert!(matches!(
            adapter.quote(ts(1_000)),
            Err(FeedError::NonPositiveAnswer { .. })
        ));

        // Staleness does not hide a negative reading.
        feed.set_answer(int(-5), ts(1_000));
        assert!(matches!(
            adapter.quote(ts(100_000)),
            Err(FeedError::NonPositiveAnswer { .. })
        ));
    }

    #[test]
    fn test_pair_feeds_combine_by_ratio() {
        // LINK = $14.00, ETH = $4011.40, both with 8 decimals.
        let link_usd = Arc::new(StaticFeed::new("LINK / USD", 8, int(1_400_000_000), ts(1_000)));
        let eth_usd = Arc::new(StaticFeed::new("ETH / USD", 8, int(401_140_000_000), ts(1_000)));
        let adapter = PriceFeedAdapter::new(
            FeedSource::Pair {
                payment_usd: link_usd,
                native_usd: eth_usd,
            },
            settings(),
        );
        let expected = U256::from(1_400_000_000u64) * U256::from(10u64).pow(U256::from(18u64))
            / U256::from(401_140_000_000u64);
        assert_eq!(adapter.rate(ts(1_000)).unwrap(), expected);
    }

    #[test]
    fn test_pair_with_one_stale_feed_falls_back() {
        let link_usd = Arc::new(StaticFeed::new("LINK / USD", 8, int(1_400_000_000), ts(10_000)));
        let eth_usd = Arc::new(StaticFeed::new("ETH / USD", 8, int(401_140_000_000), ts(1_000)));
        let adapter = PriceFeedAdapter::new(
            FeedSource::Pair {
                payment_usd: link_usd,
                native_usd: eth_usd,
            },
            settings(),
        );
        assert_eq!(
            adapter.quote(ts(10_000)).unwrap().fallback,
            Some(FallbackReason::StaleAnswer)
        );
    }

    #[test]
    fn test_sequencer_down_and_grace_period() {
        let feed = Arc::new(StaticFeed::new("LINK / ETH", 18, int(1_000), ts(5_000)));
        let sequencer = Arc::new(StaticFeed::sequencer(false, ts(1_000)));
        let adapter = PriceFeedAdapter::new(FeedSource::Single(feed), settings())
            .with_sequencer(sequencer.clone());
        assert!(adapter.is_sequencer_dependant());
        assert_eq!(
            adapter.quote(ts(5_000)).unwrap().fallback,
            Some(FallbackReason::SequencerDown)
        );

        // Back up at t=4_800: within the 600 s grace period until t=5_400.
        sequencer.set_answer(I256::ZERO, ts(4_800));
        assert_eq!(
            adapter.quote(ts(5_000)).unwrap().fallback,
            Some(FallbackReason::SequencerGracePeriod)
        );
        assert_eq!(adapter.quote(ts(5_401)).unwrap().fallback, None);
    }
}
