//! Node configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4021
//! webhook_timeout_secs = 10
//!
//! [coordinator]
//! address = "0x00000000000000000000000000000000000000c0"
//! owner = "$DRC_OWNER"
//!
//! [feeds.single]
//! description = "LINK / ETH"
//! decimals = 18
//! answer = "3490053626306509"
//!
//! [[accounts]]
//! address = "0x000000000000000000000000000000000000a11c"
//! mint = "100000000000000000000"
//! allowance = "100000000000000000000"
//!
//! [[contracts]]
//! address = "0x00000000000000000000000000000000000000b1"
//! webhook = "http://localhost:9000/callback"
//!
//! [[specs]]
//! specId = "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e"
//! operator = "0x00000000000000000000000000000000000000a1"
//! payment = "100000000000000000"
//! paymentType = "FLAT"
//! fee = "10000000000000000"
//! feeType = "FLAT"
//! gasLimit = 1000000
//! minConfirmations = 3
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `config.toml`)
//! - `HOST` - Override server bind address
//! - `PORT` - Override server port
//! - Any `$VAR` referenced in the config file; a `.env` file is read first

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, I256, U256};
use drc::config::CoordinatorConfig;
use drc::feed::{FeedSource, PriceFeed, StaticFeed};
use drc::spec::Spec;
use drc::timestamp::UnixTimestamp;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use url::Url;

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4021`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds a callback webhook may take before the call fails (default: `10`).
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    /// Identity and tunables of the hosted coordinator.
    pub coordinator: CoordinatorConfig,

    /// Price feeds; without any the fallback rate is used.
    #[serde(default)]
    pub feeds: FeedsConfig,

    /// Token holders created at startup.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Deployed contracts: operators and consumer callbacks.
    #[serde(default)]
    pub contracts: Vec<ContractConfig>,

    /// Specs registered by the owner at startup.
    #[serde(default)]
    pub specs: Vec<Spec>,
}

/// Static price feeds served by the node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// A direct payment-token/native feed.
    pub single: Option<StaticFeedConfig>,

    /// Payment token priced in USD; requires `native_usd`.
    pub payment_usd: Option<StaticFeedConfig>,

    /// Native coin priced in USD; requires `payment_usd`.
    pub native_usd: Option<StaticFeedConfig>,

    /// L2 sequencer status; `false` forces the fallback rate.
    pub sequencer_up: Option<bool>,
}

/// One fixed feed answer.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticFeedConfig {
    /// Human-readable pair name.
    pub description: String,

    /// Decimals of `answer`.
    pub decimals: u8,

    /// Reported price.
    #[serde_as(as = "DisplayFromStr")]
    pub answer: I256,
}

/// A funded token holder.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Holder address.
    pub address: Address,

    /// Tokens minted to the holder.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub mint: U256,

    /// Allowance granted to the coordinator.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub allowance: Option<U256>,
}

/// A deployed contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Contract address.
    pub address: Address,

    /// Endpoint receiving callbacks; without one every call succeeds using no gas.
    #[serde(default)]
    pub webhook: Option<Url>,
}

/// Configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid configuration.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The feed section mixes or half-specifies sources.
    #[error("invalid feeds: {0}")]
    Feeds(&'static str),
}

const fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    4021
}

const fn default_webhook_timeout_secs() -> u64 {
    10
}

impl NodeConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// Variables from a `.env` file are loaded first. `HOST` and `PORT` env
    /// vars override the file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        let mut config = Self::load_from(&path)?;

        if let Some(host) = std::env::var("HOST").ok().and_then(|h| h.parse().ok()) {
            config.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        Ok(config)
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses configuration text after expanding environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid configuration.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(&expand_env_vars(content))?)
    }

    /// Webhook timeout as a [`Duration`].
    #[must_use]
    pub const fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

impl FeedsConfig {
    /// Builds the feed source, answers timestamped `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Feeds`] if both a single feed and a pair are
    /// configured, or only half of a pair.
    pub fn source(&self, now: UnixTimestamp) -> Result<FeedSource, ConfigError> {
        let feed = |cfg: &StaticFeedConfig| -> Arc<dyn PriceFeed> {
            Arc::new(StaticFeed::new(
                cfg.description.clone(),
                cfg.decimals,
                cfg.answer,
                now,
            ))
        };
        match (&self.single, &self.payment_usd, &self.native_usd) {
            (None, None, None) => Ok(FeedSource::None),
            (Some(single), None, None) => Ok(FeedSource::Single(feed(single))),
            (None, Some(payment), Some(native)) => Ok(FeedSource::Pair {
                payment_usd: feed(payment),
                native_usd: feed(native),
            }),
            (Some(_), _, _) => Err(ConfigError::Feeds("single and pair feeds are exclusive")),
            (None, _, _) => Err(ConfigError::Feeds(
                "payment_usd and native_usd must be set together",
            )),
        }
    }

    /// Sequencer uptime feed, if one is configured.
    ///
    /// A sequencer configured as down went down at `now`. One configured as
    /// up has been up since the epoch, so no grace period applies.
    #[must_use]
    pub fn sequencer(&self, now: UnixTimestamp) -> Option<Arc<dyn PriceFeed>> {
        self.sequencer_up.map(|up| {
            let since = if up { UnixTimestamp::from_secs(0) } else { now };
            Arc::new(StaticFeed::sequencer(up, since)) as Arc<dyn PriceFeed>
        })
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment variables.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.next_if_eq(&'{').is_some();
        let mut name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced && c == '}' {
                chars.next();
                closed = true;
                break;
            }
            if !braced && !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            name.push(c);
            chars.next();
        }

        match std::env::var(&name) {
            Ok(value) if !name.is_empty() => result.push_str(&value),
            _ => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use drc::feed::FeedSettings;
    use drc::spec::FeeType;

    const CONFIG: &str = r#"
port = 5000

[coordinator]
address = "0x00000000000000000000000000000000000000c0"
owner = "0x0000000000000000000000000000000000000001"

[coordinator.feed]
stalenessSeconds = 600

[feeds.single]
description = "LINK / ETH"
decimals = 18
answer = "3490053626306509"

[[accounts]]
address = "0x000000000000000000000000000000000000a11c"
mint = "1000"

[[contracts]]
address = "0x00000000000000000000000000000000000000b1"
webhook = "http://localhost:9000/callback"

[[specs]]
specId = "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e"
operator = "0x00000000000000000000000000000000000000a1"
payment = "100"
paymentType = "PERMIRYAD"
fee = "5"
feeType = "FLAT"
gasLimit = 1000000
minConfirmations = 3
"#;

    #[test]
    fn test_parse_full_config() {
        let config = NodeConfig::parse(CONFIG).unwrap();
        assert_eq!(config.host, default_host());
        assert_eq!(config.port, 5000);
        assert_eq!(config.webhook_timeout(), Duration::from_secs(10));
        assert_eq!(config.coordinator.feed.staleness_seconds, 600);
        assert_eq!(config.coordinator.gas_after_payment_calculation, 50_000);
        assert_eq!(config.accounts[0].mint, U256::from(1000u64));
        assert_eq!(config.accounts[0].allowance, None);
        assert!(config.contracts[0].webhook.is_some());
        assert_eq!(config.specs[0].payment_type, FeeType::Permyriad);
        assert!(matches!(
            config.feeds.source(UnixTimestamp::from_secs(0)).unwrap(),
            FeedSource::Single(_)
        ));
        assert!(config.feeds.sequencer(UnixTimestamp::from_secs(0)).is_none());
    }

    #[test]
    fn test_sequencer_up_skips_grace_period() {
        let now = UnixTimestamp::from_secs(1_700_000_000);
        let feeds = FeedsConfig {
            sequencer_up: Some(true),
            ..FeedsConfig::default()
        };
        let status = feeds.sequencer(now).unwrap().latest_round_data().unwrap();
        assert_eq!(status.answer, I256::ZERO);
        assert!(now.seconds_since(status.started_at) > FeedSettings::default().sequencer_grace_seconds);

        let feeds = FeedsConfig {
            sequencer_up: Some(false),
            ..FeedsConfig::default()
        };
        let status = feeds.sequencer(now).unwrap().latest_round_data().unwrap();
        assert_eq!(status.answer, I256::try_from(1).unwrap());
        assert_eq!(status.started_at, now);
    }

    #[test]
    fn test_half_pair_is_rejected() {
        let feeds = FeedsConfig {
            native_usd: Some(StaticFeedConfig {
                description: "ETH / USD".to_owned(),
                decimals: 8,
                answer: I256::try_from(200_000_000_000u64).unwrap(),
            }),
            ..FeedsConfig::default()
        };
        assert!(matches!(
            feeds.source(UnixTimestamp::from_secs(0)),
            Err(ConfigError::Feeds(_))
        ));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-local variable names.
        unsafe {
            std::env::set_var("DRC_TEST_OWNER", "0x0000000000000000000000000000000000000001");
        }
        assert_eq!(
            expand_env_vars("owner = \"${DRC_TEST_OWNER}\""),
            "owner = \"0x0000000000000000000000000000000000000001\""
        );
        assert_eq!(
            expand_env_vars("$DRC_TEST_OWNER!"),
            "0x0000000000000000000000000000000000000001!"
        );
        assert_eq!(expand_env_vars("$DRC_TEST_MISSING"), "$DRC_TEST_MISSING");
        assert_eq!(expand_env_vars("${DRC_TEST_MISSING}"), "${DRC_TEST_MISSING}");
        assert_eq!(expand_env_vars("cost: $5"), "cost: $5");
        assert_eq!(expand_env_vars("$"), "$");
    }
}
