//! Builds the hosted coordinator from a [`NodeConfig`].

use std::sync::Arc;

use drc::memory::MemoryHost;
use drc::request::Tx;
use drc::spec::SpecKey;
use drc::timestamp::UnixTimestamp;
use drc::{Coordinator, CoordinatorError};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, NodeConfig};
use crate::handlers::NodeState;
use crate::webhook::WebhookCaller;

/// Failures while starting the node.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The configuration is inconsistent.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The coordinator rejected the initial state.
    #[error("{0}")]
    Coordinator(#[from] CoordinatorError),
}

/// Creates the in-memory host described by `config`, then the coordinator on
/// top of it, with the configured Specs registered by the owner.
///
/// Webhook callbacks are delivered through `runtime` and abandoned once
/// `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the feeds are misconfigured or a Spec is invalid.
pub fn build(
    config: &NodeConfig,
    runtime: Handle,
    shutdown: CancellationToken,
) -> Result<NodeState, BootstrapError> {
    let host = MemoryHost::new();
    let coordinator_address = config.coordinator.address;

    for account in &config.accounts {
        host.mint(account.address, account.mint);
        if let Some(allowance) = account.allowance {
            host.approve(account.address, coordinator_address, allowance);
        }
    }

    let webhooks = WebhookCaller::new(runtime, config.webhook_timeout(), shutdown);
    for contract in &config.contracts {
        match &contract.webhook {
            Some(url) => {
                tracing::info!(address = %contract.address, %url, "Registered callback webhook");
                host.register_callback(contract.address, webhooks.handler(url.clone()));
            }
            None => host.deploy(contract.address),
        }
    }

    let now = UnixTimestamp::now();
    let source = config.feeds.source(now)?;
    let mut coordinator = Coordinator::new(config.coordinator, host, source)?;
    if let Some(sequencer) = config.feeds.sequencer(now) {
        coordinator = coordinator.with_sequencer_feed(sequencer);
    }

    if !config.specs.is_empty() {
        let keys: Vec<SpecKey> = config.specs.iter().map(drc::Spec::key).collect();
        coordinator.set_specs(Tx::new(config.coordinator.owner), &keys, &config.specs)?;
    }
    tracing::info!(
        address = %coordinator_address,
        owner = %config.coordinator.owner,
        specs = config.specs.len(),
        accounts = config.accounts.len(),
        contracts = config.contracts.len(),
        "Coordinator ready"
    );
    Ok(Arc::new(coordinator))
}
