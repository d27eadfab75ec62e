//! Devnet node hosting a direct-request coordinator.
//!
//! Runs a [`drc::Coordinator`] over an in-memory host and exposes it as a
//! JSON API. Consumer callbacks can be backed by HTTP webhooks, so an
//! off-process consumer can observe and answer its fulfillments.
//!
//! # Modules
//!
//! - [`bootstrap`] - Builds the coordinator from configuration
//! - [`config`] - Node configuration with environment variable expansion
//! - [`error`] - HTTP error mapping
//! - [`handlers`] - Axum route handlers and router builder
//! - [`shutdown`] - OS signal handling
//! - [`webhook`] - Callback delivery over HTTP

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod shutdown;
pub mod webhook;

pub use handlers::{NodeState, coordinator_router};
