#![forbid(unsafe_code)]
//! Reconciliation engine for the metadata-driven guest agent.
//!
//! Watches a cloud metadata endpoint for changes and converges in-guest
//! state to match it: local account provisioning, secondary IP management,
//! WSFC health probing, mTLS credential bootstrap/rotation from a hardware
//! root of trust, and hosts-file/hostname maintenance.
//!
//! The crate is organized leaf-first:
//! - [`config`] loads the layered INI configuration.
//! - [`metadata`] is the long-poll HTTP client and wire types.
//! - [`firmware`] and [`tpm`] read the root-of-trust material.
//! - [`crypto`] and [`trust_store`] turn that material into an installed
//!   mTLS identity.
//! - [`scheduler`] and [`credential_job`] drive the 48h rotation cadence.
//! - [`managers`] and [`reconcile`] implement the metadata-diff dispatch
//!   loop.
//! - [`hostname`] owns the hosts-file/hostname reconfigure operation.
//!
//! [`error::AgentError`] composes every component's error type at the
//! points where more than one subsystem's failures flow through a single
//! `Result` (the scheduler, the reconciliation loop, the binary entrypoint).

pub mod config;
pub mod credential_job;
pub mod crypto;
pub mod error;
pub mod firmware;
pub mod hostname;
pub mod managers;
pub mod metadata;
pub mod netif;
pub mod paths;
pub mod process;
pub mod reconcile;
pub mod scheduler;
pub mod tpm;
pub mod trust_store;

pub use error::AgentError;
