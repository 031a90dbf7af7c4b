//! Payme Ledger - merchant-side payment provider integration
//!
//! Receives Payme JSON-RPC callbacks and settles tuition payments into a
//! per-student ledger, exactly once per provider transaction.
//!
//! # Modules
//!
//! - [`payment`] - Transaction FSM, account resolution, ledger, statements
//! - [`protocol`] - JSON-RPC envelope, typed params and results
//! - [`gateway`] - axum HTTP server
//! - [`auth`] - Merchant Basic-Auth credentials
//! - [`notify`] - Outbound payment notifications
//! - [`db`] - PostgreSQL pool and schema
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod logging;

// Persistence
pub mod db;

// Core
pub mod payment;

// Surfaces
pub mod auth;
pub mod gateway;
pub mod notify;
pub mod protocol;

// Convenient re-exports
pub use payment::{PaymentError, TransactionState, TransactionStateMachine};
