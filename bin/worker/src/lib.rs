//! relaydesk automation worker.
//!
//! Loads configuration and fixtures into in-memory stores, wires the
//! automation engine and dispatches inbound events read as JSON lines.

pub mod config;
pub mod error;
pub mod fixtures;
pub mod worker;
