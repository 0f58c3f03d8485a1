//! Error handling foundation for relaydesk.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error enums in its own
//! error module and converts them into a `Report` at crate boundaries.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
