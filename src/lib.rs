#![doc(test(attr(deny(warnings))))]

//! Ledger Engine records business transactions as balanced double-entry postings into a
//! period-bucketed general ledger and derives the trial balance, balance sheet, income
//! statement, and cash-flow statement on demand.

pub mod chart;
pub mod cli;
pub mod config;
pub mod currency;
pub mod engine;
pub mod errors;
pub mod events;
pub mod gl;
pub mod journal;
pub mod reconcile;
pub mod reversal;
pub mod statements;
pub mod time;
pub mod utils;

pub use engine::LedgerEngine;
pub use errors::{LedgerError, Result};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Ledger engine tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
    }
}
