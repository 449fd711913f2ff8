//! Library entrypoint for trade-journal.
//!
//! Exposes all modules so integration tests can import them.

pub mod config;
pub mod data;
pub mod errors;
pub mod journal;
pub mod storage;
pub mod take_profit;
