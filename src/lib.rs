pub mod config;
pub mod error;
pub mod exchange_rate;
pub mod generation;
pub mod ledger_utils;
pub mod simulation;
pub mod tx_event;
pub mod wallet;
