pub mod address_mapper;
pub mod balance_accumulator;
pub mod balance_verification;
pub mod change_extraction;
pub mod coin_selection;
pub mod output_utils;
pub mod stats_accumulator;
pub mod utxo_ledger;
