use crate::tx_event::OutPoint;
use crate::wallet::WalletId;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds in wallet {wallet}: required {required} sats, available {available} sats")]
    InsufficientFunds {
        wallet: WalletId,
        required: u64,
        available: u64,
    },

    #[error("address or wallet is not tracked: {0}")]
    UnknownWallet(String),

    #[error("no exchange rate available for {0}")]
    DateOutOfRange(NaiveDate),

    #[error("not a calendar date: {year}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("output already exists: {0}")]
    DuplicateOutput(OutPoint),

    #[error("output is spent more than once: {0}")]
    DoubleSpend(OutPoint),

    #[error("output {0} is not a live output of wallet {1}")]
    MissingOutput(OutPoint, WalletId),

    #[error("wallet {wallet} balance {ledger} sats doesn't match running balance {running} sats")]
    ConservationViolated {
        wallet: WalletId,
        ledger: u64,
        running: i128,
    },

    #[error("transaction {txid} is not balanced: inputs {inputs} sats, outputs {outputs} sats")]
    UnbalancedTransaction {
        txid: String,
        inputs: u64,
        outputs: u64,
    },

    #[error("block height goes backwards at {txid}: {height} after {previous}")]
    NonMonotonicHeight {
        txid: String,
        height: u64,
        previous: u64,
    },
}

pub type LedgerResult<T> = Result<T, LedgerError>;
