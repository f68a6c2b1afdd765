use crate::error::{LedgerError, LedgerResult};
use crate::ledger_utils::utxo_ledger::UtxoLedger;
use crate::tx_event::{TxKind, TxRecord};
use crate::wallet::WalletId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Final state of a wallet as written to `balances.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub utxo_count: usize,
    pub balance_sats: u64,
    pub received_sats: u64,
    pub spent_sats: u64,
}

/// Gross received/spent totals per tracked wallet, fed one transaction at a time.
/// Change counts as both spent (inside the inputs) and received.
#[derive(Default)]
pub struct BalanceAccumulator {
    received_by_wallet: HashMap<WalletId, u64>,
    spent_by_wallet: HashMap<WalletId, u64>,
}

impl BalanceAccumulator {
    pub fn get_received(&self, wallet: WalletId) -> u64 {
        self.received_by_wallet.get(&wallet).copied().unwrap_or_default()
    }

    pub fn get_spent(&self, wallet: WalletId) -> u64 {
        self.spent_by_wallet.get(&wallet).copied().unwrap_or_default()
    }

    pub fn get_balance(&self, wallet: WalletId) -> i128 {
        self.get_received(wallet) as i128 - self.get_spent(wallet) as i128
    }

    pub fn add_received(&mut self, wallet: WalletId, sats: u64) {
        *self.received_by_wallet.entry(wallet).or_default() += sats;
    }

    pub fn add_spent(&mut self, wallet: WalletId, sats: u64) {
        *self.spent_by_wallet.entry(wallet).or_default() += sats;
    }

    /// Inputs always equal outputs, so a tracked source spends exactly what the transaction pays
    /// out. A bootstrap transfer first receives its synthetic input from outside.
    pub fn add_transaction(&mut self, record: &TxRecord) {
        let output = record.output();
        let change = record.change().map(|change| change.sats).unwrap_or_default();

        if let Some(source) = record.source().wallet() {
            if let TxKind::Transfer {
                bootstrap: true, ..
            } = record.kind
            {
                self.add_received(source, output.sats + change);
            }
            self.add_spent(source, output.sats + change);
            if change > 0 {
                self.add_received(source, change);
            }
        }

        if let Some(destination) = record.destination().wallet() {
            self.add_received(destination, output.sats);
        }
    }

    pub fn check_conservation(&self, ledger: &UtxoLedger) -> LedgerResult<()> {
        for wallet in WalletId::ALL {
            let running = self.get_balance(wallet);
            let live = ledger.balance(wallet);
            if running != live as i128 {
                return Err(LedgerError::ConservationViolated {
                    wallet,
                    ledger: live,
                    running,
                });
            }
        }
        Ok(())
    }

    pub fn wallet_balances(&self, ledger: &UtxoLedger) -> BTreeMap<WalletId, WalletBalance> {
        WalletId::ALL
            .into_iter()
            .map(|wallet| {
                (
                    wallet,
                    WalletBalance {
                        utxo_count: ledger.utxos(wallet).len(),
                        balance_sats: ledger.balance(wallet),
                        received_sats: self.get_received(wallet),
                        spent_sats: self.get_spent(wallet),
                    },
                )
            })
            .collect()
    }
}
