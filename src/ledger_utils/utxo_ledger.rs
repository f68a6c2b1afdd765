use crate::error::{LedgerError, LedgerResult};
use crate::ledger_utils::coin_selection::{select_largest_first, Selection};
use crate::tx_event::OutPoint;
use crate::wallet::WalletId;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Utxo {
    pub pointer: OutPoint,
    pub amount: u64,
    pub address: String,
    pub block_height: u64,
}

/// Live outputs per wallet, kept in insertion order. Every pointer ever added is remembered so
/// that neither a re-add nor a second spend can go unnoticed.
#[derive(Default)]
pub struct UtxoLedger {
    utxos_by_wallet: BTreeMap<WalletId, Vec<Utxo>>,
    known_pointers: HashSet<OutPoint>,
    spent_pointers: HashSet<OutPoint>,
    tip_height: Option<u64>,
}

impl UtxoLedger {
    pub fn add(&mut self, wallet: WalletId, utxo: Utxo) -> LedgerResult<()> {
        if !self.known_pointers.insert(utxo.pointer.clone()) {
            return Err(LedgerError::DuplicateOutput(utxo.pointer));
        }
        self.tip_height = Some(
            self.tip_height
                .map_or(utxo.block_height, |tip| tip.max(utxo.block_height)),
        );
        self.utxos_by_wallet.entry(wallet).or_default().push(utxo);
        Ok(())
    }

    /// Drops every live output of `wallet` created by `txid`. Nothing happens if there is none,
    /// so callers have to know themselves whether the outputs were already spent.
    pub fn remove(&mut self, wallet: WalletId, txid: &str) -> Vec<Utxo> {
        let utxos = match self.utxos_by_wallet.get_mut(&wallet) {
            None => return vec![],
            Some(utxos) => utxos,
        };
        let (removed, kept): (Vec<Utxo>, Vec<Utxo>) = utxos
            .drain(..)
            .partition(|utxo| utxo.pointer.txid == txid);
        *utxos = kept;
        for utxo in removed.iter() {
            self.spent_pointers.insert(utxo.pointer.clone());
        }
        removed
    }

    /// Consumes exactly the given outputs. Every pointer is checked before anything is removed.
    pub fn spend(&mut self, wallet: WalletId, pointers: &[OutPoint]) -> LedgerResult<Vec<Utxo>> {
        let mut seen = HashSet::new();
        for pointer in pointers.iter() {
            if !seen.insert(pointer) || self.spent_pointers.contains(pointer) {
                return Err(LedgerError::DoubleSpend(pointer.clone()));
            }
            if self.find(wallet, pointer).is_none() {
                return Err(LedgerError::MissingOutput(pointer.clone(), wallet));
            }
        }

        let utxos = self.utxos_by_wallet.entry(wallet).or_default();
        let (spent, kept): (Vec<Utxo>, Vec<Utxo>) = utxos
            .drain(..)
            .partition(|utxo| seen.contains(&utxo.pointer));
        *utxos = kept;
        for utxo in spent.iter() {
            self.spent_pointers.insert(utxo.pointer.clone());
        }
        Ok(spent)
    }

    pub fn find(&self, wallet: WalletId, pointer: &OutPoint) -> Option<&Utxo> {
        self.utxos(wallet)
            .iter()
            .find(|utxo| &utxo.pointer == pointer)
    }

    pub fn utxos(&self, wallet: WalletId) -> &[Utxo] {
        self.utxos_by_wallet
            .get(&wallet)
            .map(|utxos| utxos.as_slice())
            .unwrap_or_default()
    }

    pub fn balance(&self, wallet: WalletId) -> u64 {
        self.utxos(wallet).iter().map(|utxo| utxo.amount).sum()
    }

    pub fn is_spent(&self, pointer: &OutPoint) -> bool {
        self.spent_pointers.contains(pointer)
    }

    /// Greedy largest-first selection over the wallet's live outputs.
    pub fn select_for_amount(&self, wallet: WalletId, target: u64) -> LedgerResult<Selection> {
        let available = self.utxos(wallet);
        select_largest_first(available, target).ok_or_else(|| LedgerError::InsufficientFunds {
            wallet,
            required: target,
            available: available.iter().map(|utxo| utxo.amount).sum(),
        })
    }

    pub fn tip_height(&self) -> Option<u64> {
        self.tip_height
    }

    /// Height right above everything the ledger has seen so far.
    pub fn next_block_height(&self) -> u64 {
        self.tip_height.map_or(0, |tip| tip + 1)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LedgerError;
    use crate::ledger_utils::utxo_ledger::{Utxo, UtxoLedger};
    use crate::tx_event::OutPoint;
    use crate::wallet::WalletId;

    fn generate_utxo(txid: &str, vout: u32, amount: u64, height: u64) -> Utxo {
        Utxo {
            pointer: OutPoint::new(txid, vout),
            amount,
            address: format!("addr_{txid}"),
            block_height: height,
        }
    }

    #[test]
    fn can_add_outputs() {
        let mut ledger = UtxoLedger::default();
        ledger
            .add(WalletId::Invoicing, generate_utxo("invoice_0", 0, 100, 100))
            .unwrap();
        ledger
            .add(WalletId::Invoicing, generate_utxo("invoice_1", 0, 250, 101))
            .unwrap();
        ledger
            .add(WalletId::Treasury, generate_utxo("consolidation_0_0", 0, 7, 110))
            .unwrap();

        assert_eq!(ledger.utxos(WalletId::Invoicing).len(), 2);
        assert_eq!(ledger.balance(WalletId::Invoicing), 350);
        assert_eq!(ledger.balance(WalletId::Treasury), 7);
        assert_eq!(ledger.balance(WalletId::Checking), 0);
        assert_eq!(ledger.tip_height(), Some(110));
        assert_eq!(ledger.next_block_height(), 111);

        let result = ledger.add(WalletId::Treasury, generate_utxo("invoice_0", 0, 1, 1));
        assert_eq!(
            result,
            Err(LedgerError::DuplicateOutput(OutPoint::new("invoice_0", 0)))
        );
    }

    #[test]
    fn remove_by_txid_is_silent_when_absent() {
        let mut ledger = UtxoLedger::default();
        ledger
            .add(WalletId::Treasury, generate_utxo("treasury_to_checking", 1, 40, 5))
            .unwrap();
        ledger
            .add(WalletId::Checking, generate_utxo("treasury_to_checking", 0, 60, 5))
            .unwrap();

        let removed = ledger.remove(WalletId::Treasury, "treasury_to_checking");
        assert_eq!(removed.len(), 1);
        assert_eq!(ledger.balance(WalletId::Treasury), 0);
        // the checking output of the same transaction is untouched
        assert_eq!(ledger.balance(WalletId::Checking), 60);
        assert!(ledger.is_spent(&OutPoint::new("treasury_to_checking", 1)));

        assert!(ledger.remove(WalletId::Treasury, "treasury_to_checking").is_empty());
        assert!(ledger.remove(WalletId::Invoicing, "nothing").is_empty());
    }

    #[test]
    fn spend_checks_before_mutating() {
        let mut ledger = UtxoLedger::default();
        ledger
            .add(WalletId::Invoicing, generate_utxo("invoice_0", 0, 100, 100))
            .unwrap();
        ledger
            .add(WalletId::Invoicing, generate_utxo("invoice_1", 0, 200, 101))
            .unwrap();

        let missing = ledger.spend(
            WalletId::Invoicing,
            &[OutPoint::new("invoice_0", 0), OutPoint::new("invoice_9", 0)],
        );
        assert_eq!(
            missing,
            Err(LedgerError::MissingOutput(
                OutPoint::new("invoice_9", 0),
                WalletId::Invoicing
            ))
        );
        assert_eq!(ledger.balance(WalletId::Invoicing), 300);

        let twice = ledger.spend(
            WalletId::Invoicing,
            &[OutPoint::new("invoice_0", 0), OutPoint::new("invoice_0", 0)],
        );
        assert_eq!(
            twice,
            Err(LedgerError::DoubleSpend(OutPoint::new("invoice_0", 0)))
        );
        assert_eq!(ledger.balance(WalletId::Invoicing), 300);

        let spent = ledger
            .spend(WalletId::Invoicing, &[OutPoint::new("invoice_0", 0)])
            .unwrap();
        assert_eq!(spent.len(), 1);
        assert_eq!(ledger.balance(WalletId::Invoicing), 200);

        let again = ledger.spend(WalletId::Invoicing, &[OutPoint::new("invoice_0", 0)]);
        assert_eq!(
            again,
            Err(LedgerError::DoubleSpend(OutPoint::new("invoice_0", 0)))
        );
    }

    #[test]
    fn wrong_wallet_cannot_spend() {
        let mut ledger = UtxoLedger::default();
        ledger
            .add(WalletId::Treasury, generate_utxo("consolidation_0_0", 0, 100, 1))
            .unwrap();
        let result = ledger.spend(WalletId::Checking, &[OutPoint::new("consolidation_0_0", 0)]);
        assert!(matches!(result, Err(LedgerError::MissingOutput(_, WalletId::Checking))));
        assert_eq!(ledger.balance(WalletId::Treasury), 100);
    }

    #[test]
    fn selection_reports_insufficient_funds() {
        let mut ledger = UtxoLedger::default();
        ledger
            .add(WalletId::Treasury, generate_utxo("a", 0, 30, 1))
            .unwrap();
        ledger
            .add(WalletId::Treasury, generate_utxo("b", 0, 50, 2))
            .unwrap();

        let selection = ledger.select_for_amount(WalletId::Treasury, 60).unwrap();
        assert_eq!(selection.total, 80);
        // selection alone doesn't spend anything
        assert_eq!(ledger.balance(WalletId::Treasury), 80);

        assert_eq!(
            ledger.select_for_amount(WalletId::Treasury, 81),
            Err(LedgerError::InsufficientFunds {
                wallet: WalletId::Treasury,
                required: 81,
                available: 80,
            })
        );
    }
}
