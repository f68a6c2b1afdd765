use crate::error::{LedgerError, LedgerResult};
use crate::ledger_utils::address_mapper::AddressMapper;
use crate::ledger_utils::balance_accumulator::WalletBalance;
use crate::ledger_utils::change_extraction::extract_changes;
use crate::tx_event::{OutPoint, TxDocument, TxType};
use crate::wallet::{Party, WalletId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// No fees in this ledger: whatever goes in comes out.
pub fn verify_io_balance(txid: &str, inputs: u64, outputs: u64) -> LedgerResult<()> {
    if inputs != outputs {
        return Err(LedgerError::UnbalancedTransaction {
            txid: txid.to_string(),
            inputs,
            outputs,
        });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayReport {
    pub transactions: usize,
    pub balances: BTreeMap<WalletId, WalletBalance>,
}

/// Replays a transaction log in order, checking every input against the outputs created
/// before it. Invoices, `treasury_incoming` and flagged bootstrap transactions are funded from
/// outside the ledger.
pub fn verify_documents<Mapper: AddressMapper>(
    documents: &[TxDocument],
    mapper: &Mapper,
) -> LedgerResult<ReplayReport> {
    let mut live: HashMap<OutPoint, (WalletId, u64)> = HashMap::new();
    let mut consumed: HashSet<OutPoint> = HashSet::new();
    let mut balances: BTreeMap<WalletId, WalletBalance> = WalletId::ALL
        .into_iter()
        .map(|wallet| (wallet, WalletBalance::default()))
        .collect();
    let mut previous_height: Option<u64> = None;

    for document in documents.iter() {
        if let Some(previous) = previous_height {
            if document.block_height < previous {
                return Err(LedgerError::NonMonotonicHeight {
                    txid: document.txid.clone(),
                    height: document.block_height,
                    previous,
                });
            }
        }
        previous_height = Some(document.block_height);

        let source = document.source();
        let external_inputs = matches!(
            document.tx_type,
            TxType::Invoice | TxType::TreasuryIncoming
        ) || document.bootstrap;

        let mut inputs_total = 0u64;
        for pointer in document.inputs.iter() {
            if !consumed.insert(pointer.clone()) {
                return Err(LedgerError::DoubleSpend(pointer.clone()));
            }
            match live.remove(pointer) {
                Some((owner, amount)) => {
                    if source != Party::Wallet(owner) {
                        let wallet = source.wallet().unwrap_or(owner);
                        return Err(LedgerError::MissingOutput(pointer.clone(), wallet));
                    }
                    inputs_total += amount;
                    let balance = balances.entry(owner).or_default();
                    balance.spent_sats += amount;
                    balance.utxo_count -= 1;
                }
                None if external_inputs => {}
                None => {
                    let wallet = source
                        .wallet()
                        .ok_or_else(|| LedgerError::UnknownWallet(document.wallet_from.clone()))?;
                    return Err(LedgerError::MissingOutput(pointer.clone(), wallet));
                }
            }
        }

        let outputs = extract_changes(document);
        let outputs_total = outputs.total();

        if external_inputs {
            // whatever the tracked inputs don't cover came from outside
            let external = outputs_total.saturating_sub(inputs_total);
            if let Some(wallet) = source.wallet() {
                let balance = balances.entry(wallet).or_default();
                balance.received_sats += external;
                balance.spent_sats += external;
            }
            inputs_total += external;
        }
        verify_io_balance(&document.txid, inputs_total, outputs_total)?;

        for (pointer, output) in outputs.iter() {
            let owner = match mapper.map_party(&output.address) {
                Party::Wallet(owner) => owner,
                Party::External => continue,
            };
            if consumed.contains(pointer) || live.contains_key(pointer) {
                return Err(LedgerError::DuplicateOutput(pointer.clone()));
            }
            live.insert(pointer.clone(), (owner, output.sats));
            let balance = balances.entry(owner).or_default();
            balance.received_sats += output.sats;
            balance.utxo_count += 1;
        }

        for (wallet, balance) in balances.iter_mut() {
            let running = balance.received_sats as i128 - balance.spent_sats as i128;
            if running < 0 {
                return Err(LedgerError::ConservationViolated {
                    wallet: *wallet,
                    ledger: 0,
                    running,
                });
            }
            balance.balance_sats = running as u64;
        }
    }

    tracing::debug!("replayed {} transactions", documents.len());

    Ok(ReplayReport {
        transactions: documents.len(),
        balances,
    })
}
