use crate::error::LedgerResult;
use crate::generation::GenerationContext;
use crate::ledger_utils::utxo_ledger::{Utxo, UtxoLedger};
use crate::tx_event::{OutPoint, TxKind, TxOutput, TxRecord};
use crate::wallet::WalletId;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

/// Two-month windows counted from January of `start_year`: 0 is Jan-Feb, 5 is Nov-Dec,
/// 6 is Jan-Feb of the following year.
pub fn window_index(start_year: i32, date: NaiveDate) -> u32 {
    let years = (date.year() - start_year).max(0) as u32;
    years * 6 + date.month0() / 2
}

fn is_year_end_window(window: u32) -> bool {
    window % 6 == 5
}

/// Last calendar day of the window.
pub fn window_end_date(start_year: i32, window: u32) -> Option<NaiveDate> {
    let year = start_year + (window / 6) as i32;
    let last_month = (window % 6) * 2 + 2;
    match last_month {
        12 => NaiveDate::from_ymd_opt(year, 12, 31),
        month => NaiveDate::from_ymd_opt(year, month + 1, 1).and_then(|date| date.pred_opt()),
    }
}

/// `chunks` consecutive slices whose lengths differ by at most one, the longer ones first.
/// Some slices are empty when there are fewer items than chunks.
pub fn split_near_equal<T>(items: &[T], chunks: usize) -> Vec<&[T]> {
    let chunks = chunks.max(1);
    let base = items.len() / chunks;
    let extra = items.len() % chunks;

    let mut result = Vec::with_capacity(chunks);
    let mut offset = 0;
    for index in 0..chunks {
        let len = base + usize::from(index < extra);
        result.push(&items[offset..offset + len]);
        offset += len;
    }
    result
}

/// Sweeps the invoicing wallet into treasury, one batch of transactions per two-month window.
pub fn generate_consolidations<R: Rng>(
    ctx: &mut GenerationContext<'_, R>,
    ledger: &mut UtxoLedger,
    invoices: &[TxRecord],
) -> LedgerResult<Vec<TxRecord>> {
    let settings = ctx.config;
    let start_year = settings.start_date.year();
    let invoice_dates: HashMap<&str, NaiveDate> = invoices
        .iter()
        .map(|invoice| (invoice.txid.as_str(), invoice.date))
        .collect();

    let mut windows: BTreeMap<u32, Vec<Utxo>> = BTreeMap::new();
    for utxo in ledger.utxos(WalletId::Invoicing) {
        match invoice_dates.get(utxo.pointer.txid.as_str()) {
            Some(date) => windows
                .entry(window_index(start_year, *date))
                .or_default()
                .push(utxo.clone()),
            None => tracing::warn!("no invoice found for {}, left unconsolidated", utxo.pointer),
        }
    }

    let mut height = ledger.next_block_height();
    let mut consolidations = vec![];

    for (window, utxos) in windows.iter() {
        let chunks = if is_year_end_window(*window) {
            settings.consolidation.year_end_chunks
        } else {
            settings.consolidation.chunks_per_window
        };
        let date = window_end_date(start_year, *window)
            .unwrap_or(settings.end_date)
            .min(settings.end_date);

        tracing::debug!(
            "window {} ({}): {} utxos in {} chunks",
            window,
            date,
            utxos.len(),
            chunks
        );

        for (chunk_index, chunk) in split_near_equal(utxos, chunks).into_iter().enumerate() {
            if chunk.is_empty() {
                continue;
            }

            let txid = format!("consolidation_{window}_{chunk_index}");
            let inputs: Vec<OutPoint> = chunk.iter().map(|utxo| utxo.pointer.clone()).collect();
            let total: u64 = chunk.iter().map(|utxo| utxo.amount).sum();
            let address = ctx.random_address(WalletId::Treasury);

            ledger.spend(WalletId::Invoicing, &inputs)?;
            ledger.add(
                WalletId::Treasury,
                Utxo {
                    pointer: OutPoint::new(txid.clone(), 0),
                    amount: total,
                    address: address.clone(),
                    block_height: height,
                },
            )?;

            consolidations.push(TxRecord {
                txid,
                date,
                block_height: height,
                kind: TxKind::Consolidation {
                    inputs,
                    output: TxOutput::new(address, total),
                },
            });
            height += ctx.height_step();
        }
    }

    tracing::info!(
        "Generated {} consolidations over {} windows, wallet {} holds {} sats in {} utxos",
        consolidations.len(),
        windows.len(),
        WalletId::Treasury,
        ledger.balance(WalletId::Treasury),
        ledger.utxos(WalletId::Treasury).len()
    );

    Ok(consolidations)
}
