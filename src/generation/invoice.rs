use crate::error::LedgerResult;
use crate::generation::GenerationContext;
use crate::ledger_utils::utxo_ledger::{Utxo, UtxoLedger};
use crate::tx_event::{OutPoint, TxKind, TxOutput, TxRecord};
use crate::wallet::WalletId;
use rand::Rng;

/// Customer payments into the invoicing wallet. Invoices are drawn in index order, then sorted
/// by date, and only then given heights and minted, so heights follow the calendar.
pub fn generate_invoices<R: Rng>(
    ctx: &mut GenerationContext<'_, R>,
    ledger: &mut UtxoLedger,
) -> LedgerResult<Vec<TxRecord>> {
    let settings = ctx.config;
    let (start, end) = (settings.start_date, settings.end_date);
    let config = &settings.invoice;

    let mut invoices = Vec::with_capacity(config.count);
    for index in 0..config.count {
        let date = ctx.random_date(start, end);
        let usd = ctx.rng.gen_range(config.usd.min..config.usd.max);
        let (quote, sats) = ctx.quote(usd, date)?;
        let address = ctx.random_address(WalletId::Invoicing);

        invoices.push(TxRecord {
            txid: format!("invoice_{index}"),
            date,
            block_height: 0,
            kind: TxKind::Invoice {
                quote,
                output: TxOutput::new(address, sats),
            },
        });
    }

    invoices.sort_by_key(|invoice| invoice.date);

    for (position, invoice) in invoices.iter_mut().enumerate() {
        invoice.block_height = config.first_block_height + position as u64;
        let output = invoice.output();
        ledger.add(
            WalletId::Invoicing,
            Utxo {
                pointer: OutPoint::new(invoice.txid.clone(), 0),
                amount: output.sats,
                address: output.address.clone(),
                block_height: invoice.block_height,
            },
        )?;
    }

    tracing::info!(
        "Generated {} invoices, {} sats received by wallet {}",
        invoices.len(),
        ledger.balance(WalletId::Invoicing),
        WalletId::Invoicing
    );

    Ok(invoices)
}
