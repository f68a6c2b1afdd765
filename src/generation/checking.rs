use crate::error::{LedgerError, LedgerResult};
use crate::generation::GenerationContext;
use crate::ledger_utils::change_extraction::{CHANGE_VOUT, PAYMENT_VOUT};
use crate::ledger_utils::utxo_ledger::{Utxo, UtxoLedger};
use crate::tx_event::{OutPoint, TxKind, TxOutput, TxRecord};
use crate::wallet::WalletId;
use rand::Rng;

pub const TRANSFER_TXID: &str = "treasury_to_checking";
pub const BOOTSTRAP_TXID: &str = "bootstrap_treasury_utxo";

/// Funds the checking wallet from treasury, then pays vendors out of it. Every vendor payment
/// spends the change of the previous one, so checking holds a single output throughout.
pub fn generate_checking_transactions<R: Rng>(
    ctx: &mut GenerationContext<'_, R>,
    ledger: &mut UtxoLedger,
) -> LedgerResult<Vec<TxRecord>> {
    let settings = ctx.config;
    let config = &settings.checking;
    let checking_address = ctx
        .wallets
        .wallet(WalletId::Checking)
        .first_address()
        .to_string();

    let mut height = ledger.next_block_height();
    let transfer_date = ctx.scheduled_date(config.transfer_month, config.transfer_day)?;

    let (selection, bootstrap) = match ledger.select_for_amount(WalletId::Treasury, config.transfer_sats)
    {
        Ok(selection) => (selection, false),
        Err(LedgerError::InsufficientFunds { available, .. }) if config.allow_bootstrap_utxo => {
            let amount = config.transfer_sats * 2;
            tracing::warn!(
                "wallet {} holds {} sats, below the {} sats transfer; injecting {} of {} sats",
                WalletId::Treasury,
                available,
                config.transfer_sats,
                BOOTSTRAP_TXID,
                amount
            );
            ledger.add(
                WalletId::Treasury,
                Utxo {
                    pointer: OutPoint::new(BOOTSTRAP_TXID, 0),
                    amount,
                    address: ctx.wallets.wallet(WalletId::Treasury).first_address().to_string(),
                    block_height: height.saturating_sub(1),
                },
            )?;
            (ledger.select_for_amount(WalletId::Treasury, config.transfer_sats)?, true)
        }
        Err(err) => return Err(err),
    };

    let inputs = selection.pointers();
    ledger.spend(WalletId::Treasury, &inputs)?;
    ledger.add(
        WalletId::Checking,
        Utxo {
            pointer: OutPoint::new(TRANSFER_TXID, PAYMENT_VOUT),
            amount: config.transfer_sats,
            address: checking_address.clone(),
            block_height: height,
        },
    )?;

    let change_sats = selection.change_for(config.transfer_sats);
    let change = if change_sats > 0 {
        let address = selection
            .largest_input_address()
            .map(|address| address.to_string())
            .unwrap_or_else(|| {
                ctx.wallets
                    .wallet(WalletId::Treasury)
                    .first_address()
                    .to_string()
            });
        ledger.add(
            WalletId::Treasury,
            Utxo {
                pointer: OutPoint::new(TRANSFER_TXID, CHANGE_VOUT),
                amount: change_sats,
                address: address.clone(),
                block_height: height,
            },
        )?;
        Some(TxOutput::new(address, change_sats))
    } else {
        None
    };

    let mut records = vec![TxRecord {
        txid: TRANSFER_TXID.to_string(),
        date: transfer_date,
        block_height: height,
        kind: TxKind::Transfer {
            inputs,
            output: TxOutput::new(checking_address.clone(), config.transfer_sats),
            change,
            bootstrap,
        },
    }];
    height += ctx.height_step();

    let mut current = OutPoint::new(TRANSFER_TXID, PAYMENT_VOUT);
    let first_vendor_day = transfer_date
        .succ_opt()
        .unwrap_or(transfer_date)
        .min(settings.end_date);

    for index in 0..config.vendor_payments {
        let date = ctx.random_date(first_vendor_day, settings.end_date);
        let usd = ctx
            .rng
            .gen_range(config.vendor_usd.min..config.vendor_usd.max);
        let (quote, sats) = ctx.quote(usd, date)?;

        let available = ledger
            .find(WalletId::Checking, &current)
            .map(|utxo| utxo.amount)
            .unwrap_or_default();
        if available < sats {
            tracing::warn!(
                "skipping vendor_payment_{}: {}",
                index,
                LedgerError::InsufficientFunds {
                    wallet: WalletId::Checking,
                    required: sats,
                    available,
                }
            );
            continue;
        }

        let txid = format!("vendor_payment_{index}");
        ledger.spend(WalletId::Checking, &[current.clone()])?;
        let input = current.clone();

        let residual = available - sats;
        let change = if residual > 0 {
            current = OutPoint::new(txid.clone(), CHANGE_VOUT);
            ledger.add(
                WalletId::Checking,
                Utxo {
                    pointer: current.clone(),
                    amount: residual,
                    address: checking_address.clone(),
                    block_height: height,
                },
            )?;
            Some(TxOutput::new(checking_address.clone(), residual))
        } else {
            None
        };

        records.push(TxRecord {
            txid,
            date,
            block_height: height,
            kind: TxKind::VendorPayment {
                input,
                quote,
                output: TxOutput::new(format!("vendor_{index}"), sats),
                change,
            },
        });
        height += ctx.height_step();
    }

    tracing::info!(
        "Generated {} checking transactions (transfer{}), wallet {} left with {} sats",
        records.len(),
        if bootstrap { " from bootstrap funds" } else { "" },
        WalletId::Checking,
        ledger.balance(WalletId::Checking)
    );

    Ok(records)
}
