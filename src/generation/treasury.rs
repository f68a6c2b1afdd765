use crate::error::{LedgerError, LedgerResult};
use crate::generation::GenerationContext;
use crate::ledger_utils::change_extraction::{CHANGE_VOUT, PAYMENT_VOUT};
use crate::ledger_utils::utxo_ledger::{Utxo, UtxoLedger};
use crate::tx_event::{OutPoint, TxKind, TxOutput, TxRecord};
use crate::wallet::WalletId;
use rand::Rng;

/// Large treasury payments to outside recipients, followed by quarterly external deposits.
/// A payment treasury can't cover is skipped.
pub fn generate_treasury_transactions<R: Rng>(
    ctx: &mut GenerationContext<'_, R>,
    ledger: &mut UtxoLedger,
) -> LedgerResult<Vec<TxRecord>> {
    let settings = ctx.config;
    let config = &settings.treasury;
    let mut height = ledger.next_block_height();
    let mut records = vec![];

    for (index, month) in config.outgoing_months.iter().enumerate() {
        let day = ctx.rng.gen_range(1..=config.max_day);
        let date = ctx.scheduled_date(*month, day)?;
        let usd = ctx
            .rng
            .gen_range(config.outgoing_usd.min..config.outgoing_usd.max);
        let (quote, sats) = ctx.quote(usd, date)?;
        let txid = format!("treasury_outgoing_{index}");

        let selection = match ledger.select_for_amount(WalletId::Treasury, sats) {
            Ok(selection) => selection,
            Err(err @ LedgerError::InsufficientFunds { .. }) => {
                tracing::warn!("skipping {} of {:.2} USD: {}", txid, usd, err);
                continue;
            }
            Err(err) => return Err(err),
        };

        let inputs = selection.pointers();
        ledger.spend(WalletId::Treasury, &inputs)?;

        let change_sats = selection.change_for(sats);
        let change = if change_sats > 0 {
            let address = ctx.random_address(WalletId::Treasury);
            ledger.add(
                WalletId::Treasury,
                Utxo {
                    pointer: OutPoint::new(txid.clone(), CHANGE_VOUT),
                    amount: change_sats,
                    address: address.clone(),
                    block_height: height,
                },
            )?;
            Some(TxOutput::new(address, change_sats))
        } else {
            None
        };

        tracing::debug!(
            "{}: {} sats from {} inputs, {} sats change",
            txid,
            sats,
            inputs.len(),
            change_sats
        );

        records.push(TxRecord {
            txid,
            date,
            block_height: height,
            kind: TxKind::TreasuryOutgoing {
                inputs,
                quote,
                output: TxOutput::new(format!("external_recipient_{index}"), sats),
                change,
            },
        });
        height += ctx.height_step();
    }

    for (index, incoming) in config.incoming.iter().enumerate() {
        let day = ctx.rng.gen_range(1..=config.max_day);
        // middle month of the quarter
        let date = ctx.scheduled_date(incoming.quarter * 3 - 1, day)?;
        let (quote, sats) = ctx.quote(incoming.usd, date)?;
        let address = ctx.random_address(WalletId::Treasury);
        let txid = format!("treasury_incoming_{index}");

        ledger.add(
            WalletId::Treasury,
            Utxo {
                pointer: OutPoint::new(txid.clone(), PAYMENT_VOUT),
                amount: sats,
                address: address.clone(),
                block_height: height,
            },
        )?;

        records.push(TxRecord {
            txid,
            date,
            block_height: height,
            kind: TxKind::TreasuryIncoming {
                source: OutPoint::new(format!("external_source_{index}"), 0),
                quote,
                output: TxOutput::new(address, sats),
            },
        });
        height += ctx.height_step();
    }

    tracing::info!(
        "Generated {} special treasury transactions, wallet {} holds {} sats",
        records.len(),
        WalletId::Treasury,
        ledger.balance(WalletId::Treasury)
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use crate::generation::test_utils::{flat_rates, fund, registry, small_config};
    use crate::generation::treasury::generate_treasury_transactions;
    use crate::generation::GenerationContext;
    use crate::ledger_utils::utxo_ledger::UtxoLedger;
    use crate::tx_event::{OutPoint, TxType};
    use crate::wallet::{Party, WalletId};
    use chrono::Datelike;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn outgoing_then_incoming() {
        let config = small_config();
        let wallets = registry(&config);
        let rates = flat_rates();
        let mut rng = StdRng::seed_from_u64(42);
        let mut ctx = GenerationContext::new(&config, &wallets, &rates, &mut rng);
        let mut ledger = UtxoLedger::default();
        for index in 0..40 {
            fund(&mut ledger, WalletId::Treasury, &format!("funding_{index}"), 100_000_000, index);
        }
        let funded = ledger.balance(WalletId::Treasury);

        let records = generate_treasury_transactions(&mut ctx, &mut ledger).unwrap();
        assert_eq!(records.len(), 7);

        let outgoing = &records[..5];
        for (index, (record, month)) in outgoing.iter().zip([2u32, 4, 6, 8, 10]).enumerate() {
            assert_eq!(record.tx_type(), TxType::TreasuryOutgoing);
            assert_eq!(record.txid, format!("treasury_outgoing_{index}"));
            assert_eq!(record.date.month(), month);
            assert!(record.date.day() <= 28);
            assert_eq!(record.source(), Party::Wallet(WalletId::Treasury));
            assert_eq!(record.destination(), Party::External);
            assert_eq!(record.output().address, format!("external_recipient_{index}"));
            // 50k-300k USD at 50k USD/BTC: one to six whole funding outputs
            let sats = record.output().sats;
            assert!(sats >= 100_000_000 && sats < 600_000_000);
            let inputs = record.inputs();
            assert_eq!(inputs.len() as u64, (sats + 99_999_999) / 100_000_000);
            if let Some(change) = record.change() {
                assert_eq!(wallets.owner_of(&change.address), Ok(WalletId::Treasury));
                assert_eq!(change.sats, inputs.len() as u64 * 100_000_000 - sats);
            }
        }

        let incoming = &records[5..];
        assert_eq!(incoming[0].txid, "treasury_incoming_0");
        assert_eq!(incoming[0].date.month(), 2);
        assert_eq!(incoming[0].output().sats, 200_000_000);
        assert_eq!(incoming[0].inputs(), vec![OutPoint::new("external_source_0", 0)]);
        assert_eq!(incoming[0].source(), Party::External);
        assert_eq!(incoming[1].date.month(), 8);
        assert_eq!(incoming[1].output().sats, 400_000_000);

        let paid: u64 = outgoing.iter().map(|tx| tx.output().sats).sum();
        assert_eq!(
            ledger.balance(WalletId::Treasury),
            funded - paid + 600_000_000
        );
        assert_eq!(records[0].block_height, 40);
        assert!(records
            .windows(2)
            .all(|pair| pair[0].block_height < pair[1].block_height));
    }

    #[test]
    fn unaffordable_payments_are_skipped() {
        let config = small_config();
        let wallets = registry(&config);
        let rates = flat_rates();
        let mut rng = StdRng::seed_from_u64(42);
        let mut ctx = GenerationContext::new(&config, &wallets, &rates, &mut rng);
        let mut ledger = UtxoLedger::default();
        fund(&mut ledger, WalletId::Treasury, "funding", 50_000_000, 3);

        let records = generate_treasury_transactions(&mut ctx, &mut ledger).unwrap();
        // half a BTC never covers 50k USD at 50k USD/BTC; only the deposits happen
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|tx| tx.tx_type() == TxType::TreasuryIncoming));
        assert_eq!(ledger.balance(WalletId::Treasury), 650_000_000);
        assert!(!ledger.is_spent(&OutPoint::new("funding", 0)));
    }
}
