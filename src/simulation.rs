use crate::config::GenerationConfig;
use crate::exchange_rate::ExchangeRateTable;
use crate::generation::{checking, consolidation, invoice, treasury, GenerationContext};
use crate::ledger_utils::address_mapper::AddressBook;
use crate::ledger_utils::balance_accumulator::{BalanceAccumulator, WalletBalance};
use crate::ledger_utils::balance_verification::{verify_documents, ReplayReport};
use crate::ledger_utils::output_utils::{read_json_from_file, OutputWriter};
use crate::ledger_utils::stats_accumulator::{finalize, StatsAccumulator, Summary};
use crate::ledger_utils::utxo_ledger::UtxoLedger;
use crate::tx_event::{TxDocument, TxRecord};
use crate::wallet::{WalletExport, WalletId, WalletRegistry};
use anyhow::{anyhow, ensure, Context};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const WALLETS_FILE: &str = "wallets.json";
pub const EXCHANGE_RATES_FILE: &str = "exchange_rates.json";
pub const ALL_TRANSACTIONS_FILE: &str = "all_transactions.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const FLOWS_FILE: &str = "flows.json";
pub const BALANCES_FILE: &str = "balances.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Invoice,
    Consolidation,
    Checking,
    SpecialTreasury,
}

impl Phase {
    pub fn file_name(&self) -> &'static str {
        match self {
            Phase::Invoice => "invoice_transactions.json",
            Phase::Consolidation => "consolidation_transactions.json",
            Phase::Checking => "checking_transactions.json",
            Phase::SpecialTreasury => "special_treasury_transactions.json",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Invoice => "invoice",
            Phase::Consolidation => "consolidation",
            Phase::Checking => "checking",
            Phase::SpecialTreasury => "special treasury",
        };
        f.write_str(name)
    }
}

pub struct GenerationOutput {
    pub wallets: WalletRegistry,
    pub rates: ExchangeRateTable,
    /// the whole log, ordered by block height
    pub transactions: Vec<TxRecord>,
    pub summary: Summary,
    pub balances: BTreeMap<WalletId, WalletBalance>,
    pub ledger: UtxoLedger,
}

pub fn to_documents(records: &[TxRecord]) -> Vec<TxDocument> {
    records.iter().map(TxRecord::to_document).collect()
}

fn finish_phase<F>(
    phase: Phase,
    records: &[TxRecord],
    ledger: &UtxoLedger,
    balances: &mut BalanceAccumulator,
    on_phase: &mut F,
) -> anyhow::Result<()>
where
    F: FnMut(Phase, &[TxRecord]) -> anyhow::Result<()>,
{
    for record in records.iter() {
        balances.add_transaction(record);
    }
    balances
        .check_conservation(ledger)
        .with_context(|| format!("ledger out of balance after the {} phase", phase))?;
    on_phase(phase, records)
}

/// Runs every phase in order on a single seeded random source. `on_phase` sees each phase's
/// transactions once the phase has completed and the ledger has been checked.
pub fn run_generation_with<F>(
    config: &GenerationConfig,
    mut on_phase: F,
) -> anyhow::Result<GenerationOutput>
where
    F: FnMut(Phase, &[TxRecord]) -> anyhow::Result<()>,
{
    config.validate()?;
    tracing::info!(
        "Generating ledger from {} to {} with seed {}",
        config.start_date,
        config.end_date,
        config.seed
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let rates = ExchangeRateTable::generate(config.start_date, config.end_date, &mut rng)
        .with_max_fallback_days(config.max_rate_fallback_days);
    let wallets = WalletRegistry::create_wallets(&mut rng, config.wallets.pool_sizes());

    let mut ledger = UtxoLedger::default();
    let mut balances = BalanceAccumulator::default();
    let mut all_transactions = vec![];

    {
        let mut ctx = GenerationContext::new(config, &wallets, &rates, &mut rng);

        let invoices = invoice::generate_invoices(&mut ctx, &mut ledger)
            .with_context(|| format!("{} phase failed", Phase::Invoice))?;
        finish_phase(Phase::Invoice, &invoices, &ledger, &mut balances, &mut on_phase)?;

        let consolidations =
            consolidation::generate_consolidations(&mut ctx, &mut ledger, &invoices)
                .with_context(|| format!("{} phase failed", Phase::Consolidation))?;
        finish_phase(
            Phase::Consolidation,
            &consolidations,
            &ledger,
            &mut balances,
            &mut on_phase,
        )?;

        let checking = checking::generate_checking_transactions(&mut ctx, &mut ledger)
            .with_context(|| format!("{} phase failed", Phase::Checking))?;
        finish_phase(Phase::Checking, &checking, &ledger, &mut balances, &mut on_phase)?;

        let special = treasury::generate_treasury_transactions(&mut ctx, &mut ledger)
            .with_context(|| format!("{} phase failed", Phase::SpecialTreasury))?;
        finish_phase(
            Phase::SpecialTreasury,
            &special,
            &ledger,
            &mut balances,
            &mut on_phase,
        )?;

        all_transactions.extend(invoices);
        all_transactions.extend(consolidations);
        all_transactions.extend(checking);
        all_transactions.extend(special);
    }

    let (transactions, summary) = finalize(all_transactions);
    let balances = balances.wallet_balances(&ledger);

    // the log must replay against the registry to the same final state
    let replay = verify_documents(&to_documents(&transactions), &wallets)
        .context("generated ledger doesn't replay")?;
    ensure!(
        replay.balances == balances,
        "replayed balances {:?} differ from the ledger {:?}",
        replay.balances,
        balances
    );

    for (wallet, balance) in balances.iter() {
        tracing::info!(
            "wallet {}: {} sats in {} utxos",
            wallet,
            balance.balance_sats,
            balance.utxo_count
        );
    }
    tracing::info!("Generated {} transactions", summary.total_transactions);

    Ok(GenerationOutput {
        wallets,
        rates,
        transactions,
        summary,
        balances,
        ledger,
    })
}

pub fn run_generation(config: &GenerationConfig) -> anyhow::Result<GenerationOutput> {
    run_generation_with(config, |_, _| Ok(()))
}

/// Generates the ledger and writes every output file into `output_dir`. The files only appear
/// there once the whole run has succeeded.
pub fn generate_to_dir(
    config: &GenerationConfig,
    output_dir: &Path,
) -> anyhow::Result<(GenerationOutput, Vec<PathBuf>)> {
    let mut writer = OutputWriter::new(output_dir)?;

    let output = run_generation_with(config, |phase, records| {
        writer.write(phase.file_name(), &to_documents(records))
    })?;

    writer.write(WALLETS_FILE, &output.wallets.export())?;
    writer.write(EXCHANGE_RATES_FILE, &output.rates.export())?;
    writer.write(ALL_TRANSACTIONS_FILE, &to_documents(&output.transactions))?;
    writer.write(SUMMARY_FILE, &output.summary)?;
    writer.write(FLOWS_FILE, &output.summary.flows)?;
    writer.write(BALANCES_FILE, &output.balances)?;
    let written = writer.commit()?;

    tracing::info!("Wrote {} files to {}", written.len(), output_dir.display());
    Ok((output, written))
}

/// Replays `all_transactions.json` against `wallets.json` and checks that the replayed state
/// matches `balances.json` and `summary.json`.
pub fn verify_output_dir(data_dir: &Path) -> anyhow::Result<ReplayReport> {
    let wallets: BTreeMap<WalletId, WalletExport> =
        read_json_from_file(&data_dir.join(WALLETS_FILE))?;
    let documents: Vec<TxDocument> = read_json_from_file(&data_dir.join(ALL_TRANSACTIONS_FILE))?;
    let balances: BTreeMap<WalletId, WalletBalance> =
        read_json_from_file(&data_dir.join(BALANCES_FILE))?;
    let summary: Summary = read_json_from_file(&data_dir.join(SUMMARY_FILE))?;

    let address_book = AddressBook::from_export(&wallets);
    tracing::info!(
        "Replaying {} transactions over {} known addresses",
        documents.len(),
        address_book.len()
    );

    let report = verify_documents(&documents, &address_book).context("replay failed")?;

    for (wallet, expected) in balances.iter() {
        let replayed = report.balances.get(wallet).cloned().unwrap_or_default();
        if &replayed != expected {
            return Err(anyhow!(
                "wallet {} replays to {:?} but {} says {:?}",
                wallet,
                replayed,
                BALANCES_FILE,
                expected
            ));
        }
    }

    let mut stats = StatsAccumulator::default();
    for document in documents.iter() {
        stats.add_document(document);
    }
    let recomputed = stats.summary();
    if recomputed.total_transactions != summary.total_transactions
        || recomputed.transaction_types != summary.transaction_types
        || recomputed.wallets != summary.wallets
    {
        return Err(anyhow!(
            "{} doesn't match the transaction log",
            SUMMARY_FILE
        ));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use crate::config::GenerationConfig;
    use crate::ledger_utils::address_mapper::AddressMapper;
    use crate::ledger_utils::balance_verification::verify_documents;
    use crate::ledger_utils::output_utils::{dump_json_to_file, read_json_from_file};
    use crate::simulation::{
        generate_to_dir, run_generation, run_generation_with, to_documents, verify_output_dir,
        Phase,
        ALL_TRANSACTIONS_FILE, BALANCES_FILE, SUMMARY_FILE,
    };
    use crate::tx_event::{TxDocument, TxType};
    use crate::wallet::{Party, WalletId};
    use chrono::NaiveDate;
    use itertools::Itertools;
    use std::fs;

    fn small_config() -> GenerationConfig {
        let mut config = GenerationConfig::default();
        config.invoice.count = 600;
        config.wallets.invoicing_addresses = 50;
        config.wallets.treasury_addresses = 10;
        config.wallets.checking_addresses = 10;
        config
    }

    #[test]
    fn full_year_with_default_seed() {
        let config = GenerationConfig::default();
        let output = run_generation(&config).unwrap();
        let summary = &output.summary;

        assert_eq!(summary.transaction_types[&TxType::Invoice], 10_000);
        assert_eq!(summary.transaction_types[&TxType::Transfer], 1);
        assert_eq!(summary.transaction_types[&TxType::VendorPayment], 20);
        assert_eq!(summary.transaction_types[&TxType::TreasuryOutgoing], 5);
        assert_eq!(summary.transaction_types[&TxType::TreasuryIncoming], 2);
        assert_eq!(summary.total_transactions, output.transactions.len());

        let invoices = output
            .transactions
            .iter()
            .filter(|tx| tx.tx_type() == TxType::Invoice)
            .collect::<Vec<_>>();
        assert_eq!(
            invoices.iter().map(|tx| tx.block_height).collect::<Vec<_>>(),
            (100..10_100).collect::<Vec<_>>()
        );
        for invoice in invoices.iter() {
            let document = invoice.to_document();
            assert_eq!(document.wallet_to, "A");
            assert_eq!(
                output.wallets.owner_of(&document.to_address),
                Ok(WalletId::Invoicing)
            );
        }

        assert!(output
            .transactions
            .windows(2)
            .all(|pair| pair[0].block_height <= pair[1].block_height));
        assert!(output
            .transactions
            .iter()
            .flat_map(|tx| tx.inputs())
            .all_unique());

        // invoicing is swept completely, checking keeps one output
        assert_eq!(output.balances[&WalletId::Invoicing].balance_sats, 0);
        assert_eq!(output.balances[&WalletId::Checking].utxo_count, 1);
        let vendor_sats: u64 = output
            .transactions
            .iter()
            .filter(|tx| tx.tx_type() == TxType::VendorPayment)
            .map(|tx| tx.output().sats)
            .sum();
        assert_eq!(
            output.balances[&WalletId::Checking].balance_sats,
            100_000_000 - vendor_sats
        );

        assert_eq!(
            summary.wallets[&Party::Wallet(WalletId::Invoicing)].incoming,
            10_000
        );
        assert_eq!(
            summary.wallets[&Party::External].outgoing,
            10_000 + 2
        );
    }

    #[test]
    fn generated_log_replays_against_registry() {
        let output = run_generation(&small_config()).unwrap();
        let report =
            verify_documents(&to_documents(&output.transactions), &output.wallets).unwrap();
        assert_eq!(report.transactions, output.transactions.len());
        assert_eq!(report.balances, output.balances);

        // every tracked output lands on a registry address
        for tx in output.transactions.iter() {
            if let Party::Wallet(wallet) = tx.destination() {
                assert_eq!(output.wallets.map_address(&tx.output().address), Ok(wallet));
            }
        }
    }

    #[test]
    fn phases_are_reported_in_order() {
        let mut seen = vec![];
        let output = run_generation_with(&small_config(), |phase, records| {
            seen.push((phase, records.len()));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen.iter().map(|(phase, _)| *phase).collect::<Vec<_>>(),
            vec![
                Phase::Invoice,
                Phase::Consolidation,
                Phase::Checking,
                Phase::SpecialTreasury
            ]
        );
        assert_eq!(seen[0].1, 600);
        assert_eq!(
            seen.iter().map(|(_, count)| count).sum::<usize>(),
            output.transactions.len()
        );
    }

    #[test]
    fn same_seed_same_files() {
        let config = small_config();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        generate_to_dir(&config, first.path()).unwrap();
        generate_to_dir(&config, second.path()).unwrap();

        for file in [ALL_TRANSACTIONS_FILE, SUMMARY_FILE, BALANCES_FILE, "wallets.json"] {
            assert_eq!(
                fs::read(first.path().join(file)).unwrap(),
                fs::read(second.path().join(file)).unwrap(),
                "{} differs",
                file
            );
        }

        let mut other = small_config();
        other.seed = 43;
        let third = tempfile::tempdir().unwrap();
        generate_to_dir(&other, third.path()).unwrap();
        assert_ne!(
            fs::read(first.path().join(ALL_TRANSACTIONS_FILE)).unwrap(),
            fs::read(third.path().join(ALL_TRANSACTIONS_FILE)).unwrap()
        );
    }

    #[test]
    fn written_output_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let (output, written) = generate_to_dir(&small_config(), dir.path()).unwrap();
        assert_eq!(written.len(), 10);
        for path in written.iter() {
            assert!(path.exists(), "{} is missing", path.display());
        }
        assert!(!dir.path().join(".staging").exists());

        let report = verify_output_dir(dir.path()).unwrap();
        assert_eq!(report.transactions, output.transactions.len());
        assert_eq!(report.balances, output.balances);

        let documents: Vec<TxDocument> =
            read_json_from_file(&dir.path().join(ALL_TRANSACTIONS_FILE)).unwrap();
        assert_eq!(documents.len(), output.transactions.len());
        assert_eq!(documents[0].block_height, 100);
    }

    #[test]
    fn tampered_output_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        generate_to_dir(&small_config(), dir.path()).unwrap();
        let path = dir.path().join(ALL_TRANSACTIONS_FILE);
        let mut documents: Vec<TxDocument> = read_json_from_file(&path).unwrap();

        let spent_twice = documents
            .iter()
            .find(|document| document.tx_type == TxType::Consolidation)
            .map(|document| document.inputs[0].clone())
            .unwrap();
        let last = documents.len() - 1;
        documents[last].inputs.push(spent_twice);
        dump_json_to_file(&documents, &path).unwrap();

        let err = verify_output_dir(dir.path()).err().unwrap();
        assert!(err.to_string().starts_with("replay failed"), "{}", err);
    }

    #[test]
    fn failed_run_leaves_no_output() {
        let mut config = small_config();
        config.invoice.count = 0;
        config.checking.allow_bootstrap_utxo = false;
        let dir = tempfile::tempdir().unwrap();

        let err = generate_to_dir(&config, dir.path()).err().unwrap();
        assert!(err.to_string().starts_with("checking phase failed"), "{}", err);
        assert!(!dir.path().join(Phase::Invoice.file_name()).exists());
        assert!(!dir.path().join(ALL_TRANSACTIONS_FILE).exists());
    }

    #[test]
    fn bootstrap_run_still_verifies() {
        let mut config = small_config();
        config.invoice.count = 0;
        config.end_date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let (output, _) = generate_to_dir(&config, dir.path()).unwrap();
        let transfer = output
            .transactions
            .iter()
            .find(|tx| tx.tx_type() == TxType::Transfer)
            .unwrap();
        assert!(transfer.to_document().bootstrap);

        let report = verify_output_dir(dir.path()).unwrap();
        assert_eq!(report.balances, output.balances);
    }
}
