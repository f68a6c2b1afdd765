use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use utxo_ledger_generator::simulation::verify_output_dir;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// directory produced by generate_ledger
    #[clap(long, value_parser)]
    data_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    // Start logging setup block
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(Targets::new().with_default(Level::INFO));
    tracing_subscriber::registry().with(fmt_layer).init();

    let Cli { data_dir } = Cli::parse();

    let report = verify_output_dir(&data_dir)?;
    for (wallet, balance) in report.balances.iter() {
        tracing::info!(
            "wallet {}: {} utxos, {} sats (received {}, spent {})",
            wallet,
            balance.utxo_count,
            balance.balance_sats,
            balance.received_sats,
            balance.spent_sats
        );
    }
    tracing::info!(
        "{} transactions replayed cleanly from {}",
        report.transactions,
        data_dir.display()
    );

    Ok(())
}
