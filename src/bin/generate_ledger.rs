use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use utxo_ledger_generator::config::GenerationConfig;
use utxo_ledger_generator::simulation::generate_to_dir;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file, defaults are used when omitted
    #[clap(long, value_parser)]
    config_path: Option<PathBuf>,

    /// overrides the configured seed
    #[clap(long, value_parser)]
    seed: Option<u64>,

    #[clap(long, value_parser)]
    start_date: Option<NaiveDate>,

    #[clap(long, value_parser)]
    end_date: Option<NaiveDate>,

    /// directory the json files are written to
    #[clap(long, value_parser)]
    output_dir: Option<PathBuf>,

    /// log every window and phase detail
    #[clap(long, action)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Start logging setup block
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(Targets::new().with_default(level));
    tracing_subscriber::registry().with(fmt_layer).init();

    let mut config = match &cli.config_path {
        Some(config_path) => {
            tracing::info!("Config file {:?}", config_path);
            GenerationConfig::load(config_path)?
        }
        None => GenerationConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(start_date) = cli.start_date {
        config.start_date = start_date;
    }
    if let Some(end_date) = cli.end_date {
        config.end_date = end_date;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    let (output, written) = generate_to_dir(&config, &config.output_dir)?;

    for (tx_type, count) in output.summary.transaction_types.iter() {
        tracing::info!("{:>20}: {}", tx_type.as_str(), count);
    }
    for path in written.iter() {
        tracing::debug!("wrote {}", path.display());
    }
    tracing::info!(
        "{} transactions written to {}",
        output.summary.total_transactions,
        config.output_dir.display()
    );

    Ok(())
}
