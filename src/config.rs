use anyhow::{ensure, Context};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Everything a run depends on. Each field has a default, so an empty file (or no file at all)
/// reproduces the reference fixture set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GenerationConfig {
    pub seed: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub output_dir: PathBuf,
    /// how far the exchange rate lookup may fall back to a neighbouring day
    pub max_rate_fallback_days: Option<i64>,
    pub wallets: WalletPoolConfig,
    pub block_step: BlockStep,
    pub invoice: InvoiceConfig,
    pub consolidation: ConsolidationConfig,
    pub checking: CheckingConfig,
    pub treasury: TreasuryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WalletPoolConfig {
    pub invoicing_addresses: usize,
    pub treasury_addresses: usize,
    pub checking_addresses: usize,
}

/// Gap between consecutive block heights inside a phase, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockStep {
    pub min: u64,
    pub max: u64,
}

/// Half-open USD interval `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsdRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct InvoiceConfig {
    pub count: usize,
    pub usd: UsdRange,
    pub first_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConsolidationConfig {
    pub chunks_per_window: usize,
    /// November/December window
    pub year_end_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CheckingConfig {
    pub transfer_sats: u64,
    pub transfer_month: u32,
    pub transfer_day: u32,
    pub allow_bootstrap_utxo: bool,
    pub vendor_payments: usize,
    pub vendor_usd: UsdRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncomingPayment {
    pub quarter: u32,
    pub usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TreasuryConfig {
    pub outgoing_months: Vec<u32>,
    pub outgoing_usd: UsdRange,
    pub incoming: Vec<IncomingPayment>,
    /// payments are dated on a day in `1..=max_day` of their month
    pub max_day: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid default date"),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid default date"),
            output_dir: PathBuf::from("data"),
            max_rate_fallback_days: None,
            wallets: WalletPoolConfig::default(),
            block_step: BlockStep { min: 5, max: 15 },
            invoice: InvoiceConfig::default(),
            consolidation: ConsolidationConfig::default(),
            checking: CheckingConfig::default(),
            treasury: TreasuryConfig::default(),
        }
    }
}

impl Default for WalletPoolConfig {
    fn default() -> Self {
        Self {
            invoicing_addresses: 10_000,
            treasury_addresses: 100,
            checking_addresses: 100,
        }
    }
}

impl WalletPoolConfig {
    /// In A, B, C order.
    pub fn pool_sizes(&self) -> [usize; 3] {
        [
            self.invoicing_addresses,
            self.treasury_addresses,
            self.checking_addresses,
        ]
    }
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            count: 10_000,
            usd: UsdRange {
                min: 100.0,
                max: 2_000.0,
            },
            first_block_height: 100,
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            chunks_per_window: 16,
            year_end_chunks: 17,
        }
    }
}

impl Default for CheckingConfig {
    fn default() -> Self {
        Self {
            transfer_sats: 100_000_000,
            transfer_month: 1,
            transfer_day: 15,
            allow_bootstrap_utxo: true,
            vendor_payments: 20,
            vendor_usd: UsdRange {
                min: 50.0,
                max: 5_000.0,
            },
        }
    }
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            outgoing_months: vec![2, 4, 6, 8, 10],
            outgoing_usd: UsdRange {
                min: 50_000.0,
                max: 300_000.0,
            },
            incoming: vec![
                IncomingPayment {
                    quarter: 1,
                    usd: 100_000.0,
                },
                IncomingPayment {
                    quarter: 3,
                    usd: 200_000.0,
                },
            ],
            max_day: 28,
        }
    }
}

impl UsdRange {
    fn validate(&self, name: &str) -> anyhow::Result<()> {
        ensure!(
            self.min > 0.0 && self.min < self.max,
            "{} range must satisfy 0 < min < max, got [{}, {})",
            name,
            self.min,
            self.max
        );
        Ok(())
    }
}

impl GenerationConfig {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let file = File::open(config_path).with_context(|| {
            format!(
                "Cannot read config file {path}",
                path = config_path.display()
            )
        })?;
        let config: GenerationConfig = serde_yaml::from_reader(file).with_context(|| {
            format!(
                "Cannot parse config file {path}",
                path = config_path.display()
            )
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.start_date <= self.end_date,
            "start date {} is after end date {}",
            self.start_date,
            self.end_date
        );
        ensure!(
            self.block_step.min <= self.block_step.max,
            "block step min {} is above max {}",
            self.block_step.min,
            self.block_step.max
        );
        if let Some(days) = self.max_rate_fallback_days {
            ensure!(days >= 0, "max_rate_fallback_days can't be negative");
        }

        self.invoice.usd.validate("invoice usd")?;

        ensure!(
            self.consolidation.chunks_per_window > 0 && self.consolidation.year_end_chunks > 0,
            "consolidation needs at least one chunk per window"
        );

        self.checking.vendor_usd.validate("vendor usd")?;
        ensure!(
            self.checking.transfer_sats > 0,
            "treasury to checking transfer can't be empty"
        );
        ensure!(
            NaiveDate::from_ymd_opt(
                self.start_date.year(),
                self.checking.transfer_month,
                self.checking.transfer_day
            )
            .is_some(),
            "transfer date {}-{} is not a calendar date",
            self.checking.transfer_month,
            self.checking.transfer_day
        );

        self.treasury.outgoing_usd.validate("treasury outgoing usd")?;
        ensure!(
            (1..=28).contains(&self.treasury.max_day),
            "treasury max_day must be within 1..=28, got {}",
            self.treasury.max_day
        );
        for month in self.treasury.outgoing_months.iter() {
            ensure!((1..=12).contains(month), "invalid outgoing month {}", month);
        }
        for incoming in self.treasury.incoming.iter() {
            ensure!(
                (1..=4).contains(&incoming.quarter),
                "invalid incoming quarter {}",
                incoming.quarter
            );
            ensure!(incoming.usd > 0.0, "incoming payment must be positive");
        }

        Ok(())
    }
}
