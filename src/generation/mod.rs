//! The four generation phases. Each one reads the ledger left behind by the previous phase and
//! draws from the same seeded random source, so phase order is part of the output.

pub mod checking;
pub mod consolidation;
pub mod invoice;
pub mod treasury;

use crate::config::GenerationConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::exchange_rate::{native_to_smallest_unit, ExchangeRateTable};
use crate::tx_event::FiatQuote;
use crate::wallet::{WalletId, WalletRegistry};
use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;

pub struct GenerationContext<'a, R: Rng> {
    pub config: &'a GenerationConfig,
    pub wallets: &'a WalletRegistry,
    pub rates: &'a ExchangeRateTable,
    pub rng: &'a mut R,
}

impl<'a, R: Rng> GenerationContext<'a, R> {
    pub fn new(
        config: &'a GenerationConfig,
        wallets: &'a WalletRegistry,
        rates: &'a ExchangeRateTable,
        rng: &'a mut R,
    ) -> Self {
        Self {
            config,
            wallets,
            rates,
            rng,
        }
    }

    /// Uniform over the days of `[start, end]`.
    pub fn random_date(&mut self, start: NaiveDate, end: NaiveDate) -> NaiveDate {
        if end <= start {
            return start;
        }
        let span = (end - start).num_days();
        start + Duration::days(self.rng.gen_range(0..=span))
    }

    pub fn random_address(&mut self, wallet: WalletId) -> String {
        self.wallets
            .wallet(wallet)
            .random_address(&mut *self.rng)
            .to_string()
    }

    pub fn height_step(&mut self) -> u64 {
        let step = self.config.block_step;
        self.rng.gen_range(step.min..=step.max)
    }

    /// USD amount priced on `date`, with its truncated satoshi value.
    pub fn quote(&self, usd: f64, date: NaiveDate) -> LedgerResult<(FiatQuote, u64)> {
        let btc = self.rates.usd_to_native(usd, date)?;
        Ok((FiatQuote { usd, btc }, native_to_smallest_unit(btc)))
    }

    /// Day of the start year, pulled into the configured range.
    pub fn scheduled_date(&self, month: u32, day: u32) -> LedgerResult<NaiveDate> {
        let year = self.config.start_date.year();
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or(LedgerError::InvalidDate { year, month, day })?;
        Ok(date.clamp(self.config.start_date, self.config.end_date))
    }
}
