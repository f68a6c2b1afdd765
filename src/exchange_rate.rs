//! Daily BTC/USD price series used to turn fiat intents into on-chain amounts.

use crate::error::{LedgerError, LedgerResult};
use chrono::{Duration, NaiveDate};
use rand::Rng;
use std::collections::BTreeMap;

pub const SATS_PER_BTC: u64 = 100_000_000;

pub const INITIAL_BASE_RATE: f64 = 59_000.0;

/// Half-width of the symmetric day-to-day fluctuation around the base rate.
const DAILY_FLUCTUATION: f64 = 0.05;
/// Daily drift of the base rate, skewed upward.
const TREND_RANGE: (f64, f64) = (-0.02, 0.03);

#[derive(Clone, Debug, Default)]
pub struct ExchangeRateTable {
    rates: BTreeMap<NaiveDate, f64>,
    max_fallback_days: Option<i64>,
}

impl ExchangeRateTable {
    /// One rate per calendar day in `[start, end]`. The draw order is fixed: fluctuation then
    /// trend, once per day.
    pub fn generate<R: Rng>(start: NaiveDate, end: NaiveDate, rng: &mut R) -> Self {
        let mut rates = BTreeMap::new();
        let mut base_rate = INITIAL_BASE_RATE;
        let mut current = start;

        while current <= end {
            let fluctuation = rng.gen_range(-DAILY_FLUCTUATION..DAILY_FLUCTUATION);
            let rate = base_rate * (1.0 + fluctuation);

            let trend = rng.gen_range(TREND_RANGE.0..TREND_RANGE.1);
            base_rate *= 1.0 + trend;

            rates.insert(current, round_cents(rate));
            current += Duration::days(1);
        }

        tracing::info!(
            "Generated {} exchange rates from {} to {}",
            rates.len(),
            start,
            end
        );

        Self {
            rates,
            max_fallback_days: None,
        }
    }

    pub fn from_rates(rates: BTreeMap<NaiveDate, f64>) -> Self {
        Self {
            rates,
            max_fallback_days: None,
        }
    }

    /// Limits how far the nearest-date fallback may reach. `None` means unbounded.
    pub fn with_max_fallback_days(mut self, max_fallback_days: Option<i64>) -> Self {
        self.max_fallback_days = max_fallback_days;
        self
    }

    pub fn rates(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.rates
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Exact rate, or the rate of the nearest date. Ties go to the earlier date.
    pub fn rate_for(&self, date: NaiveDate) -> LedgerResult<f64> {
        if let Some(rate) = self.rates.get(&date) {
            return Ok(*rate);
        }

        let before = self.rates.range(..date).next_back();
        let after = self.rates.range(date..).next();
        let nearest = match (before, after) {
            (Some(before), Some(after)) => {
                if (date - *before.0) <= (*after.0 - date) {
                    before
                } else {
                    after
                }
            }
            (Some(before), None) => before,
            (None, Some(after)) => after,
            (None, None) => return Err(LedgerError::DateOutOfRange(date)),
        };

        let distance = (*nearest.0 - date).num_days().abs();
        match self.max_fallback_days {
            Some(max) if distance > max => Err(LedgerError::DateOutOfRange(date)),
            _ => Ok(*nearest.1),
        }
    }

    pub fn usd_to_native(&self, usd: f64, date: NaiveDate) -> LedgerResult<f64> {
        Ok(usd / self.rate_for(date)?)
    }

    pub fn export(&self) -> BTreeMap<String, f64> {
        self.rates
            .iter()
            .map(|(date, rate)| (date.format("%Y-%m-%d").to_string(), *rate))
            .collect()
    }
}

/// Truncates toward zero.
pub fn native_to_smallest_unit(amount: f64) -> u64 {
    (amount * SATS_PER_BTC as f64).trunc() as u64
}

pub fn smallest_unit_to_native(sats: u64) -> f64 {
    sats as f64 / SATS_PER_BTC as f64
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
