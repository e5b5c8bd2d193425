//! Values a holdings snapshot in a target currency.

use super::error::ValuationError;
use super::fiat::{FiatRateCache, USD};
use super::holding::{Holding, normalize_symbol};
use super::quotes::QuoteCache;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};

/// One qualifying holding valued in the target currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationLine {
    pub symbol: String,
    pub amount: f64,
    pub price_usd: f64,
    pub value_in_target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Amount is zero, negative or non-finite.
    NotHeld,
    /// The market snapshot has no quote for the symbol.
    QuoteNotFound,
    /// The quote, the line value or the running total would be NaN or infinite.
    NonFiniteValue,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SkipReason::NotHeld => "not held",
                SkipReason::QuoteNotFound => "quote not found",
                SkipReason::NonFiniteValue => "non-finite value",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedHolding {
    pub symbol: String,
    pub amount: f64,
    pub reason: SkipReason,
}

/// Per-holding valuation plus the total, all in `currency`.
///
/// `total` is the sum of the line values, in line order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub currency: String,
    pub lines: Vec<ValuationLine>,
    pub skipped: Vec<SkippedHolding>,
    pub total: f64,
}

impl Breakdown {
    /// Share of the total held by `line`, in percent.
    pub fn weight_pct(&self, line: &ValuationLine) -> Option<f64> {
        (self.total > 0.0).then(|| line.value_in_target / self.total * 100.0)
    }
}

pub struct ValuationEngine {
    quotes: Arc<QuoteCache>,
    rates: Arc<FiatRateCache>,
}

impl ValuationEngine {
    pub fn new(quotes: Arc<QuoteCache>, rates: Arc<FiatRateCache>) -> Self {
        Self { quotes, rates }
    }

    pub fn quotes(&self) -> &QuoteCache {
        &self.quotes
    }

    pub fn rates(&self) -> &FiatRateCache {
        &self.rates
    }

    /// Total value of `holdings` in `target_currency`.
    ///
    /// Holdings that cannot be priced contribute nothing. Only a failed cache
    /// refresh or an unsupported target currency fails the whole total.
    pub async fn total_value(
        &self,
        holdings: &[Holding],
        target_currency: &str,
    ) -> Result<f64, ValuationError> {
        let breakdown = self.breakdown(holdings, target_currency).await?;
        debug!(total = breakdown.total, currency = %breakdown.currency, "Computed total");
        Ok(breakdown.total)
    }

    /// Converts a USD amount into `target_currency`.
    pub async fn convert(
        &self,
        usd_amount: f64,
        target_currency: &str,
    ) -> Result<f64, ValuationError> {
        let target = normalize_symbol(target_currency);
        let rate = self.rate_to(&target).await?;
        let converted = usd_amount * rate;
        if converted.is_finite() {
            Ok(converted)
        } else {
            Err(ValuationError::NonFiniteValue(target))
        }
    }

    /// Values each holding separately and records the ones that were skipped.
    ///
    /// The quote snapshot is loaded and the conversion rate resolved once, so
    /// every line and the total come from the same snapshots.
    pub async fn breakdown(
        &self,
        holdings: &[Holding],
        target_currency: &str,
    ) -> Result<Breakdown, ValuationError> {
        let target = normalize_symbol(target_currency);
        self.quotes.ensure_loaded().await?;
        let rate = self.rate_to(&target).await?;

        let mut lines = Vec::new();
        let mut skipped = Vec::new();
        let mut total = 0.0;
        for holding in holdings {
            let symbol = normalize_symbol(&holding.symbol);
            let mut skip = |reason| {
                skipped.push(SkippedHolding {
                    symbol: symbol.clone(),
                    amount: holding.amount,
                    reason,
                })
            };

            if !holding.is_held() {
                skip(SkipReason::NotHeld);
                continue;
            }

            let price_usd = match self.quotes.lookup(&symbol).await {
                Ok(price_usd) => price_usd,
                Err(ValuationError::QuoteNotFound(_)) => {
                    debug!(%symbol, "Skipping symbol absent from market snapshot");
                    skip(SkipReason::QuoteNotFound);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let value_in_target = holding.amount * price_usd * rate;
            let running = total + value_in_target;
            if !price_usd.is_finite() || !value_in_target.is_finite() || !running.is_finite() {
                warn!(%symbol, price_usd, "Skipping non-finite valuation");
                skip(SkipReason::NonFiniteValue);
                continue;
            }

            total = running;
            lines.push(ValuationLine {
                symbol,
                amount: holding.amount,
                price_usd,
                value_in_target,
            });
        }

        Ok(Breakdown {
            currency: target,
            lines,
            skipped,
            total,
        })
    }

    /// The preferred display currency if it is supported, `USD` otherwise.
    pub async fn resolve_currency(&self, preferred: &str) -> Result<String, ValuationError> {
        let code = normalize_symbol(preferred);
        if code.is_empty() {
            return Ok(USD.to_string());
        }

        match self.rates.rate_for(&code).await? {
            Some(_) => Ok(code),
            None => {
                warn!(currency = %code, "Preferred currency not supported, using {USD}");
                Ok(USD.to_string())
            }
        }
    }

    // USD converts at 1 without touching the fiat cache.
    async fn rate_to(&self, target: &str) -> Result<f64, ValuationError> {
        if target == USD {
            return Ok(1.0);
        }
        self.rates
            .rate_for(target)
            .await?
            .ok_or_else(|| ValuationError::UnsupportedCurrency(target.to_string()))
    }
}
