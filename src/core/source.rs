//! External price sources consumed by the caches

use super::error::ValuationError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Latest known USD price for one asset symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price_usd: f64,
}

/// Full market snapshot for every tracked crypto asset.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_quotes(&self) -> Result<Vec<Quote>>;
}

/// Fiat conversion rates relative to USD, keyed by currency code.
#[async_trait]
pub trait FiatRateSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_rates(&self) -> Result<HashMap<String, f64>>;
}

/// Awaits a source fetch, racing it against `deadline` when one is set.
///
/// Fetch errors and deadline expiry both surface as `SourceUnavailable`.
pub(crate) async fn fetch_within<T, F>(
    provider: &str,
    deadline: Option<Duration>,
    fetch: F,
) -> Result<T, ValuationError>
where
    F: Future<Output = Result<T>>,
{
    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(ValuationError::unavailable(
                    provider,
                    format!("no response within {}ms", limit.as_millis()),
                ));
            }
        },
        None => fetch.await,
    };
    outcome.map_err(|e| ValuationError::unavailable(provider, format!("{e:#}")))
}
