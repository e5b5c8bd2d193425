//! Cache of fiat conversion rates relative to USD, governed by a TTL.

use super::clock::{Clock, SystemClock};
use super::error::ValuationError;
use super::flight::SingleFlight;
use super::holding::normalize_symbol;
use super::source::{FiatRateSource, fetch_within};
use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Reserved base currency. Always converts at 1 without consulting the cache.
pub const USD: &str = "USD";

pub const DEFAULT_FIAT_TTL_HOURS: i64 = 24;

/// Full set of conversion rates captured at one point in time.
#[derive(Debug, Clone)]
pub struct FiatRateSnapshot {
    rates: HashMap<String, f64>,
    fetched_at: DateTime<Utc>,
}

impl FiatRateSnapshot {
    /// Keys are normalized; non-finite and non-positive rates are dropped.
    pub fn new(rates: HashMap<String, f64>, fetched_at: DateTime<Utc>) -> Self {
        let rates = rates
            .into_iter()
            .filter_map(|(code, rate)| {
                if rate.is_finite() && rate > 0.0 {
                    Some((normalize_symbol(&code), rate))
                } else {
                    debug!(%code, rate, "Dropping unusable conversion rate");
                    None
                }
            })
            .collect();
        Self { rates, fetched_at }
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

type SnapshotSlot = Arc<RwLock<Option<Arc<FiatRateSnapshot>>>>;

pub struct FiatRateCache {
    source: Arc<dyn FiatRateSource>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    snapshot: SnapshotSlot,
    flight: SingleFlight<Result<(), ValuationError>>,
    deadline: Option<Duration>,
}

impl FiatRateCache {
    pub fn new(source: Arc<dyn FiatRateSource>) -> Self {
        Self {
            source,
            clock: Arc::new(SystemClock),
            ttl: TimeDelta::hours(DEFAULT_FIAT_TTL_HOURS),
            snapshot: Arc::new(RwLock::new(None)),
            flight: SingleFlight::new(),
            deadline: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    /// Treats a fetch that outlives `deadline` as `SourceUnavailable`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn snapshot(&self) -> Option<Arc<FiatRateSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True when a non-empty snapshot was fetched no longer than the TTL ago.
    pub fn is_fresh(&self) -> bool {
        self.snapshot().is_some_and(|snapshot| {
            !snapshot.is_empty() && self.clock.now() - snapshot.fetched_at() <= self.ttl
        })
    }

    /// Replaces the snapshot if it is missing or stale.
    ///
    /// A failed fetch leaves the previous snapshot, and its age, in place.
    pub async fn ensure_fresh(&self) -> Result<(), ValuationError> {
        if self.is_fresh() {
            debug!("Fiat rate cache HIT");
            return Ok(());
        }
        debug!("Fiat rate cache MISS or stale");

        let source = Arc::clone(&self.source);
        let clock = Arc::clone(&self.clock);
        let slot = Arc::clone(&self.snapshot);
        let deadline = self.deadline;
        self.flight
            .run(move || reload(source, clock, slot, deadline).boxed())
            .await
    }

    /// Rate of `currency` relative to USD.
    ///
    /// `Ok(None)` means the code is absent from the fresh snapshot. `USD`
    /// short-circuits to 1 without a refresh.
    pub async fn rate_for(&self, currency: &str) -> Result<Option<f64>, ValuationError> {
        let code = normalize_symbol(currency);
        if code == USD {
            return Ok(Some(1.0));
        }

        self.ensure_fresh().await?;
        let rate = self.snapshot().and_then(|snapshot| snapshot.rate(&code));
        if rate.is_none() {
            warn!(currency = %code, "Currency not supported");
        }
        Ok(rate)
    }

    /// Cached currency codes starting with `prefix`, in lexical order.
    pub fn codes_with_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = normalize_symbol(prefix);
        if prefix.is_empty() {
            return Vec::new();
        }
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        let mut codes: Vec<String> = snapshot
            .rates
            .keys()
            .filter(|code| code.starts_with(&prefix))
            .cloned()
            .collect();
        codes.sort();
        codes.truncate(limit);
        codes
    }
}

#[instrument(name = "FiatRefresh", skip_all, fields(source = %source.name()))]
async fn reload(
    source: Arc<dyn FiatRateSource>,
    clock: Arc<dyn Clock>,
    slot: SnapshotSlot,
    deadline: Option<Duration>,
) -> Result<(), ValuationError> {
    let rates = fetch_within(source.name(), deadline, source.fetch_rates()).await?;
    let snapshot = FiatRateSnapshot::new(rates, clock.now());
    if snapshot.is_empty() {
        return Err(ValuationError::unavailable(
            source.name(),
            "rate snapshot contained no usable conversion rates",
        ));
    }

    info!(count = snapshot.len(), "Fiat rate cache refreshed");
    *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(snapshot));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{ManualClock, ScriptedSource, rates};

    fn setup(
        pairs: &[(&str, f64)],
    ) -> (
        Arc<ScriptedSource<HashMap<String, f64>>>,
        Arc<ManualClock>,
        FiatRateCache,
    ) {
        let source = Arc::new(ScriptedSource::new(rates(pairs)));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = FiatRateCache::new(source.clone()).with_clock(clock.clone());
        (source, clock, cache)
    }

    #[tokio::test]
    async fn test_freshness_lifecycle() {
        let (source, clock, cache) = setup(&[("EUR", 0.9)]);
        assert!(!cache.is_fresh());

        cache.ensure_fresh().await.unwrap();
        assert!(cache.is_fresh());

        clock.advance(TimeDelta::hours(24));
        assert!(cache.is_fresh());

        clock.advance(TimeDelta::seconds(1));
        assert!(!cache.is_fresh());

        cache.ensure_fresh().await.unwrap();
        assert!(cache.is_fresh());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_ensure_fresh_skips_fetch_while_fresh() {
        let (source, clock, cache) = setup(&[("EUR", 0.9)]);

        cache.ensure_fresh().await.unwrap();
        clock.advance(TimeDelta::hours(12));
        cache.ensure_fresh().await.unwrap();

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_usd_never_consults_snapshot() {
        let source = Arc::new(ScriptedSource::<HashMap<String, f64>>::failing("down"));
        let cache = FiatRateCache::new(source.clone());

        assert_eq!(cache.rate_for("usd").await, Ok(Some(1.0)));
        assert_eq!(source.calls(), 0);
        assert!(!cache.is_fresh());
    }

    #[tokio::test]
    async fn test_rate_for_is_case_insensitive() {
        let (_, _, cache) = setup(&[("EUR", 0.9), ("ils", 3.7)]);

        assert_eq!(cache.rate_for("eur").await, Ok(Some(0.9)));
        assert_eq!(cache.rate_for("ILS").await, Ok(Some(3.7)));
    }

    #[tokio::test]
    async fn test_rate_for_unknown_code_is_not_supported() {
        let (_, _, cache) = setup(&[("EUR", 0.9)]);
        assert_eq!(cache.rate_for("XYZ").await, Ok(None));
    }

    #[tokio::test]
    async fn test_unusable_rates_are_dropped() {
        let (_, _, cache) = setup(&[("EUR", 0.9), ("BAD", f64::NAN), ("ZERO", 0.0)]);

        assert_eq!(cache.rate_for("BAD").await, Ok(None));
        assert_eq!(cache.rate_for("ZERO").await, Ok(None));
        assert_eq!(cache.snapshot().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_surfaces_source_unavailable() {
        let source = Arc::new(ScriptedSource::<HashMap<String, f64>>::failing("HTTP 429"));
        let cache = FiatRateCache::new(source);

        assert_eq!(
            cache.rate_for("EUR").await,
            Err(ValuationError::unavailable("ScriptedRates", "HTTP 429"))
        );
        assert!(cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_snapshot() {
        let (source, clock, cache) = setup(&[("EUR", 0.9)]);
        cache.ensure_fresh().await.unwrap();
        let fetched_at = cache.snapshot().unwrap().fetched_at();

        clock.advance(TimeDelta::hours(25));
        source.fail_with("HTTP 500");
        assert!(cache.ensure_fresh().await.is_err());

        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.fetched_at(), fetched_at);
        assert_eq!(snapshot.rate("EUR"), Some(0.9));
        assert!(!cache.is_fresh());
    }

    #[tokio::test]
    async fn test_configured_ttl() {
        let (_, clock, cache) = setup(&[("EUR", 0.9)]);
        let cache = cache.with_ttl(TimeDelta::hours(1));

        cache.ensure_fresh().await.unwrap();
        clock.advance(TimeDelta::minutes(61));
        assert!(!cache.is_fresh());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_fresh_issues_one_fetch() {
        let source = Arc::new(
            ScriptedSource::new(rates(&[("EUR", 0.9)])).with_delay(Duration::from_millis(20)),
        );
        let cache = FiatRateCache::new(source.clone());

        let (a, b) = tokio::join!(cache.ensure_fresh(), cache.rate_for("EUR"));

        assert_eq!(a, Ok(()));
        assert_eq!(b, Ok(Some(0.9)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_codes_with_prefix() {
        let (_, _, cache) = setup(&[("EUR", 0.9), ("ETB", 57.0), ("GBP", 0.8)]);
        assert!(cache.codes_with_prefix("E", 50).is_empty());

        cache.ensure_fresh().await.unwrap();
        assert_eq!(cache.codes_with_prefix("e", 50), vec!["ETB", "EUR"]);
        assert_eq!(cache.codes_with_prefix("E", 1), vec!["ETB"]);
    }
}
