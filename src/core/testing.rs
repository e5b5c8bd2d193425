//! Scripted sources shared by the core unit tests.

use super::clock::Clock;
use super::source::{FiatRateSource, MarketDataSource, Quote};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn quotes(pairs: &[(&str, f64)]) -> Vec<Quote> {
    pairs
        .iter()
        .map(|(symbol, price)| Quote {
            symbol: symbol.to_string(),
            price_usd: *price,
        })
        .collect()
}

pub fn rates(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs
        .iter()
        .map(|(code, rate)| (code.to_string(), *rate))
        .collect()
}

/// Source that replays a scripted response and counts calls.
pub struct ScriptedSource<T> {
    response: Mutex<Result<T, String>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl<T: Clone> ScriptedSource<T> {
    pub fn new(value: T) -> Self {
        Self {
            response: Mutex::new(Ok(value)),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Mutex::new(Err(message.to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond_with(&self, value: T) {
        *self.response.lock().unwrap() = Ok(value);
    }

    pub fn fail_with(&self, message: &str) {
        *self.response.lock().unwrap() = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.lock().unwrap().clone().map_err(|e| anyhow!(e))
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource<Vec<Quote>> {
    fn name(&self) -> &str {
        "ScriptedMarket"
    }

    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        self.next().await
    }
}

#[async_trait]
impl FiatRateSource for ScriptedSource<HashMap<String, f64>> {
    fn name(&self) -> &str {
        "ScriptedRates"
    }

    async fn fetch_rates(&self) -> Result<HashMap<String, f64>> {
        self.next().await
    }
}

/// Clock that only moves when told to. Used to simulate staleness.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::hours(3));
        assert_eq!(clock.now(), start + TimeDelta::hours(3));
    }
}
