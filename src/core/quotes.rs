//! Cache of USD spot prices for every tracked crypto symbol.

use super::error::ValuationError;
use super::flight::SingleFlight;
use super::holding::normalize_symbol;
use super::source::{MarketDataSource, Quote, fetch_within};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Immutable set of quotes captured by one market fetch.
#[derive(Debug, Default)]
pub struct QuoteSnapshot {
    prices: HashMap<String, f64>,
    // Source order, used for suggestions.
    symbols: Vec<String>,
}

impl QuoteSnapshot {
    /// Builds a snapshot keyed by uppercase symbol. The first quote for a
    /// symbol wins when the source lists it more than once.
    pub fn from_quotes(quotes: Vec<Quote>) -> Self {
        let mut snapshot = QuoteSnapshot::default();
        for quote in quotes {
            let symbol = normalize_symbol(&quote.symbol);
            if symbol.is_empty() || snapshot.prices.contains_key(&symbol) {
                continue;
            }
            snapshot.prices.insert(symbol.clone(), quote.price_usd);
            snapshot.symbols.push(symbol);
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }
}

/// Latest market quotes, refreshed wholesale and never expired.
///
/// Readers always see either the previous or the fully replaced snapshot.
/// Concurrent refreshes collapse into a single fetch.
pub struct QuoteCache {
    source: Arc<dyn MarketDataSource>,
    snapshot: Arc<RwLock<Arc<QuoteSnapshot>>>,
    flight: SingleFlight<Result<(), ValuationError>>,
    deadline: Option<Duration>,
}

impl QuoteCache {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            snapshot: Arc::new(RwLock::new(Arc::new(QuoteSnapshot::default()))),
            flight: SingleFlight::new(),
            deadline: None,
        }
    }

    /// Treats a fetch that outlives `deadline` as `SourceUnavailable`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn snapshot(&self) -> Arc<QuoteSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_loaded(&self) -> bool {
        !self.snapshot().is_empty()
    }

    /// Fetches the market snapshot if no quotes are cached yet.
    pub async fn ensure_loaded(&self) -> Result<(), ValuationError> {
        if self.is_loaded() {
            debug!("Quote cache HIT");
            return Ok(());
        }
        debug!("Quote cache MISS");
        self.refresh().await
    }

    /// Fetches the market snapshot unconditionally and replaces the cache.
    ///
    /// On failure the previous snapshot stays in place untouched.
    pub async fn refresh(&self) -> Result<(), ValuationError> {
        let source = Arc::clone(&self.source);
        let slot = Arc::clone(&self.snapshot);
        let deadline = self.deadline;
        self.flight
            .run(move || reload(source, slot, deadline).boxed())
            .await
    }

    /// USD price of `symbol`, matched case-insensitively.
    pub async fn lookup(&self, symbol: &str) -> Result<f64, ValuationError> {
        self.ensure_loaded().await?;
        let key = normalize_symbol(symbol);
        self.snapshot()
            .price(&key)
            .ok_or(ValuationError::QuoteNotFound(key))
    }

    /// Whether the cached snapshot has a quote for `symbol`. Performs no I/O.
    pub fn is_known(&self, symbol: &str) -> bool {
        self.snapshot().price(&normalize_symbol(symbol)).is_some()
    }

    /// Cached symbols starting with `prefix`, in source order.
    pub fn symbols_with_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = normalize_symbol(prefix);
        if prefix.is_empty() {
            return Vec::new();
        }
        self.snapshot()
            .symbols
            .iter()
            .filter(|symbol| symbol.starts_with(&prefix))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[instrument(name = "QuoteRefresh", skip_all, fields(source = %source.name()))]
async fn reload(
    source: Arc<dyn MarketDataSource>,
    slot: Arc<RwLock<Arc<QuoteSnapshot>>>,
    deadline: Option<Duration>,
) -> Result<(), ValuationError> {
    let quotes = fetch_within(source.name(), deadline, source.fetch_quotes()).await?;
    let snapshot = QuoteSnapshot::from_quotes(quotes);
    if snapshot.is_empty() {
        return Err(ValuationError::unavailable(
            source.name(),
            "market snapshot contained no quotes",
        ));
    }

    info!(count = snapshot.len(), "Quote cache refreshed");
    *slot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    Ok(())
}
