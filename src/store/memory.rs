use crate::core::error::HoldingError;
use crate::core::holding::{Holding, HoldingsStore};
use crate::core::settings::SettingsStore;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// In-memory holdings store, mainly for tests and dry runs.
#[derive(Default)]
pub struct MemoryHoldingsStore {
    inner: Mutex<HashMap<String, f64>>,
    preferred_currency: Mutex<Option<String>>,
}

impl MemoryHoldingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with raw entries, bypassing validation.
    pub fn with_entries(entries: &[(&str, f64)]) -> Self {
        let map = entries
            .iter()
            .map(|(symbol, amount)| (symbol.to_string(), *amount))
            .collect();
        Self {
            inner: Mutex::new(map),
            ..Self::default()
        }
    }
}

impl HoldingsStore for MemoryHoldingsStore {
    fn get_amount(&self, symbol: &str) -> Result<Option<f64>, HoldingError> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(symbol).copied())
    }

    fn set_amount(&self, symbol: &str, amount: f64) -> Result<(), HoldingError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Holdings PUT for key: {}", symbol);
        map.insert(symbol.to_string(), amount);
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<Holding>, HoldingError> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut holdings: Vec<Holding> = map
            .iter()
            .map(|(symbol, amount)| Holding {
                symbol: symbol.clone(),
                amount: *amount,
            })
            .collect();
        holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(holdings)
    }
}

impl SettingsStore for MemoryHoldingsStore {
    fn preferred_currency(&self) -> Result<Option<String>, HoldingError> {
        Ok(self
            .preferred_currency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set_preferred_currency(&self, code: &str) -> Result<(), HoldingError> {
        *self
            .preferred_currency
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(code.to_string());
        Ok(())
    }
}
