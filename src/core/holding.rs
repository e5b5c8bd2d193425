//! Holdings and the key/value store abstraction that owns them.

use super::error::HoldingError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trims and uppercases a symbol or currency code.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub amount: f64,
}

impl Holding {
    pub fn new(symbol: &str, amount: f64) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            amount,
        }
    }

    /// Non-positive and non-finite amounts are treated as not held.
    pub fn is_held(&self) -> bool {
        self.amount.is_finite() && self.amount > 0.0
    }
}

/// Key/value store of amounts keyed by symbol. Last write wins.
pub trait HoldingsStore: Send + Sync {
    fn get_amount(&self, symbol: &str) -> Result<Option<f64>, HoldingError>;

    fn set_amount(&self, symbol: &str, amount: f64) -> Result<(), HoldingError>;

    /// Every stored entry, including ones that are not held.
    fn enumerate(&self) -> Result<Vec<Holding>, HoldingError>;

    /// Snapshot of the entries with a finite, positive amount.
    fn held(&self) -> Result<Vec<Holding>, HoldingError> {
        Ok(self
            .enumerate()?
            .into_iter()
            .filter(Holding::is_held)
            .collect())
    }

    /// Adds `amount` to the balance of `symbol` and returns the new balance.
    fn add(&self, symbol: &str, amount: f64) -> Result<f64, HoldingError> {
        let key = validated_key(symbol, amount)?;
        let current = current_balance(self, &key)?;
        let updated = current + amount;
        self.set_amount(&key, updated)?;
        debug!(symbol = %key, amount, updated, "Holding added");
        Ok(updated)
    }

    /// Removes `amount` from the balance of `symbol` and returns the new balance.
    fn remove(&self, symbol: &str, amount: f64) -> Result<f64, HoldingError> {
        let key = validated_key(symbol, amount)?;
        let current = current_balance(self, &key)?;
        if amount > current {
            return Err(HoldingError::InsufficientBalance {
                symbol: key,
                held: current,
                requested: amount,
            });
        }
        let updated = current - amount;
        self.set_amount(&key, updated)?;
        debug!(symbol = %key, amount, updated, "Holding removed");
        Ok(updated)
    }
}

fn validated_key(symbol: &str, amount: f64) -> Result<String, HoldingError> {
    let key = normalize_symbol(symbol);
    if key.is_empty() {
        return Err(HoldingError::InvalidSymbol);
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(HoldingError::InvalidAmount(amount));
    }
    Ok(key)
}

// Missing or corrupt balances count as zero.
fn current_balance<S: HoldingsStore + ?Sized>(store: &S, key: &str) -> Result<f64, HoldingError> {
    Ok(store
        .get_amount(key)?
        .filter(|amount| amount.is_finite())
        .unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holding_normalizes_symbol() {
        let holding = Holding::new("  btc ", 1.5);
        assert_eq!(holding.symbol, "BTC");
        assert!(holding.is_held());
    }

    #[test]
    fn test_non_positive_or_non_finite_is_not_held() {
        assert!(!Holding::new("ETH", 0.0).is_held());
        assert!(!Holding::new("ETH", -2.0).is_held());
        assert!(!Holding::new("ETH", f64::NAN).is_held());
        assert!(!Holding::new("ETH", f64::INFINITY).is_held());
    }
}
