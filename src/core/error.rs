//! Error kinds surfaced by the valuation pipeline and the holdings store.

use thiserror::Error;

/// Failures of the valuation pipeline.
///
/// `Clone` because a single in-flight cache refresh hands its outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    /// The market-data or fiat-rate source could not be fetched or parsed.
    #[error("{provider} unavailable: {message}")]
    SourceUnavailable { provider: String, message: String },

    /// No quote for the symbol after the quote cache was loaded.
    #[error("No quote found for symbol: {0}")]
    QuoteNotFound(String),

    /// The currency code is absent from the latest fiat snapshot.
    #[error("Currency {0} is not supported")]
    UnsupportedCurrency(String),

    /// A conversion overflowed or was fed a NaN/infinite amount.
    #[error("Value in {0} is not a finite number")]
    NonFiniteValue(String),
}

impl ValuationError {
    pub fn unavailable(provider: &str, message: impl Into<String>) -> Self {
        ValuationError::SourceUnavailable {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Failures of holdings mutations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HoldingError {
    #[error("Symbol must not be empty")]
    InvalidSymbol,

    #[error("Amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("Cannot remove {requested} {symbol}: only {held} held")]
    InsufficientBalance {
        symbol: String,
        held: f64,
        requested: f64,
    },

    #[error("Holdings storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for HoldingError {
    fn from(e: serde_json::Error) -> Self {
        HoldingError::Storage(e.to_string())
    }
}
