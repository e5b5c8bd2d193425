//! Core valuation pipeline

pub mod clock;
pub mod config;
pub mod error;
pub mod fiat;
pub mod flight;
pub mod holding;
pub mod log;
pub mod quotes;
pub mod settings;
pub mod slices;
pub mod source;
pub mod valuation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for cleaner imports
pub use error::{HoldingError, ValuationError};
pub use fiat::FiatRateCache;
pub use holding::{Holding, HoldingsStore};
pub use quotes::QuoteCache;
pub use settings::SettingsStore;
pub use slices::SliceAggregator;
pub use source::{FiatRateSource, MarketDataSource, Quote};
pub use valuation::ValuationEngine;
