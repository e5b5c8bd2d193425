//! User preferences kept next to the holdings.

use super::error::HoldingError;

/// Persisted preferences. Values are stored already normalized.
pub trait SettingsStore: Send + Sync {
    fn preferred_currency(&self) -> Result<Option<String>, HoldingError>;

    fn set_preferred_currency(&self, code: &str) -> Result<(), HoldingError>;
}
