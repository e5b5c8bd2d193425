use crate::core::error::HoldingError;
use crate::core::holding::{Holding, HoldingsStore};
use crate::core::settings::SettingsStore;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const HOLDINGS_PARTITION: &str = "holdings";
const SETTINGS_PARTITION: &str = "settings";
const PREFERRED_CURRENCY_KEY: &str = "preferred_currency";

impl From<fjall::Error> for HoldingError {
    fn from(e: fjall::Error) -> Self {
        HoldingError::Storage(e.to_string())
    }
}

/// Holdings persisted in a fjall keyspace, one key per symbol.
///
/// Values are JSON-encoded amounts. Preferences live in a separate
/// `settings` partition. Every write is synced before returning.
pub struct DiskHoldingsStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    settings: PartitionHandle,
}

impl DiskHoldingsStore {
    pub fn open(path: &Path) -> Result<Self, HoldingError> {
        std::fs::create_dir_all(path).map_err(|e| HoldingError::Storage(e.to_string()))?;

        let keyspace = fjall::Config::new(path).open()?;
        let partition =
            keyspace.open_partition(HOLDINGS_PARTITION, PartitionCreateOptions::default())?;
        let settings =
            keyspace.open_partition(SETTINGS_PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened holdings store at {}", path.display());
        Ok(Self {
            keyspace,
            partition,
            settings,
        })
    }
}

impl HoldingsStore for DiskHoldingsStore {
    fn get_amount(&self, symbol: &str) -> Result<Option<f64>, HoldingError> {
        match self.partition.get(symbol)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn set_amount(&self, symbol: &str, amount: f64) -> Result<(), HoldingError> {
        self.partition.insert(symbol, serde_json::to_vec(&amount)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Holdings PUT for key: {}", symbol);
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<Holding>, HoldingError> {
        let mut holdings = Vec::new();
        for entry in self.partition.iter() {
            let (key, value) = entry?;
            let symbol = String::from_utf8_lossy(&key).into_owned();
            // Unreadable amounts surface as NaN so they are skipped, not fatal.
            let amount = serde_json::from_slice::<f64>(&value).unwrap_or(f64::NAN);
            holdings.push(Holding { symbol, amount });
        }
        Ok(holdings)
    }
}

impl SettingsStore for DiskHoldingsStore {
    fn preferred_currency(&self) -> Result<Option<String>, HoldingError> {
        Ok(self
            .settings
            .get(PREFERRED_CURRENCY_KEY)?
            .map(|value| String::from_utf8_lossy(&value).into_owned()))
    }

    fn set_preferred_currency(&self, code: &str) -> Result<(), HoldingError> {
        self.settings.insert(PREFERRED_CURRENCY_KEY, code)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Preferred currency set to {}", code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_disk_store_add_remove() {
        let dir = tempdir().unwrap();
        let store = DiskHoldingsStore::open(dir.path()).unwrap();

        assert!(store.enumerate().unwrap().is_empty());
        store.add("btc", 1.0).unwrap();
        store.add("ETH", 10.0).unwrap();
        store.remove("eth", 4.0).unwrap();

        assert_eq!(store.get_amount("BTC").unwrap(), Some(1.0));
        assert_eq!(store.get_amount("ETH").unwrap(), Some(6.0));
        assert_eq!(store.get_amount("SOL").unwrap(), None);
    }

    #[test]
    fn test_disk_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DiskHoldingsStore::open(dir.path()).unwrap();
            store.add("BTC", 0.5).unwrap();
            store.add("DOGE", 100.0).unwrap();
            store.remove("DOGE", 100.0).unwrap();
        }

        let store = DiskHoldingsStore::open(dir.path()).unwrap();
        assert_eq!(
            store.enumerate().unwrap(),
            vec![Holding::new("BTC", 0.5), Holding::new("DOGE", 0.0)]
        );
        assert_eq!(store.held().unwrap(), vec![Holding::new("BTC", 0.5)]);
    }

    #[test]
    fn test_preferred_currency_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DiskHoldingsStore::open(dir.path()).unwrap();
            assert_eq!(store.preferred_currency().unwrap(), None);
            store.set_preferred_currency("EUR").unwrap();
            store.add("BTC", 1.0).unwrap();
        }

        let store = DiskHoldingsStore::open(dir.path()).unwrap();
        assert_eq!(store.preferred_currency().unwrap(), Some("EUR".to_string()));
        assert_eq!(store.enumerate().unwrap(), vec![Holding::new("BTC", 1.0)]);
    }

    #[test]
    fn test_disk_store_insufficient_balance_leaves_state() {
        let dir = tempdir().unwrap();
        let store = DiskHoldingsStore::open(dir.path()).unwrap();
        store.add("ADA", 3.0).unwrap();

        assert!(matches!(
            store.remove("ADA", 5.0),
            Err(HoldingError::InsufficientBalance { .. })
        ));
        assert_eq!(store.get_amount("ADA").unwrap(), Some(3.0));
    }
}
