use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::path::Path;

pub const EXAMPLE_CONFIG: &str = r#"# Example configuration file for coinfolio
#
# Market data comes from CoinGecko. Fiat rates need a free ExchangeRate-API
# key; without one only USD totals are available.

providers:
  coingecko:
    base_url: "https://api.coingecko.com/api/v3"
  # exchange_rate:
  #   base_url: "https://v6.exchangerate-api.com/v6"
  #   api_key: "your-api-key"

# Preferred display currency. Falls back to USD when not supported.
currency: "USD"

# Directory of the holdings store. Defaults to the platform data directory.
# data_path: "/path/to/coinfolio/data"

valuation:
  # Holdings below this share of the total are grouped under "Other".
  other_threshold: 0.01
  # How long fetched fiat rates stay fresh.
  fiat_ttl_hours: 24
  # Deadline for each market data or fiat rate refresh.
  fetch_timeout_secs: 30
"#;

/// Creates a default configuration file with example content at the default location
pub fn setup() -> Result<()> {
    let path = AppConfig::default_config_path()?;
    setup_at_path(path)
}

/// Creates a default configuration file with example content at the specified path
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    println!("Created configuration at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_setup_creates_config_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        setup_at_path(&config_path)?;

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path)?;
        assert!(content.contains("providers:"));
        assert!(content.contains("currency:"));
        assert!(content.contains("# Example configuration file for coinfolio"));

        Ok(())
    }

    #[test]
    fn test_setup_fails_if_config_exists() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "test")?;

        let result = setup_at_path(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&config_path)?, "test");

        Ok(())
    }

    #[test]
    fn test_example_config_is_valid() -> Result<()> {
        let config: AppConfig = serde_yaml::from_str(EXAMPLE_CONFIG)
            .context("Failed to parse example config as YAML")?;
        config.validate()?;

        assert_eq!(config.currency, "USD");
        assert!(config.providers.coingecko.is_some());
        assert!(config.providers.exchange_rate.is_none());
        assert!(config.data_path.is_none());
        assert_eq!(config.valuation.other_threshold, 0.01);

        Ok(())
    }
}
