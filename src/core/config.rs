use super::fiat::DEFAULT_FIAT_TTL_HOURS;
use super::slices::DEFAULT_OTHER_THRESHOLD;
use anyhow::{Context, Result, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub coingecko: Option<CoinGeckoProviderConfig>,
    pub exchange_rate: Option<ExchangeRateProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: Some(CoinGeckoProviderConfig {
                base_url: "https://api.coingecko.com/api/v3".to_string(),
            }),
            exchange_rate: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ValuationConfig {
    /// Share of the total below which a holding is shown under "Other".
    pub other_threshold: f64,
    pub fiat_ttl_hours: i64,
    /// Deadline for each cache refresh.
    pub fetch_timeout_secs: u64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        ValuationConfig {
            other_threshold: DEFAULT_OTHER_THRESHOLD,
            fiat_ttl_hours: DEFAULT_FIAT_TTL_HOURS,
            fetch_timeout_secs: 30,
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Preferred display currency.
    #[serde(default = "default_currency")]
    pub currency: String,
    pub data_path: Option<String>,
    #[serde(default)]
    pub valuation: ValuationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "coinfolio", "coinfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "coinfolio", "coinfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.valuation.other_threshold;
        ensure!(
            threshold.is_finite() && (0.0..1.0).contains(&threshold),
            "other_threshold must be in [0, 1), got {threshold}"
        );
        ensure!(
            self.valuation.fiat_ttl_hours > 0,
            "fiat_ttl_hours must be positive"
        );
        ensure!(
            self.valuation.fetch_timeout_secs > 0,
            "fetch_timeout_secs must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
currency: "eur"
data_path: "/tmp/coinfolio"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.currency, "eur");
        assert_eq!(config.data_path.as_deref(), Some("/tmp/coinfolio"));
        assert!(config.providers.coingecko.is_some());
        assert_eq!(
            config.providers.coingecko.unwrap().base_url,
            "https://api.coingecko.com/api/v3".to_string()
        );
        assert!(config.providers.exchange_rate.is_none());
        assert_eq!(config.valuation.other_threshold, 0.01);
        assert_eq!(config.valuation.fiat_ttl_hours, 24);
        assert_eq!(config.valuation.fetch_timeout_secs, 30);

        let yaml_str_with_providers = r#"
providers:
  coingecko:
    base_url: "http://example.com/coingecko"
  exchange_rate:
    base_url: "http://example.com/rates"
    api_key: "secret"
valuation:
  other_threshold: 0.05
        "#;
        let config_with_providers: AppConfig =
            serde_yaml::from_str(yaml_str_with_providers).unwrap();
        assert_eq!(
            config_with_providers.providers.coingecko.unwrap().base_url,
            "http://example.com/coingecko"
        );
        let rates = config_with_providers.providers.exchange_rate.unwrap();
        assert_eq!(rates.base_url, "http://example.com/rates");
        assert_eq!(rates.api_key, "secret");
        assert_eq!(config_with_providers.currency, "USD");
        assert_eq!(config_with_providers.valuation.other_threshold, 0.05);
        assert_eq!(config_with_providers.valuation.fiat_ttl_hours, 24);
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "valuation:\n  other_threshold: 1.5\n").unwrap();

        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("other_threshold must be in [0, 1)"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load_from_path("/nonexistent/coinfolio.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
