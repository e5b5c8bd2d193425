pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::{
    FiatRateCache, FiatRateSource, HoldingsStore, MarketDataSource, QuoteCache, SettingsStore,
    SliceAggregator, ValuationEngine,
};
use anyhow::{Context, Result};
use chrono::TimeDelta;
use cli::holdings::Change;
use providers::coingecko::CoinGeckoProvider;
use providers::exchange_rate::{ExchangeRateProvider, UnconfiguredRates};
use std::sync::Arc;
use std::time::Duration;
use store::DiskHoldingsStore;
use tracing::{debug, info};

const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Add { symbol: String, amount: f64 },
    Remove { symbol: String, amount: f64 },
    Holdings,
    Total { currency: Option<String> },
    Alloc,
    Search { prefix: String, fiat: bool },
    Currency { code: String },
}

/// Everything a command needs, wired from the configuration.
pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn HoldingsStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub engine: ValuationEngine,
    pub aggregator: SliceAggregator,
}

impl App {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let data_path = config.default_data_path()?.join("holdings");
        let store = DiskHoldingsStore::open(&data_path).with_context(|| {
            format!("Failed to open holdings store at {}", data_path.display())
        })?;
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store<S>(config: AppConfig, store: Arc<S>) -> Result<Self>
    where
        S: HoldingsStore + SettingsStore + 'static,
    {
        let coingecko_url = config
            .providers
            .coingecko
            .as_ref()
            .map_or(DEFAULT_COINGECKO_URL, |p| p.base_url.as_str());
        let market: Arc<dyn MarketDataSource> = Arc::new(CoinGeckoProvider::new(coingecko_url)?);

        let rates: Arc<dyn FiatRateSource> = match &config.providers.exchange_rate {
            Some(p) => Arc::new(ExchangeRateProvider::new(&p.base_url, &p.api_key)?),
            None => {
                debug!("No exchange_rate provider configured, only USD is available");
                Arc::new(UnconfiguredRates)
            }
        };

        let deadline = Duration::from_secs(config.valuation.fetch_timeout_secs);
        let ttl = TimeDelta::try_hours(config.valuation.fiat_ttl_hours)
            .context("fiat_ttl_hours is out of range")?;

        let quotes = QuoteCache::new(market).with_deadline(deadline);
        let fiat = FiatRateCache::new(rates)
            .with_ttl(ttl)
            .with_deadline(deadline);
        let engine = ValuationEngine::new(Arc::new(quotes), Arc::new(fiat));
        let aggregator = SliceAggregator::new(config.valuation.other_threshold);

        Ok(App {
            config,
            store: store.clone(),
            settings: store,
            engine,
            aggregator,
        })
    }

    /// The stored preference if one was chosen, else the configured currency.
    pub fn preferred_currency(&self) -> Result<String> {
        Ok(self
            .settings
            .preferred_currency()?
            .unwrap_or_else(|| self.config.currency.clone()))
    }

    pub async fn run(&self, command: AppCommand) -> Result<()> {
        let store = self.store.as_ref();
        let preferred = self.preferred_currency()?;
        let preferred = preferred.as_str();
        match command {
            AppCommand::Add { symbol, amount } => {
                cli::holdings::change(store, &self.engine, Change::Add, &symbol, amount).await
            }
            AppCommand::Remove { symbol, amount } => {
                cli::holdings::change(store, &self.engine, Change::Remove, &symbol, amount).await
            }
            AppCommand::Holdings => cli::holdings::list(store, &self.engine, preferred).await,
            AppCommand::Total { currency } => {
                cli::total::run(store, &self.engine, preferred, currency.as_deref()).await
            }
            AppCommand::Alloc => {
                cli::alloc::run(store, &self.engine, &self.aggregator, preferred).await
            }
            AppCommand::Search { prefix, fiat } => {
                cli::search::run(&self.engine, &prefix, fiat).await
            }
            AppCommand::Currency { code } => {
                cli::currency::choose(self.settings.as_ref(), &self.engine, preferred, &code)
                    .await
                    .map(|_| ())
            }
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("coinfolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        currency = %config.currency,
        exchange_rate = config.providers.exchange_rate.is_some(),
        "Loaded config"
    );

    App::from_config(config)?.run(command).await
}
