use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use super::util::{RetryPolicy, with_retry};
use crate::core::source::FiatRateSource;

/// Latest fiat rates relative to USD from ExchangeRate-API.
///
/// The API key is part of the request path, so it is kept out of logs and
/// error messages.
pub struct ExchangeRateProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl ExchangeRateProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("coinfolio/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(ExchangeRateProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: Option<String>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    conversion_rates: Option<HashMap<String, f64>>,
}

#[async_trait]
impl FiatRateSource for ExchangeRateProvider {
    fn name(&self) -> &str {
        "ExchangeRate-API"
    }

    #[instrument(name = "ExchangeRateFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<HashMap<String, f64>> {
        let url = format!("{}/{}/latest/USD", self.base_url, self.api_key);
        debug!("Requesting latest USD rates from {}", self.base_url);

        let client = &self.client;
        let request_url = url.as_str();
        let response = with_retry(self.retry, || async move {
            client
                .get(request_url)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| e.without_url())
        })
        .await
        .map_err(|e| anyhow!("Request error: {} for latest USD rates", e))?;

        let text = response.text().await.map_err(|e| e.without_url())?;
        let data: LatestRatesResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse rates response: {}", e))?;

        if data.result.as_deref() == Some("error") {
            return Err(anyhow!(
                "API error: {}",
                data.error_type.as_deref().unwrap_or("unknown")
            ));
        }

        let rates = data
            .conversion_rates
            .ok_or_else(|| anyhow!("No conversion rates in response"))?;
        debug!(count = rates.len(), "Received conversion rates");
        Ok(rates)
    }
}

/// Stand-in used when no API key is configured. USD valuation never asks it
/// for rates; any other currency surfaces as unavailable.
pub struct UnconfiguredRates;

#[async_trait]
impl FiatRateSource for UnconfiguredRates {
    fn name(&self) -> &str {
        "ExchangeRate-API"
    }

    async fn fetch_rates(&self) -> Result<HashMap<String, f64>> {
        Err(anyhow!(
            "no API key configured under providers.exchange_rate"
        ))
    }
}
