use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::util::{RetryPolicy, with_retry};
use crate::core::source::{MarketDataSource, Quote};

/// Market snapshot of the top assets by market cap, priced in USD.
pub struct CoinGeckoProvider {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("coinfolio/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Deserialize, Debug)]
struct MarketRecord {
    symbol: String,
    current_price: Option<f64>,
}

#[async_trait]
impl MarketDataSource for CoinGeckoProvider {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    #[instrument(name = "CoinGeckoMarketFetch", skip(self))]
    async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page=250&page=1",
            self.base_url
        );
        debug!("Requesting market snapshot from {}", url);

        let client = &self.client;
        let request_url = url.as_str();
        let response = with_retry(self.retry, || async move {
            client.get(request_url).send().await?.error_for_status()
        })
        .await
        .map_err(|e| anyhow!("Request error: {} for URL: {}", e, url))?;

        let text = response.text().await?;
        let records: Vec<MarketRecord> = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse market snapshot: {}", e))?;

        let total = records.len();
        let quotes: Vec<Quote> = records
            .into_iter()
            .filter_map(|record| {
                record.current_price.map(|price_usd| Quote {
                    symbol: record.symbol.to_uppercase(),
                    price_usd,
                })
            })
            .collect();
        debug!(
            total,
            priced = quotes.len(),
            "Received CoinGecko market snapshot"
        );

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/markets"))
            .and(query_param("vs_currency", "usd"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(mock_server: &MockServer) -> CoinGeckoProvider {
        CoinGeckoProvider::new(&mock_server.uri())
            .unwrap()
            .with_retry(RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_successful_market_fetch() {
        let mock_response = r#"[
            {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 50000.5},
            {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 3000},
            {"id": "delisted", "symbol": "dead", "name": "Delisted", "current_price": null}
        ]"#;
        let mock_server = create_mock_server(200, mock_response).await;

        let quotes = provider(&mock_server).fetch_quotes().await.unwrap();
        assert_eq!(
            quotes,
            vec![
                Quote {
                    symbol: "BTC".to_string(),
                    price_usd: 50000.5
                },
                Quote {
                    symbol: "ETH".to_string(),
                    price_usd: 3000.0
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_server_error() {
        let mock_server = create_mock_server(503, "").await;

        let result = provider(&mock_server).fetch_quotes().await;
        assert!(result.is_err());
        let message = result.unwrap_err().to_string();
        assert!(message.starts_with("Request error:"));
        assert!(message.contains("503"));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = create_mock_server(200, r#"{"status": {"error_code": 429}}"#).await;

        let result = provider(&mock_server).fetch_quotes().await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse market snapshot")
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/markets"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/coins/markets"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"[{"symbol": "sol", "current_price": 150.0}]"#),
            )
            .mount(&mock_server)
            .await;

        let provider = CoinGeckoProvider::new(&mock_server.uri())
            .unwrap()
            .with_retry(RetryPolicy {
                retries: 1,
                delay: Duration::from_millis(1),
            });
        let quotes = provider.fetch_quotes().await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "SOL");
    }
}
