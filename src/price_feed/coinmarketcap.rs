use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::PriceFeed;
use super::coinmarketcap_types::QuotesLatestResponse;
use crate::decimal_utils::json_value_to_decimal;
use crate::errors::FeedError;
use crate::valuation::Quotes;

const QUOTES_LATEST_PATH: &str = "/v1/cryptocurrency/quotes/latest";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    http_client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl CoinMarketCapClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, FeedError> {
        let reqwest_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(500), Duration::from_secs(4))
            .build_with_max_retries(3);

        let http_client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl PriceFeed for CoinMarketCapClient {
    #[instrument(skip(self), fields(symbol_count = symbols.len()))]
    async fn fetch_quotes(&self, symbols: &[String], currency: &str) -> Result<Quotes, FeedError> {
        let url = Url::parse(&format!("{}{}", self.base_url, QUOTES_LATEST_PATH))
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        let params = [
            ("symbol", symbols.join(",")),
            ("convert", currency.to_string()),
        ];

        let response = self
            .http_client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(FeedError::Malformed(e.to_string())),
            Err(_) => Value::Null,
        };

        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        let quotes = parse_quotes(&body, currency)?;
        debug!(quote_count = quotes.len(), "Quotes received");
        Ok(quotes)
    }
}

/// Extracts `data.<SYMBOL>.quote.<CURRENCY>.price` for every symbol that has one
pub fn parse_quotes(body: &Value, currency: &str) -> Result<Quotes, FeedError> {
    let response: QuotesLatestResponse = serde_json::from_value(body.clone())
        .map_err(|e| FeedError::Malformed(e.to_string()))?;

    if let Some(status) = &response.status {
        if status.error_code != 0 {
            return Err(FeedError::Status {
                status: u16::try_from(status.error_code).unwrap_or(u16::MAX),
                message: status.error_message.clone().unwrap_or_else(|| "unknown error".to_string()),
            });
        }
    }

    let data = response
        .data
        .ok_or_else(|| FeedError::Malformed("missing `data` object".to_string()))?;

    let upper_currency = currency.to_uppercase();
    let mut quotes = Quotes::new();
    for (symbol, entry) in &data {
        let price = entry
            .primary()
            .and_then(|asset| asset.quote.get(currency).or_else(|| asset.quote.get(&upper_currency)))
            .and_then(|quote| quote.price.as_ref())
            .and_then(json_value_to_decimal);
        match price {
            Some(price) => {
                quotes.insert(symbol.clone(), price);
            }
            None => warn!(%symbol, %currency, "Quote has no usable price"),
        }
    }

    if quotes.is_empty() {
        return Err(FeedError::NoData);
    }
    Ok(quotes)
}

fn error_message(body: &Value) -> Option<String> {
    serde_json::from_value::<QuotesLatestResponse>(body.clone())
        .ok()
        .and_then(|response| response.status)
        .and_then(|status| status.error_message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;
    use serde_json::json;

    #[test]
    fn parses_v1_quotes() {
        let body = json!({
            "status": { "error_code": 0, "error_message": null },
            "data": {
                "BTC": { "symbol": "BTC", "quote": { "USD": { "price": 64123.45, "percent_change_24h": 1.2 } } },
                "ETH": { "symbol": "ETH", "quote": { "USD": { "price": 3120.5 } } }
            }
        });
        let quotes = parse_quotes(&body, "USD").unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["BTC"], dec!(64123.45));
        assert_eq!(quotes["ETH"], dec!(3120.5));
    }

    #[test]
    fn takes_first_entry_of_list_responses() {
        let body = json!({
            "data": {
                "SOL": [
                    { "quote": { "EUR": { "price": 140.1 } } },
                    { "quote": { "EUR": { "price": 0.0001 } } }
                ]
            }
        });
        let quotes = parse_quotes(&body, "EUR").unwrap();
        assert_eq!(quotes["SOL"], dec!(140.1));
    }

    #[test]
    fn symbols_without_price_are_left_out() {
        let body = json!({
            "data": {
                "BTC": { "quote": { "USD": { "price": 100 } } },
                "NOPE": { "quote": { "USD": { "price": null } } },
                "GBPONLY": { "quote": { "GBP": { "price": 1 } } }
            }
        });
        let quotes = parse_quotes(&body, "USD").unwrap();
        assert_eq!(quotes.len(), 1);
        assert!(quotes.contains_key("BTC"));
    }

    #[test]
    fn empty_or_missing_data_is_unavailable() {
        assert!(matches!(parse_quotes(&json!({ "data": {} }), "USD"), Err(FeedError::NoData)));
        assert!(matches!(parse_quotes(&json!({ "status": {} }), "USD"), Err(FeedError::Malformed(_))));
        assert!(matches!(parse_quotes(&json!([1, 2]), "USD"), Err(FeedError::Malformed(_))));
    }

    #[test]
    fn api_error_code_is_a_status_failure() {
        let body = json!({
            "status": { "error_code": 1002, "error_message": "API key missing." },
            "data": {}
        });
        match parse_quotes(&body, "USD") {
            Err(FeedError::Status { status, message }) => {
                assert_eq!(status, 1002);
                assert_eq!(message, "API key missing.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn client_builds_and_trims_base_url() {
        let client = CoinMarketCapClient::new("https://pro-api.coinmarketcap.com/", "key").unwrap();
        assert_eq!(client.base_url, "https://pro-api.coinmarketcap.com");
        assert_eq!(client.api_key, "key");
    }
}
