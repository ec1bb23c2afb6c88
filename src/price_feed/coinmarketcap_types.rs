use std::collections::HashMap;
use serde::Deserialize;
use serde_json::Value;

/// Body of `/v1/cryptocurrency/quotes/latest`; only the fields we read are modelled
#[derive(Debug, Deserialize)]
pub struct QuotesLatestResponse {
    #[serde(default)]
    pub status: Option<ApiStatus>,
    #[serde(default)]
    pub data: Option<HashMap<String, DataEntry>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// v1 maps a symbol to one asset, v2 to a list of assets sharing the symbol
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DataEntry {
    Many(Vec<AssetQuote>), // Must be tried first, structs also accept sequences
    Single(AssetQuote),
}

impl DataEntry {
    pub fn primary(&self) -> Option<&AssetQuote> {
        match self {
            DataEntry::Many(list) => list.first(),
            DataEntry::Single(asset) => Some(asset),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssetQuote {
    #[serde(default)]
    pub quote: HashMap<String, CurrencyQuote>, // Keyed by convert currency, e.g. "USD"
}

#[derive(Debug, Deserialize)]
pub struct CurrencyQuote {
    #[serde(default)]
    pub price: Option<Value>, // Kept raw so the decimal is read from its textual form
}
