pub mod coinmarketcap;
pub mod coinmarketcap_types;

use async_trait::async_trait;

use crate::errors::FeedError;
use crate::valuation::Quotes;

pub use coinmarketcap::CoinMarketCapClient;

/// Source of latest prices for a set of symbols in one quote currency
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Symbols the provider could not price are simply missing from the result
    async fn fetch_quotes(&self, symbols: &[String], currency: &str) -> Result<Quotes, FeedError>;
}
