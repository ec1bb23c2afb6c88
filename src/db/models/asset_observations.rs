use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::{change_to_text, decimal_to_text, text_to_change, text_to_decimal};
use crate::valuation::AssetObservation;

/// Decimal places kept for a stored percentage change
pub const STORED_CHANGE_DP: u32 = 2;

#[derive(Debug, FromRow)]
pub struct AssetObservationModel {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub amount: String,
    pub price: String,
    pub value: String,
    pub price_change: Option<String>,
}

impl AssetObservationModel {
    pub fn into_observation(self) -> Result<AssetObservation, sqlx::Error> {
        Ok(AssetObservation {
            timestamp: self.timestamp,
            amount: text_to_decimal("amount", &self.amount)?,
            price: text_to_decimal("price", &self.price)?,
            value: text_to_decimal("value", &self.value)?,
            price_change: text_to_change("price_change", self.price_change.as_deref())?,
            symbol: self.symbol,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAssetObservationModel {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub amount: String,
    pub price: String,
    pub value: String,
    pub price_change: Option<String>,
}

impl NewAssetObservationModel {
    /// Only the percentage change is rounded on the way in
    pub fn from(observation: &AssetObservation) -> Self {
        Self {
            timestamp: observation.timestamp,
            symbol: observation.symbol.clone(),
            amount: decimal_to_text(observation.amount),
            price: decimal_to_text(observation.price),
            value: decimal_to_text(observation.value),
            price_change: change_to_text(observation.price_change.round_dp(STORED_CHANGE_DP)),
        }
    }
}
