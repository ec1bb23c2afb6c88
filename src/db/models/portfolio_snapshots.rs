use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::{change_to_text, decimal_to_text, text_to_change, text_to_decimal};
use super::asset_observations::STORED_CHANGE_DP;
use crate::valuation::PortfolioSnapshot;

#[derive(Debug, FromRow)]
pub struct PortfolioSnapshotModel {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub total_value: String,
    pub currency: String,
    pub value_change: Option<String>,
}

impl PortfolioSnapshotModel {
    pub fn into_snapshot(self) -> Result<PortfolioSnapshot, sqlx::Error> {
        Ok(PortfolioSnapshot {
            timestamp: self.timestamp,
            total_value: text_to_decimal("total_value", &self.total_value)?,
            total_change: text_to_change("value_change", self.value_change.as_deref())?,
            currency: self.currency,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewPortfolioSnapshotModel {
    pub timestamp: DateTime<Utc>,
    pub total_value: String,
    pub currency: String,
    pub value_change: Option<String>,
}

impl NewPortfolioSnapshotModel {
    pub fn from(snapshot: &PortfolioSnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            total_value: decimal_to_text(snapshot.total_value),
            currency: snapshot.currency.clone(),
            value_change: change_to_text(snapshot.total_change.round_dp(STORED_CHANGE_DP)),
        }
    }
}
