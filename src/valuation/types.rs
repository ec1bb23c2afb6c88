use std::collections::HashMap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::change_calculator::Change;

/// Latest price per symbol, in the cycle's quote currency
pub type Quotes = HashMap<String, Decimal>;

/// One configured position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub symbol: String,
    pub amount: Decimal, // Non-negative, validated by the portfolio loader
}

impl Holding {
    pub fn new(symbol: impl Into<String>, amount: Decimal) -> Self {
        Self { symbol: symbol.into(), amount }
    }
}

/// One asset's state at a cycle timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetObservation {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub amount: Decimal,
    pub price: Decimal,
    pub value: Decimal, // Always amount * price
    pub price_change: Change, // Percent vs. the previous stored price for this symbol
}

/// Aggregate portfolio state at a cycle timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_value: Decimal, // Sum of the cycle's unrounded observation values
    pub currency: String,
    pub total_change: Change, // Percent vs. the previous stored total
}

/// Everything one completed cycle produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub observations: Vec<AssetObservation>,
    pub snapshot: PortfolioSnapshot,
    pub unresolved: Vec<String>, // Configured symbols missing from the feed response
}

impl CycleReport {
    pub fn observation(&self, symbol: &str) -> Option<&AssetObservation> {
        self.observations.iter().find(|o| o.symbol == symbol)
    }
}
