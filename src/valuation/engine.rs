use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use super::change_calculator::percent_change;
use super::types::{AssetObservation, CycleReport, Holding, PortfolioSnapshot, Quotes};
use crate::db::HistoryStore;
use crate::errors::CycleError;

/// Turns quotes and holdings into one cycle's observations and snapshot
#[derive(Debug, Clone, Copy)]
pub struct ValuationEngine<'a> {
    store: &'a HistoryStore,
}

impl<'a> ValuationEngine<'a> {
    pub fn new(store: &'a HistoryStore) -> Self {
        Self { store }
    }

    /// Values and commits one cycle stamped with the current time
    pub async fn run_cycle(
        &self,
        holdings: &[Holding],
        quotes: &Quotes,
        currency: &str,
    ) -> Result<CycleReport, CycleError> {
        let report = self.value_cycle(holdings, quotes, currency, cycle_timestamp()).await?;
        self.commit(&report).await?;
        Ok(report)
    }

    /// Computes the cycle against stored baselines without writing anything
    #[instrument(skip(self, holdings, quotes), fields(holdings = holdings.len()))]
    pub async fn value_cycle(
        &self,
        holdings: &[Holding],
        quotes: &Quotes,
        currency: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<CycleReport, CycleError> {
        let mut observations = Vec::with_capacity(holdings.len());
        let mut unresolved = Vec::new();
        let mut total_value = Decimal::ZERO;

        for holding in holdings {
            let Some(&price) = quotes.get(&holding.symbol) else {
                warn!(symbol = %holding.symbol, "Token not found in feed response, skipping");
                unresolved.push(holding.symbol.clone());
                continue;
            };

            let value = price.checked_mul(holding.amount).ok_or_else(|| {
                CycleError::Unexpected(format!("value of {} {} overflows", holding.amount, holding.symbol))
            })?;
            let previous_price = self.store.latest_asset_price(&holding.symbol).await?;
            let price_change = percent_change(price, previous_price);
            debug!(
                symbol = %holding.symbol,
                %price,
                %value,
                previous_price = ?previous_price,
                price_change = %price_change,
                "Asset valued"
            );

            total_value = total_value
                .checked_add(value)
                .ok_or_else(|| CycleError::Unexpected("portfolio total overflows".to_string()))?;
            observations.push(AssetObservation {
                timestamp,
                symbol: holding.symbol.clone(),
                amount: holding.amount,
                price,
                value,
                price_change,
            });
        }

        let previous_total = self.store.latest_portfolio_total().await?;
        let total_change = percent_change(total_value, previous_total);

        let snapshot = PortfolioSnapshot {
            timestamp,
            total_value,
            currency: currency.to_string(),
            total_change,
        };

        info!(
            valued = observations.len(),
            unresolved = unresolved.len(),
            %total_value,
            total_change = %total_change,
            "Portfolio valued"
        );

        Ok(CycleReport {
            observations,
            snapshot,
            unresolved,
        })
    }

    /// Persists a valued cycle atomically
    pub async fn commit(&self, report: &CycleReport) -> Result<(), CycleError> {
        self.store.record_cycle(&report.observations, &report.snapshot).await?;
        Ok(())
    }
}

/// One timestamp shared by every row of a cycle, at millisecond resolution
pub fn cycle_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
