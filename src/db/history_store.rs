use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::connection;
use super::schema;
use super::models::{
    text_to_decimal,
    asset_observations::NewAssetObservationModel,
    portfolio_snapshots::NewPortfolioSnapshotModel,
};
use super::queries::{
    asset_observations as asset_observations_queries,
    portfolio_snapshots as portfolio_snapshots_queries,
};
use crate::valuation::{AssetObservation, PortfolioSnapshot};

/// Append-only log of asset observations and portfolio snapshots
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    /// Opens the database and makes sure the schema exists
    pub async fn init(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = connection::create_pool(database_url).await?;
        Self::from_pool(pool).await
    }

    /// Opens a database that must already exist; never creates a file
    pub async fn open_existing(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = connection::open_existing_pool(database_url).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        schema::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Re-runs schema creation; safe at any time
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        schema::init_schema(&self.pool).await
    }

    /// Price from the most recent observation of `symbol`, if any
    #[instrument(skip(self), ret, level = "debug")]
    pub async fn latest_asset_price(&self, symbol: &str) -> Result<Option<Decimal>, sqlx::Error> {
        let raw = asset_observations_queries::get_latest_asset_price(&self.pool, symbol).await?;
        raw.map(|price| text_to_decimal("price", &price)).transpose()
    }

    /// Total value from the most recent snapshot, if any
    #[instrument(skip(self), ret, level = "debug")]
    pub async fn latest_portfolio_total(&self) -> Result<Option<Decimal>, sqlx::Error> {
        let latest = portfolio_snapshots_queries::get_latest_portfolio_snapshot(&self.pool).await?;
        latest.map(|model| text_to_decimal("total_value", &model.total_value)).transpose()
    }

    /// Writes a cycle's observations and its snapshot in one transaction
    #[instrument(skip_all, fields(observations = observations.len(), timestamp = %snapshot.timestamp))]
    pub async fn record_cycle(
        &self,
        observations: &[AssetObservation],
        snapshot: &PortfolioSnapshot,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for observation in observations {
            let new_observation = NewAssetObservationModel::from(observation);
            asset_observations_queries::insert_asset_observation(&mut *tx, &new_observation).await?;
        }

        let new_snapshot = NewPortfolioSnapshotModel::from(snapshot);
        let snapshot_id = portfolio_snapshots_queries::insert_portfolio_snapshot(&mut *tx, &new_snapshot).await?;

        // Dropping `tx` on an early return above rolls everything back
        tx.commit().await?;
        debug!(snapshot_id, "Cycle committed");
        Ok(())
    }

    /// Most recent snapshots, newest first
    pub async fn recent_snapshots(&self, limit: i64) -> Result<Vec<PortfolioSnapshot>, sqlx::Error> {
        portfolio_snapshots_queries::get_recent_portfolio_snapshots(&self.pool, limit)
            .await?
            .into_iter()
            .map(|model| model.into_snapshot())
            .collect()
    }

    /// A symbol's most recent observations, newest first
    pub async fn recent_observations(&self, symbol: &str, limit: i64) -> Result<Vec<AssetObservation>, sqlx::Error> {
        asset_observations_queries::get_recent_asset_observations(&self.pool, symbol, limit)
            .await?
            .into_iter()
            .map(|model| model.into_observation())
            .collect()
    }

    /// Observations recorded for the cycle stamped `timestamp`
    pub async fn observations_at(&self, timestamp: DateTime<Utc>) -> Result<Vec<AssetObservation>, sqlx::Error> {
        asset_observations_queries::get_asset_observations_at_timestamp(&self.pool, timestamp)
            .await?
            .into_iter()
            .map(|model| model.into_observation())
            .collect()
    }

    /// (asset observation rows, portfolio snapshot rows)
    pub async fn row_counts(&self) -> Result<(i64, i64), sqlx::Error> {
        let observations = asset_observations_queries::count_asset_observations(&self.pool).await?;
        let snapshots = portfolio_snapshots_queries::count_portfolio_snapshots(&self.pool).await?;
        Ok((observations, snapshots))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
