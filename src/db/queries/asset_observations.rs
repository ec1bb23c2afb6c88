use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::asset_observations::{AssetObservationModel, NewAssetObservationModel};

/// Insert a single asset observation; takes a connection so callers can batch inside a transaction
pub async fn insert_asset_observation(
    conn: &mut SqliteConnection,
    new_observation: &NewAssetObservationModel,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO asset_observations (timestamp, symbol, amount, price, value, price_change)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#
    )
    .bind(new_observation.timestamp)
    .bind(&new_observation.symbol)
    .bind(&new_observation.amount)
    .bind(&new_observation.price)
    .bind(&new_observation.value)
    .bind(&new_observation.price_change)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Price of the most recent observation for a symbol; insertion order breaks timestamp ties
pub async fn get_latest_asset_price(
    pool: &SqlitePool,
    symbol: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT price
        FROM asset_observations
        WHERE symbol = ?1
        ORDER BY timestamp DESC, id DESC
        LIMIT 1
        "#
    )
    .bind(symbol)
    .fetch_optional(pool)
    .await
}

/// Fetch a symbol's most recent observations, newest first
pub async fn get_recent_asset_observations(
    pool: &SqlitePool,
    symbol: &str,
    limit: i64,
) -> Result<Vec<AssetObservationModel>, sqlx::Error> {
    sqlx::query_as::<_, AssetObservationModel>(
        r#"
        SELECT id, timestamp, symbol, amount, price, value, price_change
        FROM asset_observations
        WHERE symbol = ?1
        ORDER BY timestamp DESC, id DESC
        LIMIT ?2
        "#
    )
    .bind(symbol)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Fetch every observation written for one cycle timestamp, in insertion order
pub async fn get_asset_observations_at_timestamp(
    pool: &SqlitePool,
    timestamp: DateTime<Utc>,
) -> Result<Vec<AssetObservationModel>, sqlx::Error> {
    sqlx::query_as::<_, AssetObservationModel>(
        r#"
        SELECT id, timestamp, symbol, amount, price, value, price_change
        FROM asset_observations
        WHERE timestamp = ?1
        ORDER BY id ASC
        "#
    )
    .bind(timestamp)
    .fetch_all(pool)
    .await
}

pub async fn count_asset_observations(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM asset_observations")
        .fetch_one(pool)
        .await
}
