use sqlx::{SqliteConnection, SqlitePool};

use crate::db::models::portfolio_snapshots::{NewPortfolioSnapshotModel, PortfolioSnapshotModel};

pub async fn insert_portfolio_snapshot(
    conn: &mut SqliteConnection,
    snapshot: &NewPortfolioSnapshotModel,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO portfolio_snapshots (timestamp, total_value, currency, value_change)
        VALUES (?1, ?2, ?3, ?4)
        "#
    )
    .bind(snapshot.timestamp)
    .bind(&snapshot.total_value)
    .bind(&snapshot.currency)
    .bind(&snapshot.value_change)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_latest_portfolio_snapshot(
    pool: &SqlitePool,
) -> Result<Option<PortfolioSnapshotModel>, sqlx::Error> {
    sqlx::query_as::<_, PortfolioSnapshotModel>(
        r#"
        SELECT id, timestamp, total_value, currency, value_change
        FROM portfolio_snapshots
        ORDER BY timestamp DESC, id DESC
        LIMIT 1
        "#
    )
    .fetch_optional(pool)
    .await
}

/// Fetch the most recent snapshots, newest first
pub async fn get_recent_portfolio_snapshots(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<PortfolioSnapshotModel>, sqlx::Error> {
    sqlx::query_as::<_, PortfolioSnapshotModel>(
        r#"
        SELECT id, timestamp, total_value, currency, value_change
        FROM portfolio_snapshots
        ORDER BY timestamp DESC, id DESC
        LIMIT ?1
        "#
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn count_portfolio_snapshots(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM portfolio_snapshots")
        .fetch_one(pool)
        .await
}
