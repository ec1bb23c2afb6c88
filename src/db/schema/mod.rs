use sqlx::{
    Executor,
    sqlite::SqlitePool,
};

/// Creates tables and indices if they do not exist; never touches existing rows
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(include_str!("asset_observations.sql")).await?;
    pool.execute(include_str!("portfolio_snapshots.sql")).await?;

    // Baseline lookups walk these in (timestamp, id) descending order
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_asset_observations_symbol_timestamp
        ON asset_observations(symbol, timestamp, id);
        "#
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_portfolio_snapshots_timestamp
        ON portfolio_snapshots(timestamp, id);
        "#
    )
    .execute(pool)
    .await?;

    Ok(())
}
