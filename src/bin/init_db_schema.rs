use eyre::Result;
use tracing::info;

use crypto_portfolio_tracker::logging;
use crypto_portfolio_tracker::config;
use crypto_portfolio_tracker::db::{
    connection,
    schema,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (including .env)
    let cfg = config::Config::load()?;

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }
    info!(database_url = %cfg.database_url, "Configuration loaded and logging initialized");

    // Initialize database connection pool
    let pool = connection::create_pool(&cfg.database_url).await?;
    info!("Database connection pool created");

    // Initialize database schema
    schema::init_schema(&pool).await?;
    info!("Database schema initialized");

    pool.close().await;
    Ok(())
}
