use sqlx::sqlite::{
    SqliteConnectOptions,
    SqliteJournalMode,
    SqlitePool,
    SqlitePoolOptions,
};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const MEMORY_MARKER: &str = ":memory:";
const URL_PREFIX: &str = "sqlite://";

/// Opens a pool for `database_url`, creating the database file (and its directory) if missing
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    connect(database_url, true).await
}

/// Opens a pool only if the database file already exists
pub async fn open_existing_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    connect(database_url, false).await
}

async fn connect(database_url: &str, create_if_missing: bool) -> Result<SqlitePool, sqlx::Error> {
    let connect_options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(create_if_missing);

    if database_url.contains(MEMORY_MARKER) {
        // An in-memory database lives only as long as its single connection
        return SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(connect_options)
            .await;
    }

    if create_if_missing {
        ensure_parent_dir(database_url)?;
    }
    debug!(database_url, create_if_missing, "Opening sqlite database");

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options.journal_mode(SqliteJournalMode::Wal))
        .await
}

fn ensure_parent_dir(database_url: &str) -> std::io::Result<()> {
    let rest = database_url
        .strip_prefix(URL_PREFIX)
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path_part = rest.split_once('?').map(|(path, _)| path).unwrap_or(rest);

    if let Some(parent) = Path::new(path_part).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
